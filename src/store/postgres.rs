//! PostgreSQL store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use uuid::Uuid;

use super::{AddressRepository, CartRepository, CouponRepository, OrderRepository, ProductRepository, StoreError, UserRepository};
use crate::domain::aggregates::{
    Address, Cart, CartOwner, Coupon, Discount, LineItem, NewProduct, Order, OrderOwner, OrderRecord, OrderStatus,
    OrderTotals, OwnedAddress, Product, Rating, User, UserSettings, Wishlist,
};
use crate::domain::value_objects::{CouponCode, Email, Money};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self { Self { pool } }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await.map_err(|e| StoreError::Backend(e.to_string()))
    }
}

fn corrupt(what: &str, detail: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(format!("corrupt {what} row: {detail}"))
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid, name: String, description: String, price: Decimal, original_price: Option<Decimal>, currency: String,
    category: String, stock: i32, rating: f32, reviews: i32, images: Vec<String>,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;
    fn try_from(r: ProductRow) -> Result<Self, StoreError> {
        let new = NewProduct {
            name: r.name, description: r.description, price: Money::new(r.price, &r.currency),
            original_price: r.original_price.map(|p| Money::new(p, &r.currency)), category: r.category,
            stock: u32::try_from(r.stock).map_err(|e| corrupt("product", e))?, images: r.images,
        };
        let rating = Rating { average: r.rating, reviews: u32::try_from(r.reviews).map_err(|e| corrupt("product", e))? };
        Product::restore(r.id, new, rating, r.created_at, r.updated_at).map_err(|e| corrupt("product", e))
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid, name: String, email: String, password_hash: String, role: String, settings: Json<UserSettings>,
    must_change_password: bool, token_version: i64, created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;
    fn try_from(r: UserRow) -> Result<Self, StoreError> {
        Ok(User {
            id: r.id, name: r.name, email: Email::parse(&r.email).map_err(|e| corrupt("user", e))?, password_hash: r.password_hash,
            role: r.role.parse().map_err(|e: String| corrupt("user", e))?, settings: r.settings.0,
            must_change_password: r.must_change_password, token_version: u32::try_from(r.token_version).map_err(|e| corrupt("user", e))?,
            created_at: r.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid, owner: String, status: String, currency: String, subtotal: Decimal, discount: Decimal, shipping: Decimal,
    total: Decimal, coupon: Option<String>, items: Json<Vec<LineItem>>, shipping_address: Json<Address>,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;
    fn try_from(r: OrderRow) -> Result<Self, StoreError> {
        let money = |amount| Money::new(amount, &r.currency);
        Ok(Order::from(OrderRecord {
            id: r.id, owner: r.owner.parse().map_err(|e| corrupt("order", e))?, status: r.status.parse().map_err(|e| corrupt("order", e))?,
            items: r.items.0,
            totals: OrderTotals { subtotal: money(r.subtotal), discount: money(r.discount), shipping: money(r.shipping), total: money(r.total) },
            coupon: r.coupon.map(CouponCode::new).transpose().map_err(|e| corrupt("order", e))?,
            shipping_address: r.shipping_address.0, created_at: r.created_at, updated_at: r.updated_at,
        }))
    }
}

#[derive(sqlx::FromRow)]
struct CouponRow { code: String, discount: Json<Discount>, starts_at: DateTime<Utc>, ends_at: DateTime<Utc>, active: bool }

impl TryFrom<CouponRow> for Coupon {
    type Error = StoreError;
    fn try_from(r: CouponRow) -> Result<Self, StoreError> {
        Ok(Coupon { code: CouponCode::new(r.code).map_err(|e| corrupt("coupon", e))?, discount: r.discount.0, starts_at: r.starts_at, ends_at: r.ends_at, active: r.active })
    }
}

fn collect<R, T: TryFrom<R, Error = StoreError>>(rows: Vec<R>) -> Result<Vec<T>, StoreError> {
    rows.into_iter().map(T::try_from).collect()
}

fn stock_param(qty: u32) -> Result<i32, StoreError> {
    i32::try_from(qty).map_err(|_| StoreError::Backend(format!("quantity {qty} out of range")))
}

const ORDER_COLUMNS: &str = "id, owner, status, currency, subtotal, discount, shipping, total, coupon, items, shipping_address, created_at, updated_at";

#[async_trait]
impl ProductRepository for PgStore {
    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        collect(sqlx::query_as::<_, ProductRow>("SELECT * FROM products ORDER BY name").fetch_all(&self.pool).await?)
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(&self.pool).await?.map(Product::try_from).transpose()
    }

    async fn save_product(&self, p: &Product) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO products (id, name, description, price, original_price, currency, category, stock, in_stock, rating, reviews, images, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             ON CONFLICT (id) DO UPDATE SET name = $2, description = $3, price = $4, original_price = $5, currency = $6, category = $7, \
             stock = $8, in_stock = $9, rating = $10, reviews = $11, images = $12, updated_at = $14",
        )
        .bind(p.id()).bind(p.name()).bind(p.description()).bind(p.price().amount()).bind(p.original_price().map(Money::amount))
        .bind(p.price().currency()).bind(p.category()).bind(stock_param(p.stock())?).bind(p.is_in_stock())
        .bind(p.rating().average).bind(stock_param(p.rating().reviews)?).bind(p.images()).bind(p.created_at()).bind(p.updated_at())
        .execute(&self.pool).await?;
        Ok(())
    }

    async fn remove_stock(&self, id: Uuid, qty: u32) -> Result<Product, StoreError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1 FOR UPDATE").bind(id).fetch_optional(&mut *tx).await?;
        let mut product = Product::try_from(row.ok_or(StoreError::NotFound("product"))?)?;
        let available = product.stock();
        product.remove_stock(qty).map_err(|_| StoreError::InsufficientStock { product_id: id, requested: qty, available })?;
        sqlx::query("UPDATE products SET stock = $2, in_stock = $3, updated_at = $4 WHERE id = $1")
            .bind(id).bind(stock_param(product.stock())?).bind(product.is_in_stock()).bind(product.updated_at())
            .execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(product)
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1").bind(id).fetch_optional(&self.pool).await?.map(User::try_from).transpose()
    }

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1").bind(email.as_str()).fetch_optional(&self.pool).await?.map(User::try_from).transpose()
    }

    async fn create_user(&self, u: &User) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO users (id, name, email, password_hash, role, settings, must_change_password, token_version, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)")
            .bind(u.id).bind(&u.name).bind(u.email.as_str()).bind(&u.password_hash).bind(u.role.to_string()).bind(Json(&u.settings))
            .bind(u.must_change_password).bind(i64::from(u.token_version)).bind(u.created_at)
            .execute(&self.pool).await
            .map_err(|e| match StoreError::from(e) { StoreError::Conflict(_) => StoreError::Conflict("user"), other => other })?;
        Ok(())
    }

    async fn update_user(&self, u: &User) -> Result<(), StoreError> {
        let done = sqlx::query("UPDATE users SET name = $2, email = $3, password_hash = $4, role = $5, settings = $6, must_change_password = $7, token_version = $8 WHERE id = $1")
            .bind(u.id).bind(&u.name).bind(u.email.as_str()).bind(&u.password_hash).bind(u.role.to_string()).bind(Json(&u.settings))
            .bind(u.must_change_password).bind(i64::from(u.token_version))
            .execute(&self.pool).await?;
        if done.rows_affected() == 0 { return Err(StoreError::NotFound("user")); }
        Ok(())
    }

    async fn count_users(&self) -> Result<u64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users").fetch_one(&self.pool).await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

#[async_trait]
impl AddressRepository for PgStore {
    async fn list_addresses(&self, owner: Uuid) -> Result<Vec<Address>, StoreError> {
        let rows: Vec<(Uuid, Json<Address>)> = sqlx::query_as("SELECT id, details FROM addresses WHERE user_id = $1 ORDER BY id")
            .bind(owner).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(id, Json(a))| Address { id: Some(id), ..a }).collect())
    }

    async fn get_address(&self, id: Uuid) -> Result<Option<OwnedAddress>, StoreError> {
        let row: Option<(Uuid, Json<Address>)> = sqlx::query_as("SELECT user_id, details FROM addresses WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(|(owner, Json(a))| OwnedAddress { owner, address: Address { id: Some(id), ..a } }))
    }

    async fn insert_address(&self, owner: Uuid, address: &Address) -> Result<Address, StoreError> {
        let saved = Address { id: Some(Uuid::now_v7()), ..address.clone() };
        sqlx::query("INSERT INTO addresses (id, user_id, details) VALUES ($1, $2, $3)")
            .bind(saved.id).bind(owner).bind(Json(&saved)).execute(&self.pool).await?;
        Ok(saved)
    }

    async fn update_address(&self, owner: Uuid, address: &Address) -> Result<(), StoreError> {
        let id = address.id.ok_or(StoreError::NotFound("address"))?;
        let done = sqlx::query("UPDATE addresses SET details = $3 WHERE id = $1 AND user_id = $2")
            .bind(id).bind(owner).bind(Json(address)).execute(&self.pool).await?;
        if done.rows_affected() == 0 { return Err(StoreError::NotFound("address")); }
        Ok(())
    }

    async fn delete_address(&self, id: Uuid) -> Result<(), StoreError> {
        let done = sqlx::query("DELETE FROM addresses WHERE id = $1").bind(id).execute(&self.pool).await?;
        if done.rows_affected() == 0 { return Err(StoreError::NotFound("address")); }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn place_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for item in order.items() {
            let reserved = sqlx::query("UPDATE products SET stock = stock - $2, in_stock = stock - $2 > 0, updated_at = NOW() WHERE id = $1 AND stock >= $2")
                .bind(item.product_id).bind(stock_param(item.quantity)?).execute(&mut *tx).await?;
            if reserved.rows_affected() == 0 {
                let available: Option<(i32,)> = sqlx::query_as("SELECT stock FROM products WHERE id = $1").bind(item.product_id).fetch_optional(&mut *tx).await?;
                // dropping `tx` rolls back the lines already reserved
                return Err(match available {
                    None => StoreError::NotFound("product"),
                    Some((stock,)) => StoreError::InsufficientStock { product_id: item.product_id, requested: item.quantity, available: u32::try_from(stock).unwrap_or(0) },
                });
            }
        }
        let t = order.totals();
        sqlx::query(&format!("INSERT INTO orders ({ORDER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)"))
            .bind(order.id()).bind(order.owner().to_string()).bind(order.status().as_str()).bind(t.total.currency())
            .bind(t.subtotal.amount()).bind(t.discount.amount()).bind(t.shipping.amount()).bind(t.total.amount())
            .bind(order.coupon().map(CouponCode::as_str)).bind(Json(order.items())).bind(Json(order.shipping_address()))
            .bind(order.created_at())
            .execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id).fetch_optional(&self.pool).await?.map(Order::try_from).transpose()
    }

    async fn list_orders_for(&self, owner: OrderOwner) -> Result<Vec<Order>, StoreError> {
        collect(sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE owner = $1 ORDER BY created_at DESC, id DESC"))
            .bind(owner.to_string()).fetch_all(&self.pool).await?)
    }

    async fn list_orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, StoreError> {
        collect(sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE $1::text IS NULL OR status = $1 ORDER BY created_at DESC, id DESC"))
            .bind(status.map(OrderStatus::as_str)).fetch_all(&self.pool).await?)
    }

    async fn update_order(&self, order: &Order, from: OrderStatus, release_stock: bool) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let done = sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 AND status = $3")
            .bind(order.id()).bind(order.status().as_str()).bind(from.as_str()).execute(&mut *tx).await?;
        if done.rows_affected() == 0 {
            let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM orders WHERE id = $1").bind(order.id()).fetch_optional(&mut *tx).await?;
            return Err(if exists.is_some() { StoreError::Stale("order") } else { StoreError::NotFound("order") });
        }
        if release_stock {
            for item in order.items() {
                sqlx::query("UPDATE products SET stock = stock + $2, in_stock = TRUE, updated_at = NOW() WHERE id = $1")
                    .bind(item.product_id).bind(stock_param(item.quantity)?).execute(&mut *tx).await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_order(&self, id: Uuid) -> Result<(), StoreError> {
        let done = sqlx::query("DELETE FROM orders WHERE id = $1").bind(id).execute(&self.pool).await?;
        if done.rows_affected() == 0 { return Err(StoreError::NotFound("order")); }
        Ok(())
    }
}

#[async_trait]
impl CouponRepository for PgStore {
    async fn find_coupon(&self, code: &CouponCode) -> Result<Option<Coupon>, StoreError> {
        sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons WHERE code = $1").bind(code.as_str()).fetch_optional(&self.pool).await?.map(Coupon::try_from).transpose()
    }

    async fn create_coupon(&self, c: &Coupon) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO coupons (code, discount, starts_at, ends_at, active) VALUES ($1, $2, $3, $4, $5)")
            .bind(c.code.as_str()).bind(Json(&c.discount)).bind(c.starts_at).bind(c.ends_at).bind(c.active)
            .execute(&self.pool).await
            .map_err(|e| match StoreError::from(e) { StoreError::Conflict(_) => StoreError::Conflict("coupon"), other => other })?;
        Ok(())
    }

    async fn list_coupons(&self) -> Result<Vec<Coupon>, StoreError> {
        collect(sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons ORDER BY code").fetch_all(&self.pool).await?)
    }
}

#[async_trait]
impl CartRepository for PgStore {
    async fn load_cart(&self, owner: &CartOwner) -> Result<Option<Cart>, StoreError> {
        let row: Option<(Json<Cart>,)> = sqlx::query_as("SELECT cart FROM carts WHERE owner = $1").bind(owner.as_str()).fetch_optional(&self.pool).await?;
        Ok(row.map(|(Json(cart),)| cart))
    }

    async fn save_cart(&self, cart: &Cart) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO carts (owner, cart, updated_at) VALUES ($1, $2, NOW()) ON CONFLICT (owner) DO UPDATE SET cart = $2, updated_at = NOW()")
            .bind(cart.owner().as_str()).bind(Json(cart)).execute(&self.pool).await?;
        Ok(())
    }

    async fn load_wishlist(&self, owner: &CartOwner) -> Result<Option<Wishlist>, StoreError> {
        let row: Option<(Json<Wishlist>,)> = sqlx::query_as("SELECT wishlist FROM wishlists WHERE owner = $1").bind(owner.as_str()).fetch_optional(&self.pool).await?;
        Ok(row.map(|(Json(wishlist),)| wishlist))
    }

    async fn save_wishlist(&self, wishlist: &Wishlist) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO wishlists (owner, wishlist, updated_at) VALUES ($1, $2, NOW()) ON CONFLICT (owner) DO UPDATE SET wishlist = $2, updated_at = NOW()")
            .bind(wishlist.owner().as_str()).bind(Json(wishlist)).execute(&self.pool).await?;
        Ok(())
    }
}
