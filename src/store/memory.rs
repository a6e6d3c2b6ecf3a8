//! In-process store backed by hash maps behind one lock.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AddressRepository, CartRepository, CouponRepository, OrderRepository, ProductRepository, StoreError, UserRepository};
use crate::domain::aggregates::{Address, Cart, CartOwner, Coupon, Order, OrderOwner, OrderRecord, OrderStatus, OwnedAddress, Product, User, Wishlist};
use crate::domain::value_objects::{CouponCode, Email};

#[derive(Debug, Default)]
struct Tables {
    products: HashMap<Uuid, Product>,
    users: HashMap<Uuid, User>,
    addresses: HashMap<Uuid, OwnedAddress>,
    orders: HashMap<Uuid, OrderRecord>,
    coupons: HashMap<CouponCode, Coupon>,
    carts: HashMap<CartOwner, Cart>,
    wishlists: HashMap<CartOwner, Wishlist>,
}

/// Holding a single lock for the whole store makes multi-entity writes such as
/// order placement atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then_with(|| b.id().cmp(&a.id())));
    orders
}

fn stored(product: &Product) -> Product {
    let mut copy = product.clone();
    copy.take_events();
    copy
}

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let mut products: Vec<Product> = self.tables.read().await.products.values().cloned().collect();
        products.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(products)
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.tables.read().await.products.get(&id).cloned())
    }

    async fn save_product(&self, product: &Product) -> Result<(), StoreError> {
        self.tables.write().await.products.insert(product.id(), stored(product));
        Ok(())
    }

    async fn remove_stock(&self, id: Uuid, qty: u32) -> Result<Product, StoreError> {
        let mut tables = self.tables.write().await;
        let product = tables.products.get_mut(&id).ok_or(StoreError::NotFound("product"))?;
        product.remove_stock(qty).map_err(|_| StoreError::InsufficientStock { product_id: id, requested: qty, available: product.stock() })?;
        let updated = product.clone();
        product.take_events();
        Ok(updated)
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.values().find(|u| &u.email == email).cloned())
    }

    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) { return Err(StoreError::Conflict("user")); }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let existing = tables.users.get_mut(&user.id).ok_or(StoreError::NotFound("user"))?;
        *existing = user.clone();
        Ok(())
    }

    async fn count_users(&self) -> Result<u64, StoreError> {
        Ok(self.tables.read().await.users.len() as u64)
    }
}

#[async_trait]
impl AddressRepository for MemoryStore {
    async fn list_addresses(&self, owner: Uuid) -> Result<Vec<Address>, StoreError> {
        let tables = self.tables.read().await;
        let mut addresses: Vec<Address> = tables.addresses.values().filter(|a| a.owner == owner).map(|a| a.address.clone()).collect();
        addresses.sort_by_key(|a| a.id);
        Ok(addresses)
    }

    async fn get_address(&self, id: Uuid) -> Result<Option<OwnedAddress>, StoreError> {
        Ok(self.tables.read().await.addresses.get(&id).cloned())
    }

    async fn insert_address(&self, owner: Uuid, address: &Address) -> Result<Address, StoreError> {
        let id = Uuid::now_v7();
        let address = Address { id: Some(id), ..address.clone() };
        self.tables.write().await.addresses.insert(id, OwnedAddress { owner, address: address.clone() });
        Ok(address)
    }

    async fn update_address(&self, owner: Uuid, address: &Address) -> Result<(), StoreError> {
        let id = address.id.ok_or(StoreError::NotFound("address"))?;
        let mut tables = self.tables.write().await;
        let existing = tables.addresses.get_mut(&id).filter(|a| a.owner == owner).ok_or(StoreError::NotFound("address"))?;
        existing.address = address.clone();
        Ok(())
    }

    async fn delete_address(&self, id: Uuid) -> Result<(), StoreError> {
        self.tables.write().await.addresses.remove(&id).map(|_| ()).ok_or(StoreError::NotFound("address"))
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn place_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        // check every line before touching any stock
        for item in order.items() {
            let product = tables.products.get(&item.product_id).ok_or(StoreError::NotFound("product"))?;
            if product.stock() < item.quantity {
                return Err(StoreError::InsufficientStock { product_id: item.product_id, requested: item.quantity, available: product.stock() });
            }
        }
        for item in order.items() {
            if let Some(product) = tables.products.get_mut(&item.product_id) {
                product.remove_stock(item.quantity).map_err(|e| StoreError::Backend(e.to_string()))?;
                // the order events cover reservations
                product.take_events();
            }
        }
        tables.orders.insert(order.id(), order.to_record());
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.tables.read().await.orders.get(&id).cloned().map(Order::from))
    }

    async fn list_orders_for(&self, owner: OrderOwner) -> Result<Vec<Order>, StoreError> {
        let tables = self.tables.read().await;
        Ok(newest_first(tables.orders.values().filter(|o| o.owner == owner).cloned().map(Order::from).collect()))
    }

    async fn list_orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, StoreError> {
        let tables = self.tables.read().await;
        Ok(newest_first(tables.orders.values().filter(|o| status.map_or(true, |s| o.status == s)).cloned().map(Order::from).collect()))
    }

    async fn update_order(&self, order: &Order, from: OrderStatus, release_stock: bool) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let current = tables.orders.get(&order.id()).ok_or(StoreError::NotFound("order"))?;
        if current.status != from { return Err(StoreError::Stale("order")); }
        if release_stock {
            for item in order.items() {
                // products deleted since the order was placed have nothing to restock
                if let Some(product) = tables.products.get_mut(&item.product_id) {
                    product.add_stock(item.quantity);
                    product.take_events();
                }
            }
        }
        tables.orders.insert(order.id(), order.to_record());
        Ok(())
    }

    async fn delete_order(&self, id: Uuid) -> Result<(), StoreError> {
        self.tables.write().await.orders.remove(&id).map(|_| ()).ok_or(StoreError::NotFound("order"))
    }
}

#[async_trait]
impl CouponRepository for MemoryStore {
    async fn find_coupon(&self, code: &CouponCode) -> Result<Option<Coupon>, StoreError> {
        Ok(self.tables.read().await.coupons.get(code).cloned())
    }

    async fn create_coupon(&self, coupon: &Coupon) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.coupons.contains_key(&coupon.code) { return Err(StoreError::Conflict("coupon")); }
        tables.coupons.insert(coupon.code.clone(), coupon.clone());
        Ok(())
    }

    async fn list_coupons(&self) -> Result<Vec<Coupon>, StoreError> {
        let mut coupons: Vec<Coupon> = self.tables.read().await.coupons.values().cloned().collect();
        coupons.sort_by(|a, b| a.code.as_str().cmp(b.code.as_str()));
        Ok(coupons)
    }
}

#[async_trait]
impl CartRepository for MemoryStore {
    async fn load_cart(&self, owner: &CartOwner) -> Result<Option<Cart>, StoreError> {
        Ok(self.tables.read().await.carts.get(owner).cloned())
    }

    async fn save_cart(&self, cart: &Cart) -> Result<(), StoreError> {
        self.tables.write().await.carts.insert(cart.owner().clone(), cart.clone());
        Ok(())
    }

    async fn load_wishlist(&self, owner: &CartOwner) -> Result<Option<Wishlist>, StoreError> {
        Ok(self.tables.read().await.wishlists.get(owner).cloned())
    }

    async fn save_wishlist(&self, wishlist: &Wishlist) -> Result<(), StoreError> {
        self.tables.write().await.wishlists.insert(wishlist.owner().clone(), wishlist.clone());
        Ok(())
    }
}
