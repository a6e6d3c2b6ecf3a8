//! Persistence boundary.
//!
//! Each entity gets a repository trait; [`Store`] bundles them so services can
//! hold a single `Arc<dyn Store>`. Two backends exist: [`MemoryStore`] for
//! development and tests, and [`PgStore`] for PostgreSQL.
//!
//! The store is the single source of truth for carts and wishlists as well as
//! orders: there is no client-side mirror to reconcile.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{Address, Cart, CartOwner, Coupon, Order, OrderOwner, OrderStatus, OwnedAddress, Product, User, Wishlist};
use crate::domain::value_objects::{CouponCode, Email};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} already exists")]
    Conflict(&'static str),

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock { product_id: Uuid, requested: u32, available: u32 },

    #[error("{0} was modified concurrently")]
    Stale(&'static str),

    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict("record"),
            sqlx::Error::RowNotFound => Self::NotFound("record"),
            _ => Self::Backend(e.to_string()),
        }
    }
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError>;
    /// Inserts or replaces the product.
    async fn save_product(&self, product: &Product) -> Result<(), StoreError>;
    /// Atomically takes `qty` units out of stock. The returned product still holds
    /// its stock-changed event.
    async fn remove_stock(&self, id: Uuid, qty: u32) -> Result<Product, StoreError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, StoreError>;
    /// Fails with `Conflict` if the email is taken.
    async fn create_user(&self, user: &User) -> Result<(), StoreError>;
    async fn update_user(&self, user: &User) -> Result<(), StoreError>;
    async fn count_users(&self) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait AddressRepository: Send + Sync {
    async fn list_addresses(&self, owner: Uuid) -> Result<Vec<Address>, StoreError>;
    async fn get_address(&self, id: Uuid) -> Result<Option<OwnedAddress>, StoreError>;
    /// Persists a new address and returns it with its identifier assigned.
    async fn insert_address(&self, owner: Uuid, address: &Address) -> Result<Address, StoreError>;
    async fn update_address(&self, owner: Uuid, address: &Address) -> Result<(), StoreError>;
    async fn delete_address(&self, id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Reserves stock for every line and inserts the order as one unit:
    /// either all lines are decremented and the order exists, or nothing changes.
    async fn place_order(&self, order: &Order) -> Result<(), StoreError>;
    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;
    /// Most recent first.
    async fn list_orders_for(&self, owner: OrderOwner) -> Result<Vec<Order>, StoreError>;
    /// Most recent first, optionally restricted to one status.
    async fn list_orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, StoreError>;
    /// Persists a status change made from `from`. Fails with `Stale` if the stored
    /// order is no longer in `from`; with `release_stock` the order's quantities go
    /// back on the shelf.
    async fn update_order(&self, order: &Order, from: OrderStatus, release_stock: bool) -> Result<(), StoreError>;
    async fn delete_order(&self, id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CouponRepository: Send + Sync {
    async fn find_coupon(&self, code: &CouponCode) -> Result<Option<Coupon>, StoreError>;
    /// Fails with `Conflict` if the code is taken.
    async fn create_coupon(&self, coupon: &Coupon) -> Result<(), StoreError>;
    async fn list_coupons(&self) -> Result<Vec<Coupon>, StoreError>;
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn load_cart(&self, owner: &CartOwner) -> Result<Option<Cart>, StoreError>;
    async fn save_cart(&self, cart: &Cart) -> Result<(), StoreError>;
    async fn load_wishlist(&self, owner: &CartOwner) -> Result<Option<Wishlist>, StoreError>;
    async fn save_wishlist(&self, wishlist: &Wishlist) -> Result<(), StoreError>;
}

/// Every repository behind one object.
pub trait Store: ProductRepository + UserRepository + AddressRepository + OrderRepository + CouponRepository + CartRepository {}

impl<T> Store for T where T: ProductRepository + UserRepository + AddressRepository + OrderRepository + CouponRepository + CartRepository {}

pub type DynStore = Arc<dyn Store>;

#[cfg(test)]
mockall::mock! {
    pub Backend {}

    #[async_trait]
    impl ProductRepository for Backend {
        async fn list_products(&self) -> Result<Vec<Product>, StoreError>;
        async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError>;
        async fn save_product(&self, product: &Product) -> Result<(), StoreError>;
        async fn remove_stock(&self, id: Uuid, qty: u32) -> Result<Product, StoreError>;
    }

    #[async_trait]
    impl UserRepository for Backend {
        async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;
        async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, StoreError>;
        async fn create_user(&self, user: &User) -> Result<(), StoreError>;
        async fn update_user(&self, user: &User) -> Result<(), StoreError>;
        async fn count_users(&self) -> Result<u64, StoreError>;
    }

    #[async_trait]
    impl AddressRepository for Backend {
        async fn list_addresses(&self, owner: Uuid) -> Result<Vec<Address>, StoreError>;
        async fn get_address(&self, id: Uuid) -> Result<Option<OwnedAddress>, StoreError>;
        async fn insert_address(&self, owner: Uuid, address: &Address) -> Result<Address, StoreError>;
        async fn update_address(&self, owner: Uuid, address: &Address) -> Result<(), StoreError>;
        async fn delete_address(&self, id: Uuid) -> Result<(), StoreError>;
    }

    #[async_trait]
    impl OrderRepository for Backend {
        async fn place_order(&self, order: &Order) -> Result<(), StoreError>;
        async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;
        async fn list_orders_for(&self, owner: OrderOwner) -> Result<Vec<Order>, StoreError>;
        async fn list_orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, StoreError>;
        async fn update_order(&self, order: &Order, from: OrderStatus, release_stock: bool) -> Result<(), StoreError>;
        async fn delete_order(&self, id: Uuid) -> Result<(), StoreError>;
    }

    #[async_trait]
    impl CouponRepository for Backend {
        async fn find_coupon(&self, code: &CouponCode) -> Result<Option<Coupon>, StoreError>;
        async fn create_coupon(&self, coupon: &Coupon) -> Result<(), StoreError>;
        async fn list_coupons(&self) -> Result<Vec<Coupon>, StoreError>;
    }

    #[async_trait]
    impl CartRepository for Backend {
        async fn load_cart(&self, owner: &CartOwner) -> Result<Option<Cart>, StoreError>;
        async fn save_cart(&self, cart: &Cart) -> Result<(), StoreError>;
        async fn load_wishlist(&self, owner: &CartOwner) -> Result<Option<Wishlist>, StoreError>;
        async fn save_wishlist(&self, wishlist: &Wishlist) -> Result<(), StoreError>;
    }
}
