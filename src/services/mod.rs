//! Application services. Each takes its collaborators by `Arc` so tests can
//! build isolated instances over a [`MemoryStore`](crate::store::MemoryStore).

pub mod accounts;
pub mod addresses;
pub mod admin;
pub mod cart;
pub mod catalog;
pub mod coupons;
pub mod orders;
pub mod sessions;

use std::sync::Arc;

use crate::domain::value_objects::Money;
use crate::notify::Notifier;
use crate::store::DynStore;

pub use accounts::{AccountService, Actor, Argon2Hasher, CredentialHasher, Login};
pub use addresses::AddressService;
pub use admin::{AdminService, Dashboard};
pub use cart::CartService;
pub use catalog::{CatalogService, ProductFilter};
pub use coupons::{CouponService, NewCoupon};
pub use orders::{CheckoutRequest, OrderService, Quote};
pub use sessions::{SessionError, SessionTokens};

/// Pricing knobs for checkout.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub currency: String,
    pub shipping_fee: Money,
    /// Discounted subtotal at or above which shipping is free.
    pub free_shipping_threshold: Option<Money>,
}

impl CheckoutSettings {
    pub fn new(currency: &str) -> Self {
        Self { currency: currency.to_string(), shipping_fee: Money::zero(currency), free_shipping_threshold: None }
    }

    pub fn shipping_for(&self, discounted_subtotal: &Money) -> Money {
        match &self.free_shipping_threshold {
            Some(threshold) if discounted_subtotal.amount() >= threshold.amount() => Money::zero(&self.currency),
            _ => self.shipping_fee.clone(),
        }
    }
}

impl Default for CheckoutSettings {
    fn default() -> Self { Self::new("USD") }
}

/// Everything the HTTP layer needs, built once at startup.
#[derive(Clone)]
pub struct Services {
    pub catalog: Arc<CatalogService>,
    pub carts: Arc<CartService>,
    pub addresses: Arc<AddressService>,
    pub coupons: Arc<CouponService>,
    pub orders: Arc<OrderService>,
    pub accounts: Arc<AccountService>,
    pub admin: Arc<AdminService>,
}

impl Services {
    pub fn new(store: DynStore, notifier: Notifier, checkout: CheckoutSettings, low_stock_threshold: u32, tokens: SessionTokens) -> Self {
        let currency = checkout.currency.clone();
        let addresses = Arc::new(AddressService::new(store.clone()));
        let coupons = Arc::new(CouponService::new(store.clone(), &currency));
        let carts = Arc::new(CartService::new(store.clone(), &currency));
        Self {
            catalog: Arc::new(CatalogService::new(store.clone(), notifier.clone(), &currency)),
            orders: Arc::new(OrderService::new(store.clone(), notifier, checkout, carts.clone(), coupons.clone(), addresses.clone())),
            accounts: Arc::new(AccountService::new(store.clone(), Arc::new(Argon2Hasher), tokens)),
            admin: Arc::new(AdminService::new(store, low_stock_threshold, &currency)),
            carts,
            addresses,
            coupons,
        }
    }
}
