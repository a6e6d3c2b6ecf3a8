//! Storefront backend
//!
//! Server side of a retail shop: the catalog, per-user carts and wishlists,
//! an address book, checkout into orders, and an admin back-office.
//!
//! ## Features
//! - Product catalog with stock tracking
//! - Cart and wishlist, persisted on every change
//! - Checkout with coupons and flat-rate shipping
//! - Order lifecycle: pending → confirmed → shipped → delivered, or cancelled
//! - Accounts with user/admin roles
//! - Admin dashboard: revenue, status histogram, low stock

use thiserror::Error;
use uuid::Uuid;

pub mod api;
pub mod config;
pub mod domain;
pub mod notify;
pub mod seed;
pub mod services;
pub mod store;

use domain::aggregates::{CartError, CouponError, OrderError, ProductError};
use domain::value_objects::{CouponCodeError, EmailError, MoneyError};
use store::StoreError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("not authorized")]
    Unauthorized,

    #[error("{0}")]
    InvalidState(String),

    #[error("{0} already exists")]
    AlreadyExists(&'static str),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("password change required")]
    PasswordChangeRequired,

    #[error("{0}")]
    Validation(String),

    #[error("only {available} left of product {product_id} (requested {requested})")]
    InsufficientStock { product_id: Uuid, requested: u32, available: u32 },

    #[error(transparent)]
    Coupon(CouponError),

    #[error("storage error: {0}")]
    Store(StoreError),
}

pub type Result<T> = std::result::Result<T, StorefrontError>;

impl From<StoreError> for StorefrontError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::Conflict(what) => Self::AlreadyExists(what),
            StoreError::Stale(what) => Self::InvalidState(format!("{what} was modified concurrently, reload and retry")),
            StoreError::InsufficientStock { product_id, requested, available } => Self::InsufficientStock { product_id, requested, available },
            other @ StoreError::Backend(_) => Self::Store(other),
        }
    }
}

impl From<CartError> for StorefrontError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::LineNotFound(_) => Self::NotFound("cart line"),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<OrderError> for StorefrontError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::NotOwner => Self::Unauthorized,
            OrderError::CannotCancel(_) | OrderError::IllegalTransition { .. } => Self::InvalidState(e.to_string()),
            OrderError::NoItems | OrderError::UnknownStatus(_) => Self::Validation(e.to_string()),
        }
    }
}

impl From<ProductError> for StorefrontError {
    fn from(e: ProductError) -> Self {
        match e {
            ProductError::InsufficientStock { .. } => Self::InvalidState(e.to_string()),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<CouponError> for StorefrontError {
    fn from(e: CouponError) -> Self {
        match e {
            CouponError::InvalidDiscount | CouponError::InvalidWindow => Self::Validation(e.to_string()),
            other => Self::Coupon(other),
        }
    }
}

impl From<EmailError> for StorefrontError {
    fn from(e: EmailError) -> Self { Self::Validation(e.to_string()) }
}

impl From<CouponCodeError> for StorefrontError {
    fn from(e: CouponCodeError) -> Self { Self::Validation(e.to_string()) }
}

impl From<MoneyError> for StorefrontError {
    fn from(e: MoneyError) -> Self { Self::Validation(e.to_string()) }
}

impl From<validator::ValidationErrors> for StorefrontError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| e.message.as_ref().map_or_else(|| format!("{field} is invalid"), ToString::to_string))
            })
            .collect();
        messages.sort();
        Self::Validation(messages.join("; "))
    }
}
