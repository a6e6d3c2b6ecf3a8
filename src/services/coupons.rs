//! Coupon lookup and administration.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::accounts::Actor;
use crate::domain::aggregates::{Coupon, CouponError, Discount};
use crate::domain::value_objects::CouponCode;
use crate::store::DynStore;
use crate::{Result, StorefrontError};

#[derive(Debug, Clone, Deserialize)]
pub struct NewCoupon {
    pub code: String,
    pub discount: Discount,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

pub struct CouponService {
    store: DynStore,
    currency: String,
}

impl CouponService {
    pub fn new(store: DynStore, currency: impl Into<String>) -> Self { Self { store, currency: currency.into() } }

    /// Normalises `code` and checks it against the validity window at `now`.
    pub async fn validate(&self, code: &str, now: DateTime<Utc>) -> Result<Coupon> {
        let code = CouponCode::new(code).map_err(|_| StorefrontError::Coupon(CouponError::NotFound))?;
        let coupon = self.store.find_coupon(&code).await?.ok_or(StorefrontError::Coupon(CouponError::NotFound))?;
        coupon.check(now)?;
        Ok(coupon)
    }

    #[tracing::instrument(skip(self, new), fields(by = %actor.user_id, code = %new.code))]
    pub async fn create(&self, actor: &Actor, new: NewCoupon) -> Result<Coupon> {
        actor.require_admin()?;
        self.insert(new).await
    }

    pub async fn insert(&self, new: NewCoupon) -> Result<Coupon> {
        if let Discount::Fixed(amount) = &new.discount {
            if amount.currency() != self.currency {
                return Err(StorefrontError::Validation(format!("fixed discounts must be in {}", self.currency)));
            }
        }
        let coupon = Coupon::new(CouponCode::new(new.code)?, new.discount, new.starts_at, new.ends_at)?;
        self.store.create_coupon(&coupon).await?;
        Ok(coupon)
    }

    pub async fn list(&self, actor: &Actor) -> Result<Vec<Coupon>> {
        actor.require_admin()?;
        Ok(self.store.list_coupons().await?)
    }
}
