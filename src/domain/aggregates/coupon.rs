//! Coupons

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::domain::value_objects::{CouponCode, Money, MoneyError};

/// Percentages are fractions in `[0, 1]`: `0.10` is ten percent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Discount {
    Percentage(Decimal),
    Fixed(Money),
}

impl Discount {
    /// Amount taken off `subtotal`; never more than the subtotal itself.
    pub fn amount_off(&self, subtotal: &Money) -> Result<Money, MoneyError> {
        match self {
            Self::Percentage(fraction) => Ok(subtotal.fraction(*fraction)),
            Self::Fixed(amount) => amount.min(subtotal),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub code: CouponCode,
    pub discount: Discount,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub active: bool,
}

impl Coupon {
    pub fn new(code: CouponCode, discount: Discount, starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Result<Self, CouponError> {
        match &discount {
            Discount::Percentage(f) if *f < Decimal::ZERO || *f > Decimal::ONE => return Err(CouponError::InvalidDiscount),
            Discount::Fixed(m) if m.is_negative() => return Err(CouponError::InvalidDiscount),
            _ => {}
        }
        if ends_at < starts_at { return Err(CouponError::InvalidWindow); }
        Ok(Self { code, discount, starts_at, ends_at, active: true })
    }

    /// Valid iff active and `starts_at <= now <= ends_at`.
    pub fn check(&self, now: DateTime<Utc>) -> Result<&Discount, CouponError> {
        if !self.active { return Err(CouponError::NotFound); }
        if now < self.starts_at { return Err(CouponError::NotYetValid); }
        if now > self.ends_at { return Err(CouponError::Expired); }
        Ok(&self.discount)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CouponError {
    #[error("coupon not found")]
    NotFound,
    #[error("coupon is not valid yet")]
    NotYetValid,
    #[error("coupon has expired")]
    Expired,
    #[error("percentage must be between 0 and 1 and fixed amounts non-negative")]
    InvalidDiscount,
    #[error("coupon ends before it starts")]
    InvalidWindow,
}
