//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use crate::domain::aggregates::{Address, CartLine};
use crate::domain::value_objects::{CouponCode, Money, MoneyError};
use crate::domain::events::{DomainEvent, OrderEvent};

#[derive(Clone, Debug)]
pub struct Order {
    id: Uuid,
    owner: OrderOwner,
    status: OrderStatus,
    items: Vec<LineItem>,
    totals: OrderTotals,
    coupon: Option<CouponCode>,
    shipping_address: Address,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    events: Vec<DomainEvent>,
}

/// Price-frozen copy of a cart line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem { pub product_id: Uuid, pub name: String, pub quantity: u32, pub unit_price: Money, pub total: Money }

impl From<&CartLine> for LineItem {
    fn from(line: &CartLine) -> Self {
        Self { product_id: line.product_id, name: line.name.clone(), quantity: line.quantity, unit_price: line.unit_price.clone(), total: line.line_total() }
    }
}

/// Who an order belongs to; unauthenticated checkouts are owned by the guest sentinel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OrderOwner { Guest, User(Uuid) }

impl OrderOwner {
    pub fn user_id(&self) -> Option<Uuid> { match self { Self::User(id) => Some(*id), Self::Guest => None } }
}

impl fmt::Display for OrderOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Guest => f.write_str("guest"), Self::User(id) => write!(f, "{id}") }
    }
}

impl FromStr for OrderOwner {
    type Err = uuid::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "guest" { Ok(Self::Guest) } else { Uuid::parse_str(s).map(Self::User) }
    }
}

impl TryFrom<String> for OrderOwner {
    type Error = uuid::Error;
    fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

impl From<OrderOwner> for String {
    fn from(owner: OrderOwner) -> Self { owner.to_string() }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus { #[default] Pending, Confirmed, Shipped, Delivered, Cancelled }

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [Self::Pending, Self::Confirmed, Self::Shipped, Self::Delivered, Self::Cancelled];

    /// Forward-only lifecycle; `cancelled` is reachable until the order ships.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!((self, next), (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Shipped) | (Confirmed, Cancelled) | (Shipped, Delivered))
    }

    pub fn is_cancellable(self) -> bool { matches!(self, Self::Pending | Self::Confirmed) }
    pub fn is_terminal(self) -> bool { matches!(self, Self::Delivered | Self::Cancelled) }
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending", Self::Confirmed => "confirmed", Self::Shipped => "shipped",
            Self::Delivered => "delivered", Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|st| st.as_str() == s).ok_or_else(|| OrderError::UnknownStatus(s.to_string()))
    }
}

/// Checkout amounts. `total = max(0, subtotal - discount) + shipping`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals { pub subtotal: Money, pub discount: Money, pub shipping: Money, pub total: Money }

impl OrderTotals {
    pub fn compute(subtotal: Money, discount: Money, shipping: Money) -> Result<Self, MoneyError> {
        let discount = discount.min(&subtotal)?;
        let total = subtotal.saturating_sub(&discount)?.add(&shipping)?;
        Ok(Self { subtotal, discount, shipping, total })
    }
}

/// Persisted shape of an order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: Uuid,
    pub owner: OrderOwner,
    pub status: OrderStatus,
    pub items: Vec<LineItem>,
    pub totals: OrderTotals,
    pub coupon: Option<CouponCode>,
    pub shipping_address: Address,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a `pending` order from a cart snapshot and an address, both copied by value.
    pub fn place(owner: OrderOwner, lines: &[CartLine], totals: OrderTotals, coupon: Option<CouponCode>, address: &Address) -> Result<Self, OrderError> {
        if lines.is_empty() { return Err(OrderError::NoItems); }
        let now = Utc::now();
        let mut order = Self {
            id: Uuid::now_v7(), owner, status: OrderStatus::Pending, items: lines.iter().map(LineItem::from).collect(),
            totals, coupon, shipping_address: address.detached(), created_at: now, updated_at: now, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Created {
            order_id: order.id, owner, total: order.totals.total.amount(),
            currency: order.totals.total.currency().to_string(), items: order.items.len(),
        }));
        Ok(order)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn owner(&self) -> OrderOwner { self.owner }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn totals(&self) -> &OrderTotals { &self.totals }
    pub fn total(&self) -> &Money { &self.totals.total }
    pub fn coupon(&self) -> Option<&CouponCode> { self.coupon.as_ref() }
    pub fn shipping_address(&self) -> &Address { &self.shipping_address }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn is_owned_by(&self, user_id: Uuid) -> bool { self.owner == OrderOwner::User(user_id) }

    /// Buyer-initiated cancellation.
    pub fn cancel(&mut self, requested_by: Uuid) -> Result<(), OrderError> {
        if !self.is_owned_by(requested_by) { return Err(OrderError::NotOwner); }
        if !self.status.is_cancellable() { return Err(OrderError::CannotCancel(self.status)); }
        self.apply(OrderStatus::Cancelled);
        Ok(())
    }

    /// Administrative status change, restricted to the lifecycle transition table.
    pub fn transition(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) { return Err(OrderError::IllegalTransition { from: self.status, to: next }); }
        self.apply(next);
        Ok(())
    }

    fn apply(&mut self, next: OrderStatus) {
        let from = self.status;
        self.status = next;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id, from, to: next }));
        if next == OrderStatus::Cancelled {
            self.raise_event(DomainEvent::Order(OrderEvent::Cancelled { order_id: self.id, owner: self.owner }));
        }
    }

    pub fn to_record(&self) -> OrderRecord {
        OrderRecord {
            id: self.id, owner: self.owner, status: self.status, items: self.items.clone(), totals: self.totals.clone(),
            coupon: self.coupon.clone(), shipping_address: self.shipping_address.clone(),
            created_at: self.created_at, updated_at: self.updated_at,
        }
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

impl From<OrderRecord> for Order {
    fn from(r: OrderRecord) -> Self {
        Self {
            id: r.id, owner: r.owner, status: r.status, items: r.items, totals: r.totals, coupon: r.coupon,
            shipping_address: r.shipping_address, created_at: r.created_at, updated_at: r.updated_at, events: vec![],
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("order has no items")]
    NoItems,
    #[error("order belongs to another customer")]
    NotOwner,
    #[error("an order that is {0} cannot be cancelled")]
    CannotCancel(OrderStatus),
    #[error("cannot move an order from {from} to {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },
    #[error("unknown order status {0:?}")]
    UnknownStatus(String),
}
