//! Domain events
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::{OrderOwner, OrderStatus};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
}

impl DomainEvent {
    /// Dotted name, e.g. `order.created`; message-bus sinks append it to their subject prefix.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Product(ProductEvent::StockChanged { .. }) => "product.stock_changed",
            Self::Order(OrderEvent::Created { .. }) => "order.created",
            Self::Order(OrderEvent::StatusChanged { .. }) => "order.status_changed",
            Self::Order(OrderEvent::Cancelled { .. }) => "order.cancelled",
        }
    }

    /// Id of the aggregate the event belongs to.
    pub fn aggregate_id(&self) -> Uuid {
        match self {
            Self::Product(e) => e.product_id(),
            Self::Order(e) => e.order_id(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductEvent {
    StockChanged { product_id: Uuid, stock: u32 },
}

impl ProductEvent {
    pub fn product_id(&self) -> Uuid {
        match self {
            Self::StockChanged { product_id, .. } => *product_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Created { order_id: Uuid, owner: OrderOwner, total: Decimal, currency: String, items: usize },
    StatusChanged { order_id: Uuid, from: OrderStatus, to: OrderStatus },
    Cancelled { order_id: Uuid, owner: OrderOwner },
}

impl OrderEvent {
    pub fn order_id(&self) -> Uuid {
        match self {
            Self::Created { order_id, .. } | Self::StatusChanged { order_id, .. } | Self::Cancelled { order_id, .. } => *order_id,
        }
    }
}
