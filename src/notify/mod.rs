//! Domain event notifications: order placement and status changes, product
//! stock changes.
//!
//! Delivery is best effort: [`Notifier`] logs sink failures and never hands
//! them back, so a lost message can't undo an order.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::events::{DomainEvent, ProductEvent};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("delivery failed: {0}")]
    Delivery(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, event: &DomainEvent) -> Result<(), NotifyError>;
}

/// Writes events to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, event: &DomainEvent) -> Result<(), NotifyError> {
        tracing::info!(id = %event.aggregate_id(), event = event.name(), "domain event");
        Ok(())
    }
}

/// Publishes events as JSON to `<prefix>.<event name>` on NATS.
#[derive(Debug, Clone)]
pub struct NatsSink {
    client: async_nats::Client,
    prefix: String,
}

impl NatsSink {
    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self, NotifyError> {
        let client = async_nats::connect(url).await.map_err(|e| NotifyError::Delivery(e.to_string()))?;
        Ok(Self { client, prefix: prefix.into() })
    }
}

#[async_trait]
impl NotificationSink for NatsSink {
    async fn deliver(&self, event: &DomainEvent) -> Result<(), NotifyError> {
        let payload = serde_json::to_vec(event)?;
        self.client
            .publish(format!("{}.{}", self.prefix, event.name()), payload.into())
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))
    }
}

#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
}

impl Notifier {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self { Self { sink } }

    pub fn log_only() -> Self { Self::new(Arc::new(LogSink)) }

    pub async fn publish(&self, events: Vec<DomainEvent>) {
        for event in events {
            if let DomainEvent::Product(ProductEvent::StockChanged { product_id, stock: 0 }) = &event {
                tracing::warn!(%product_id, "product sold out");
            }
            if let Err(e) = self.sink.deliver(&event).await {
                tracing::warn!(id = %event.aggregate_id(), event = event.name(), error = %e, "notification not delivered");
            }
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier").finish_non_exhaustive()
    }
}
