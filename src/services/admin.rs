//! Back-office projections over orders, products and users.

use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::Actor;
use crate::domain::aggregates::{Order, OrderRecord, OrderStatus, Product};
use crate::domain::value_objects::{Money, MoneyError};
use crate::store::{DynStore, StoreError};
use crate::Result;

const RECENT_ORDERS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockAlert {
    pub product_id: Uuid,
    pub name: String,
    pub stock: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub revenue: Money,
    pub order_count: usize,
    pub status_counts: BTreeMap<OrderStatus, usize>,
    pub low_stock: Vec<StockAlert>,
    pub recent_orders: Vec<OrderRecord>,
    pub customers: u64,
    /// Set when the backing store could not be read; every figure is then empty.
    pub degraded: bool,
}

impl Dashboard {
    fn unavailable(currency: &str) -> Self {
        Self {
            revenue: Money::zero(currency), order_count: 0, status_counts: status_histogram(&[]), low_stock: vec![],
            recent_orders: vec![], customers: 0, degraded: true,
        }
    }
}

/// Sum of totals over orders that were not cancelled.
pub fn revenue(orders: &[Order], currency: &str) -> std::result::Result<Money, MoneyError> {
    orders
        .iter()
        .filter(|o| o.status() != OrderStatus::Cancelled)
        .try_fold(Money::zero(currency), |acc, o| acc.add(o.total()))
}

/// Order count per status; every status is present, possibly with zero.
pub fn status_histogram(orders: &[Order]) -> BTreeMap<OrderStatus, usize> {
    let mut counts: BTreeMap<OrderStatus, usize> = OrderStatus::ALL.into_iter().map(|s| (s, 0)).collect();
    for order in orders {
        *counts.entry(order.status()).or_default() += 1;
    }
    counts
}

/// Products at or below `threshold`, emptiest first.
pub fn low_stock(products: &[Product], threshold: u32) -> Vec<StockAlert> {
    let mut alerts: Vec<StockAlert> = products
        .iter()
        .filter(|p| p.stock() <= threshold)
        .map(|p| StockAlert { product_id: p.id(), name: p.name().to_string(), stock: p.stock() })
        .collect();
    alerts.sort_by(|a, b| a.stock.cmp(&b.stock).then_with(|| a.name.cmp(&b.name)));
    alerts
}

pub struct AdminService {
    store: DynStore,
    low_stock_threshold: u32,
    currency: String,
}

impl AdminService {
    pub fn new(store: DynStore, low_stock_threshold: u32, currency: impl Into<String>) -> Self {
        Self { store, low_stock_threshold, currency: currency.into() }
    }

    /// Summary for the back-office landing page. A store failure yields an empty,
    /// `degraded` dashboard instead of an error.
    #[tracing::instrument(skip(self), fields(by = %actor.user_id))]
    pub async fn dashboard(&self, actor: &Actor) -> Result<Dashboard> {
        actor.require_admin()?;
        match self.summarise().await {
            Ok(dashboard) => Ok(dashboard),
            Err(e) => {
                tracing::warn!(error = %e, "dashboard degraded");
                Ok(Dashboard::unavailable(&self.currency))
            }
        }
    }

    pub async fn low_stock(&self, actor: &Actor) -> Result<Vec<StockAlert>> {
        actor.require_admin()?;
        Ok(low_stock(&self.store.list_products().await?, self.low_stock_threshold))
    }

    async fn summarise(&self) -> std::result::Result<Dashboard, StoreError> {
        let orders = self.store.list_orders(None).await?;
        let products = self.store.list_products().await?;
        let customers = self.store.count_users().await?;
        let revenue = revenue(&orders, &self.currency).map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Dashboard {
            revenue,
            order_count: orders.len(),
            status_counts: status_histogram(&orders),
            low_stock: low_stock(&products, self.low_stock_threshold),
            recent_orders: orders.iter().take(RECENT_ORDERS).map(Order::to_record).collect(),
            customers,
            degraded: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{address, product::sample, CartLine, OrderOwner, OrderTotals, Role};
    use crate::store::{MemoryStore, MockBackend, OrderRepository, ProductRepository};
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn order(product: &Product, qty: u32) -> Order {
        let lines = vec![CartLine::for_product(product, qty)];
        let subtotal = lines[0].line_total();
        let totals = OrderTotals::compute(subtotal, Money::usd(Decimal::ZERO), Money::usd(Decimal::ZERO)).unwrap();
        Order::place(OrderOwner::Guest, &lines, totals, None, &address::sample()).unwrap()
    }

    fn admin() -> Actor { Actor::new(Uuid::now_v7(), Role::Admin) }

    #[test]
    fn revenue_ignores_cancelled_orders() {
        let p = sample("Mug", 8, 50);
        let kept = order(&p, 2);
        let mut cancelled = order(&p, 5);
        cancelled.transition(OrderStatus::Cancelled).unwrap();
        assert_eq!(revenue(&[kept, cancelled], "USD").unwrap().amount(), Decimal::new(16, 0));
    }

    #[test]
    fn histogram_lists_every_status() {
        let p = sample("Mug", 8, 50);
        let mut shipped = order(&p, 1);
        shipped.transition(OrderStatus::Confirmed).unwrap();
        shipped.transition(OrderStatus::Shipped).unwrap();
        let counts = status_histogram(&[order(&p, 1), order(&p, 1), shipped]);
        assert_eq!(counts.len(), OrderStatus::ALL.len());
        assert_eq!(counts[&OrderStatus::Pending], 2);
        assert_eq!(counts[&OrderStatus::Shipped], 1);
        assert_eq!(counts[&OrderStatus::Delivered], 0);
    }

    #[test]
    fn low_stock_is_emptiest_first() {
        let products = [sample("A", 1, 4), sample("B", 1, 0), sample("C", 1, 20)];
        let names: Vec<_> = low_stock(&products, 5).into_iter().map(|a| a.name).collect();
        assert_eq!(names, ["B", "A"]);
    }

    #[tokio::test]
    async fn dashboard_summarises_the_store() {
        let store = Arc::new(MemoryStore::new());
        let p = sample("Mug", 8, 6);
        store.save_product(&p).await.unwrap();
        store.place_order(&order(&p, 2)).await.unwrap();
        let admin_view = AdminService::new(store, 5, "USD");
        let dashboard = admin_view.dashboard(&admin()).await.unwrap();
        assert!(!dashboard.degraded);
        assert_eq!(dashboard.order_count, 1);
        assert_eq!(dashboard.revenue.amount(), Decimal::new(16, 0));
        assert_eq!(dashboard.low_stock.len(), 1);
        assert_eq!(dashboard.recent_orders.len(), 1);
    }

    #[tokio::test]
    async fn dashboard_degrades_when_the_store_is_down() {
        let mut backend = MockBackend::new();
        backend.expect_list_orders().returning(|_| Err(StoreError::Backend("connection refused".into())));
        let admin_view = AdminService::new(Arc::new(backend), 5, "USD");
        let dashboard = admin_view.dashboard(&admin()).await.unwrap();
        assert!(dashboard.degraded);
        assert_eq!(dashboard.order_count, 0);
        assert_eq!(dashboard.status_counts.len(), OrderStatus::ALL.len());
    }

    #[tokio::test]
    async fn customers_cannot_see_the_dashboard() {
        let admin_view = AdminService::new(Arc::new(MockBackend::new()), 5, "USD");
        let customer = Actor::new(Uuid::now_v7(), Role::User);
        assert!(matches!(admin_view.dashboard(&customer).await, Err(crate::StorefrontError::Unauthorized)));
        assert!(matches!(admin_view.low_stock(&customer).await, Err(crate::StorefrontError::Unauthorized)));
    }
}
