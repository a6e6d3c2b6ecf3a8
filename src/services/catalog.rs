//! Catalog browsing and stock administration.

use serde::Deserialize;
use uuid::Uuid;

use super::accounts::Actor;
use crate::domain::aggregates::{NewProduct, Product};
use crate::notify::Notifier;
use crate::store::DynStore;
use crate::{Result, StorefrontError};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub search: Option<String>,
    #[serde(default)]
    pub in_stock: bool,
}

impl ProductFilter {
    fn accepts(&self, p: &Product) -> bool {
        self.category.as_deref().map_or(true, |c| p.category().eq_ignore_ascii_case(c))
            && self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()).map_or(true, |s| p.matches(s))
            && (!self.in_stock || p.is_in_stock())
    }
}

pub struct CatalogService {
    store: DynStore,
    notifier: Notifier,
    currency: String,
}

impl CatalogService {
    pub fn new(store: DynStore, notifier: Notifier, currency: impl Into<String>) -> Self { Self { store, notifier, currency: currency.into() } }
    pub fn currency(&self) -> &str { &self.currency }

    pub async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        Ok(self.store.list_products().await?.into_iter().filter(|p| filter.accepts(p)).collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<Product> {
        self.store.get_product(id).await?.ok_or(StorefrontError::NotFound("product"))
    }

    /// Distinct category tags, sorted.
    pub async fn categories(&self) -> Result<Vec<String>> {
        let mut categories: Vec<String> = self.store.list_products().await?.into_iter().map(|p| p.category().to_string()).collect();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }

    #[tracing::instrument(skip(self, new), fields(by = %actor.user_id))]
    pub async fn create_product(&self, actor: &Actor, new: NewProduct) -> Result<Product> {
        actor.require_admin()?;
        self.insert(new).await
    }

    /// Catalog insert without an actor, used when seeding.
    pub async fn insert(&self, new: NewProduct) -> Result<Product> {
        if new.price.currency() != self.currency || new.original_price.as_ref().is_some_and(|p| p.currency() != self.currency) {
            return Err(StorefrontError::Validation(format!("prices must be in {}", self.currency)));
        }
        let product = Product::create(new)?;
        self.store.save_product(&product).await?;
        tracing::info!(product_id = %product.id(), "product created");
        Ok(product)
    }

    /// Takes `n` units out of stock; `in_stock` follows the new count.
    #[tracing::instrument(skip(self), fields(by = %actor.user_id))]
    pub async fn update_product_stock(&self, actor: &Actor, id: Uuid, n: u32) -> Result<Product> {
        actor.require_admin()?;
        let product = self.store.remove_stock(id, n).await?;
        Ok(self.stock_changed(product).await)
    }

    /// Overwrites the stock count, e.g. after a stocktake.
    #[tracing::instrument(skip(self), fields(by = %actor.user_id))]
    pub async fn set_stock(&self, actor: &Actor, id: Uuid, stock: u32) -> Result<Product> {
        actor.require_admin()?;
        let mut product = self.get(id).await?;
        product.set_stock(stock);
        self.store.save_product(&product).await?;
        Ok(self.stock_changed(product).await)
    }

    async fn stock_changed(&self, mut product: Product) -> Product {
        tracing::info!(product_id = %product.id(), stock = product.stock(), "stock updated");
        self.notifier.publish(product.take_events()).await;
        product
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::Role;
    use crate::domain::events::{DomainEvent, ProductEvent};
    use crate::domain::value_objects::Money;
    use crate::notify::MockNotificationSink;
    use crate::store::{MemoryStore, ProductRepository};
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn admin() -> Actor { Actor::new(Uuid::now_v7(), Role::Admin) }

    fn new_product(name: &str, category: &str, stock: u32) -> NewProduct {
        NewProduct { name: name.into(), description: String::new(), price: Money::usd(Decimal::new(1250, 2)), original_price: None, category: category.into(), stock, images: vec![] }
    }

    async fn catalog() -> CatalogService {
        let catalog = CatalogService::new(Arc::new(MemoryStore::new()), Notifier::log_only(), "USD");
        catalog.insert(new_product("Linen Shirt", "apparel", 4)).await.unwrap();
        catalog.insert(new_product("Wool Socks", "apparel", 0)).await.unwrap();
        catalog.insert(new_product("Teapot", "kitchen", 9)).await.unwrap();
        catalog
    }

    #[tokio::test]
    async fn filters_combine() {
        let catalog = catalog().await;
        assert_eq!(catalog.list(&ProductFilter::default()).await.unwrap().len(), 3);
        let apparel = ProductFilter { category: Some("Apparel".into()), ..Default::default() };
        assert_eq!(catalog.list(&apparel).await.unwrap().len(), 2);
        let available = ProductFilter { in_stock: true, ..apparel };
        assert_eq!(catalog.list(&available).await.unwrap().len(), 1);
        let search = ProductFilter { search: Some("tea".into()), ..Default::default() };
        assert_eq!(catalog.list(&search).await.unwrap()[0].name(), "Teapot");
        assert_eq!(catalog.categories().await.unwrap(), vec!["apparel".to_string(), "kitchen".to_string()]);
    }

    #[tokio::test]
    async fn update_product_stock_decrements_and_tracks_availability() {
        let catalog = catalog().await;
        let shirt = catalog.list(&ProductFilter { search: Some("linen".into()), ..Default::default() }).await.unwrap().remove(0);
        let after = catalog.update_product_stock(&admin(), shirt.id(), 4).await.unwrap();
        assert_eq!(after.stock(), 0);
        assert!(!after.is_in_stock());
        let err = catalog.update_product_stock(&admin(), shirt.id(), 1).await.unwrap_err();
        assert!(matches!(err, StorefrontError::InsufficientStock { requested: 1, available: 0, .. }));
    }

    #[tokio::test]
    async fn stock_administration_requires_admin() {
        let catalog = catalog().await;
        let customer = Actor::new(Uuid::now_v7(), Role::User);
        let teapot = catalog.list(&ProductFilter { search: Some("teapot".into()), ..Default::default() }).await.unwrap().remove(0);
        assert!(matches!(catalog.set_stock(&customer, teapot.id(), 1).await, Err(StorefrontError::Unauthorized)));
        assert!(matches!(catalog.create_product(&customer, new_product("X", "y", 1)).await, Err(StorefrontError::Unauthorized)));
        assert_eq!(catalog.set_stock(&admin(), teapot.id(), 2).await.unwrap().stock(), 2);
    }

    #[tokio::test]
    async fn stock_changes_reach_the_notifier() {
        let store = Arc::new(MemoryStore::new());
        let seeded = CatalogService::new(store.clone(), Notifier::log_only(), "USD");
        let mug = seeded.insert(new_product("Mug", "kitchen", 5)).await.unwrap();

        let mut sink = MockNotificationSink::new();
        let id = mug.id();
        sink.expect_deliver()
            .withf(move |e| *e == DomainEvent::Product(ProductEvent::StockChanged { product_id: id, stock: 3 }))
            .times(1)
            .returning(|_| Ok(()));
        sink.expect_deliver()
            .withf(move |e| *e == DomainEvent::Product(ProductEvent::StockChanged { product_id: id, stock: 10 }))
            .times(1)
            .returning(|_| Ok(()));
        let catalog = CatalogService::new(store.clone(), Notifier::new(Arc::new(sink)), "USD");

        catalog.update_product_stock(&admin(), id, 2).await.unwrap();
        catalog.set_stock(&admin(), id, 10).await.unwrap();
        assert!(store.get_product(id).await.unwrap().unwrap().take_events().is_empty());
    }

    #[tokio::test]
    async fn rejects_foreign_currency() {
        let catalog = catalog().await;
        let euro = NewProduct { price: Money::new(Decimal::ONE, "EUR"), ..new_product("Croissant", "bakery", 1) };
        assert!(matches!(catalog.insert(euro).await, Err(StorefrontError::Validation(_))));
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        assert!(matches!(catalog().await.get(Uuid::now_v7()).await, Err(StorefrontError::NotFound("product"))));
    }
}
