//! Product Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use crate::domain::value_objects::{Money, Quantity};
use crate::domain::events::{DomainEvent, ProductEvent};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    id: Uuid,
    name: String,
    description: String,
    price: Money,
    original_price: Option<Money>,
    category: String,
    stock: Quantity,
    in_stock: bool,
    rating: Rating,
    images: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

/// Fields supplied when a product enters the catalog.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    #[serde(default)]
    pub original_price: Option<Money>,
    pub category: String,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rating { pub average: f32, pub reviews: u32 }

impl Product {
    pub fn create(new: NewProduct) -> Result<Self, ProductError> {
        let now = Utc::now();
        Self::restore(Uuid::now_v7(), new, Rating::default(), now, now)
    }

    /// Rebuilds a product from persisted fields; `in_stock` is always re-derived.
    pub fn restore(id: Uuid, new: NewProduct, rating: Rating, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Result<Self, ProductError> {
        if new.name.trim().is_empty() { return Err(ProductError::MissingName); }
        if new.price.is_negative() { return Err(ProductError::NegativePrice); }
        let stock = Quantity::new(new.stock);
        Ok(Self {
            id, name: new.name, description: new.description, price: new.price, original_price: new.original_price,
            category: new.category, in_stock: !stock.is_zero(), stock, rating, images: new.images,
            created_at, updated_at, events: vec![],
        })
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn description(&self) -> &str { &self.description }
    pub fn price(&self) -> &Money { &self.price }
    pub fn original_price(&self) -> Option<&Money> { self.original_price.as_ref() }
    pub fn category(&self) -> &str { &self.category }
    pub fn stock(&self) -> u32 { self.stock.value() }
    pub fn is_in_stock(&self) -> bool { self.in_stock }
    pub fn rating(&self) -> Rating { self.rating }
    pub fn images(&self) -> &[String] { &self.images }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Case-insensitive match against name, description and category.
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.name.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
            || self.category.to_lowercase().contains(&needle)
    }

    /// Takes `qty` units out of stock.
    pub fn remove_stock(&mut self, qty: u32) -> Result<(), ProductError> {
        self.stock = self.stock.subtract(qty).ok_or(ProductError::InsufficientStock { requested: qty, available: self.stock.value() })?;
        self.stock_changed();
        Ok(())
    }

    pub fn add_stock(&mut self, qty: u32) {
        self.stock = self.stock.add(qty);
        self.stock_changed();
    }

    pub fn set_stock(&mut self, qty: u32) {
        self.stock = Quantity::new(qty);
        self.stock_changed();
    }

    fn stock_changed(&mut self) {
        self.in_stock = !self.stock.is_zero();
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::StockChanged { product_id: self.id, stock: self.stock.value() }));
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProductError {
    #[error("product name is required")]
    MissingName,
    #[error("price cannot be negative")]
    NegativePrice,
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u32, available: u32 },
}

#[cfg(test)]
pub(crate) fn sample(name: &str, price: i64, stock: u32) -> Product {
    Product::create(NewProduct {
        name: name.into(), description: format!("{name} description"), price: Money::usd(rust_decimal::Decimal::new(price, 0)),
        original_price: None, category: "general".into(), stock, images: vec![],
    }).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_derives_availability() {
        assert!(sample("Lamp", 10, 3).is_in_stock());
        assert!(!sample("Lamp", 10, 0).is_in_stock());
    }

    #[test]
    fn create_requires_name() {
        let mut new = NewProduct { name: " ".into(), description: String::new(), price: Money::default(), original_price: None, category: "x".into(), stock: 0, images: vec![] };
        assert_eq!(Product::create(new.clone()).unwrap_err(), ProductError::MissingName);
        new.name = "ok".into();
        new.price = Money::usd(rust_decimal::Decimal::new(-1, 0));
        assert_eq!(Product::create(new).unwrap_err(), ProductError::NegativePrice);
    }

    #[test]
    fn remove_stock_keeps_availability_in_sync() {
        for (stock, n) in [(5, 0), (5, 3), (5, 5), (1, 1)] {
            let mut p = sample("Mug", 4, stock);
            p.remove_stock(n).unwrap();
            assert_eq!(p.stock(), stock - n);
            assert_eq!(p.is_in_stock(), p.stock() > 0);
        }
    }

    #[test]
    fn remove_stock_refuses_oversell() {
        let mut p = sample("Mug", 4, 2);
        assert_eq!(p.remove_stock(3), Err(ProductError::InsufficientStock { requested: 3, available: 2 }));
        assert_eq!(p.stock(), 2);
    }

    #[test]
    fn stock_changes_raise_events() {
        let mut p = sample("Mug", 4, 0);
        p.add_stock(4);
        assert!(p.is_in_stock());
        let events = p.take_events();
        assert_eq!(events, vec![DomainEvent::Product(ProductEvent::StockChanged { product_id: p.id(), stock: 4 })]);
    }

    #[test]
    fn matches_is_case_insensitive() {
        let p = sample("Silk Scarf", 30, 1);
        assert!(p.matches("scarf"));
        assert!(p.matches("GENERAL"));
        assert!(!p.matches("boots"));
    }
}
