//! Cart and Wishlist Aggregates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;
use crate::domain::aggregates::Product;
use crate::domain::value_objects::Money;

/// Key a cart or wishlist is persisted under: a signed-in user or a guest session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartOwner(String);

impl CartOwner {
    pub fn user(id: Uuid) -> Self { Self(format!("user:{id}")) }
    pub fn guest(session: &str) -> Self { Self(format!("guest:{session}")) }
    pub fn as_str(&self) -> &str { &self.0 }
    pub fn user_id(&self) -> Option<Uuid> { self.0.strip_prefix("user:").and_then(|id| Uuid::parse_str(id).ok()) }
}

impl fmt::Display for CartOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub unit_price: Money,
    pub quantity: u32,
}

impl CartLine {
    pub fn for_product(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id(), name: product.name().to_string(), image: product.images().first().cloned(),
            unit_price: product.price().clone(), quantity,
        }
    }
    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity) }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cart {
    owner: CartOwner,
    lines: Vec<CartLine>,
    currency: String,
    updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(owner: CartOwner, currency: &str) -> Self {
        Self { owner, lines: vec![], currency: currency.to_string(), updated_at: Utc::now() }
    }

    pub fn owner(&self) -> &CartOwner { &self.owner }
    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn item_count(&self) -> u32 { self.lines.iter().map(|l| l.quantity).sum() }
    pub fn line(&self, product_id: Uuid) -> Option<&CartLine> { self.lines.iter().find(|l| l.product_id == product_id) }

    /// Adds `quantity` of a product, merging into an existing line for the same product.
    pub fn add(&mut self, product: &Product, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 { return Err(CartError::InvalidQuantity); }
        if product.price().currency() != self.currency { return Err(CartError::CurrencyMismatch); }
        match self.lines.iter_mut().find(|l| l.product_id == product.id()) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(quantity),
            None => self.lines.push(CartLine::for_product(product, quantity)),
        }
        self.touch();
        Ok(())
    }

    pub fn remove(&mut self, product_id: Uuid) {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        if self.lines.len() != before { self.touch(); }
    }

    /// Sets a line's quantity exactly; zero removes the line.
    pub fn update_quantity(&mut self, product_id: Uuid, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 { self.remove(product_id); return Ok(()); }
        let line = self.lines.iter_mut().find(|l| l.product_id == product_id).ok_or(CartError::LineNotFound(product_id))?;
        line.quantity = quantity;
        self.touch();
        Ok(())
    }

    pub fn total(&self) -> Money {
        self.lines.iter().fold(Money::zero(&self.currency), |acc, l| acc.add(&l.line_total()).unwrap_or(acc))
    }

    pub fn clear(&mut self) { self.lines.clear(); self.touch(); }

    /// Value copy of the lines, used when an order is placed.
    pub fn snapshot(&self) -> Vec<CartLine> { self.lines.clone() }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistLine {
    pub product_id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub price: Money,
    pub added_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Wishlist {
    owner: CartOwner,
    lines: Vec<WishlistLine>,
}

impl Wishlist {
    pub fn new(owner: CartOwner) -> Self { Self { owner, lines: vec![] } }
    pub fn owner(&self) -> &CartOwner { &self.owner }
    pub fn lines(&self) -> &[WishlistLine] { &self.lines }
    pub fn len(&self) -> usize { self.lines.len() }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn contains(&self, product_id: Uuid) -> bool { self.lines.iter().any(|l| l.product_id == product_id) }

    /// Returns false if the product was already present.
    pub fn add(&mut self, product: &Product) -> bool {
        if self.contains(product.id()) { return false; }
        self.lines.push(WishlistLine {
            product_id: product.id(), name: product.name().to_string(), image: product.images().first().cloned(),
            price: product.price().clone(), added_at: Utc::now(),
        });
        true
    }

    /// Returns false if the product was not present.
    pub fn remove(&mut self, product_id: Uuid) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        self.lines.len() != before
    }

    /// Adds when absent, removes when present; returns whether it is now wished for.
    pub fn toggle(&mut self, product: &Product) -> bool {
        if self.remove(product.id()) { false } else { self.add(product) }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("quantity must be at least 1")]
    InvalidQuantity,
    #[error("product {0} is not in the cart")]
    LineNotFound(Uuid),
    #[error("product is priced in a different currency")]
    CurrencyMismatch,
}
