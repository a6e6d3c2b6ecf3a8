//! Cart and wishlist, written through to the store on every change.

use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartOwner, Product, Wishlist};
use crate::domain::value_objects::Money;
use crate::store::DynStore;
use crate::{Result, StorefrontError};

pub struct CartService {
    store: DynStore,
    currency: String,
}

impl CartService {
    pub fn new(store: DynStore, currency: impl Into<String>) -> Self { Self { store, currency: currency.into() } }

    pub async fn cart(&self, owner: &CartOwner) -> Result<Cart> {
        Ok(self.store.load_cart(owner).await?.unwrap_or_else(|| Cart::new(owner.clone(), &self.currency)))
    }

    pub async fn wishlist(&self, owner: &CartOwner) -> Result<Wishlist> {
        Ok(self.store.load_wishlist(owner).await?.unwrap_or_else(|| Wishlist::new(owner.clone())))
    }

    /// Increments the existing line or appends a new one. Stock is not checked here;
    /// it is reserved when the order is placed.
    #[tracing::instrument(skip(self))]
    pub async fn add_to_cart(&self, owner: &CartOwner, product_id: Uuid, qty: u32) -> Result<Cart> {
        let product = self.product(product_id).await?;
        let mut cart = self.cart(owner).await?;
        cart.add(&product, qty)?;
        self.store.save_cart(&cart).await?;
        Ok(cart)
    }

    pub async fn remove_from_cart(&self, owner: &CartOwner, product_id: Uuid) -> Result<Cart> {
        let mut cart = self.cart(owner).await?;
        cart.remove(product_id);
        self.store.save_cart(&cart).await?;
        Ok(cart)
    }

    /// Sets the quantity exactly; zero or less removes the line.
    pub async fn update_quantity(&self, owner: &CartOwner, product_id: Uuid, qty: i64) -> Result<Cart> {
        let mut cart = self.cart(owner).await?;
        let qty = u32::try_from(qty.max(0)).map_err(|_| StorefrontError::Validation("quantity is too large".into()))?;
        cart.update_quantity(product_id, qty)?;
        self.store.save_cart(&cart).await?;
        Ok(cart)
    }

    pub async fn cart_total(&self, owner: &CartOwner) -> Result<Money> {
        Ok(self.cart(owner).await?.total())
    }

    pub async fn clear_cart(&self, owner: &CartOwner) -> Result<Cart> {
        let mut cart = self.cart(owner).await?;
        cart.clear();
        self.store.save_cart(&cart).await?;
        Ok(cart)
    }

    pub async fn add_to_wishlist(&self, owner: &CartOwner, product_id: Uuid) -> Result<Wishlist> {
        let product = self.product(product_id).await?;
        let mut wishlist = self.wishlist(owner).await?;
        if wishlist.add(&product) {
            self.store.save_wishlist(&wishlist).await?;
        }
        Ok(wishlist)
    }

    pub async fn remove_from_wishlist(&self, owner: &CartOwner, product_id: Uuid) -> Result<Wishlist> {
        let mut wishlist = self.wishlist(owner).await?;
        if wishlist.remove(product_id) {
            self.store.save_wishlist(&wishlist).await?;
        }
        Ok(wishlist)
    }

    pub async fn is_in_wishlist(&self, owner: &CartOwner, product_id: Uuid) -> Result<bool> {
        Ok(self.wishlist(owner).await?.contains(product_id))
    }

    pub async fn toggle_wishlist(&self, owner: &CartOwner, product_id: Uuid) -> Result<Wishlist> {
        let product = self.product(product_id).await?;
        let mut wishlist = self.wishlist(owner).await?;
        wishlist.toggle(&product);
        self.store.save_wishlist(&wishlist).await?;
        Ok(wishlist)
    }

    /// Moves one unit of a wished-for product into the cart.
    pub async fn move_to_cart(&self, owner: &CartOwner, product_id: Uuid) -> Result<(Cart, Wishlist)> {
        if !self.is_in_wishlist(owner, product_id).await? {
            return Err(StorefrontError::NotFound("wishlist item"));
        }
        let cart = self.add_to_cart(owner, product_id, 1).await?;
        let wishlist = self.remove_from_wishlist(owner, product_id).await?;
        Ok((cart, wishlist))
    }

    async fn product(&self, id: Uuid) -> Result<Product> {
        self.store.get_product(id).await?.ok_or(StorefrontError::NotFound("product"))
    }
}
