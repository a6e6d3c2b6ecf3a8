//! Checkout and the order lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::{Actor, AddressService, CartService, CheckoutSettings, CouponService};
use crate::domain::aggregates::{Address, CartLine, CartOwner, Order, OrderOwner, OrderStatus, OrderTotals};
use crate::domain::value_objects::{CouponCode, Money};
use crate::notify::Notifier;
use crate::store::DynStore;
use crate::{Result, StorefrontError};

/// Shipping destination and coupon chosen at checkout. A saved address is
/// referenced by `address_id`; otherwise `address` is used as given.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutRequest {
    pub address_id: Option<Uuid>,
    pub address: Option<Address>,
    pub coupon: Option<String>,
}

/// Priced cart, before any order exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    #[serde(flatten)]
    pub totals: OrderTotals,
    pub coupon: Option<CouponCode>,
}

pub struct OrderService {
    store: DynStore,
    notifier: Notifier,
    settings: CheckoutSettings,
    carts: Arc<CartService>,
    coupons: Arc<CouponService>,
    addresses: Arc<AddressService>,
}

impl OrderService {
    pub fn new(
        store: DynStore,
        notifier: Notifier,
        settings: CheckoutSettings,
        carts: Arc<CartService>,
        coupons: Arc<CouponService>,
        addresses: Arc<AddressService>,
    ) -> Self {
        Self { store, notifier, settings, carts, coupons, addresses }
    }

    /// Subtotal, coupon discount and shipping for `lines` at `now`.
    pub async fn quote(&self, lines: &[CartLine], coupon: Option<&str>, now: DateTime<Utc>) -> Result<Quote> {
        let currency = &self.settings.currency;
        let subtotal = lines.iter().try_fold(Money::zero(currency), |acc, line| acc.add(&line.line_total()))?;
        let (discount, coupon) = match coupon.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => {
                let coupon = self.coupons.validate(code, now).await?;
                (coupon.discount.amount_off(&subtotal)?, Some(coupon.code))
            }
            None => (Money::zero(currency), None),
        };
        let shipping = self.settings.shipping_for(&subtotal.saturating_sub(&discount)?);
        Ok(Quote { totals: OrderTotals::compute(subtotal, discount, shipping)?, coupon })
    }

    pub async fn quote_cart(&self, owner: &CartOwner, coupon: Option<&str>) -> Result<Quote> {
        let cart = self.carts.cart(owner).await?;
        self.quote(cart.lines(), coupon, Utc::now()).await
    }

    /// Stores a new `pending` order, reserving stock for every line in the same step.
    pub async fn create_order(
        &self,
        owner: OrderOwner,
        lines: &[CartLine],
        totals: OrderTotals,
        coupon: Option<CouponCode>,
        address: &Address,
    ) -> Result<Order> {
        let mut order = Order::place(owner, lines, totals, coupon, address)?;
        self.store.place_order(&order).await?;
        tracing::info!(order_id = %order.id(), %owner, total = %order.total(), "order placed");
        self.notifier.publish(order.take_events()).await;
        Ok(order)
    }

    /// Turns the owner's cart into an order, then empties the cart.
    #[tracing::instrument(skip(self, actor, request), fields(cart = cart_owner.as_str()))]
    pub async fn checkout(&self, cart_owner: &CartOwner, actor: Option<&Actor>, request: CheckoutRequest) -> Result<Order> {
        let cart = self.carts.cart(cart_owner).await?;
        if cart.is_empty() { return Err(StorefrontError::Validation("cart is empty".into())); }
        let address = self.shipping_address(actor, &request).await?;
        let quote = self.quote(cart.lines(), request.coupon.as_deref(), Utc::now()).await?;
        let owner = actor.map_or(OrderOwner::Guest, |a| OrderOwner::User(a.user_id));
        let order = self.create_order(owner, cart.lines(), quote.totals, quote.coupon, &address).await?;
        if let Err(e) = self.carts.clear_cart(cart_owner).await {
            tracing::warn!(order_id = %order.id(), error = %e, "order placed but cart not cleared");
        }
        Ok(order)
    }

    async fn shipping_address(&self, actor: Option<&Actor>, request: &CheckoutRequest) -> Result<Address> {
        let address = match (request.address_id, &request.address) {
            (Some(id), _) => self.addresses.owned(actor.ok_or(StorefrontError::Unauthorized)?, id).await?,
            (None, Some(address)) => address.clone(),
            (None, None) => return Err(StorefrontError::Validation("a shipping address is required".into())),
        };
        address.validate()?;
        Ok(address)
    }

    /// Buyer cancellation: only the owner, only before shipping. Reserved stock is released.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: Uuid, user_id: Uuid) -> Result<Order> {
        let mut order = self.load(order_id).await?;
        let from = order.status();
        order.cancel(user_id)?;
        self.store.update_order(&order, from, true).await?;
        tracing::info!(order_id = %order_id, "order cancelled by customer");
        self.notifier.publish(order.take_events()).await;
        Ok(order)
    }

    /// Admin status change, restricted to the lifecycle transition table.
    #[tracing::instrument(skip(self), fields(by = %actor.user_id))]
    pub async fn update_status(&self, actor: &Actor, order_id: Uuid, status: OrderStatus) -> Result<Order> {
        actor.require_admin()?;
        let mut order = self.load(order_id).await?;
        let from = order.status();
        order.transition(status)?;
        self.store.update_order(&order, from, status == OrderStatus::Cancelled).await?;
        tracing::info!(order_id = %order_id, %from, to = %status, "order status changed");
        self.notifier.publish(order.take_events()).await;
        Ok(order)
    }

    /// Hard delete. Stock is not restored.
    #[tracing::instrument(skip(self), fields(by = %actor.user_id))]
    pub async fn delete_order(&self, actor: &Actor, order_id: Uuid) -> Result<()> {
        actor.require_admin()?;
        self.store.delete_order(order_id).await?;
        tracing::info!(order_id = %order_id, "order deleted");
        Ok(())
    }

    pub async fn orders_for(&self, actor: &Actor) -> Result<Vec<Order>> {
        Ok(self.store.list_orders_for(OrderOwner::User(actor.user_id)).await?)
    }

    pub async fn get_order(&self, actor: &Actor, order_id: Uuid) -> Result<Order> {
        let order = self.load(order_id).await?;
        if !actor.is_admin() && !order.is_owned_by(actor.user_id) { return Err(StorefrontError::Unauthorized); }
        Ok(order)
    }

    pub async fn all_orders(&self, actor: &Actor, status: Option<OrderStatus>) -> Result<Vec<Order>> {
        actor.require_admin()?;
        Ok(self.store.list_orders(status).await?)
    }

    async fn load(&self, order_id: Uuid) -> Result<Order> {
        self.store.get_order(order_id).await?.ok_or(StorefrontError::NotFound("order"))
    }
}
