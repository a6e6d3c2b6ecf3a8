//! Catalog, cart, wishlist, checkout and order history routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ApiResult;
use super::extract::{Authenticated, CartKey};
use crate::domain::aggregates::{Cart, Discount, OrderRecord, Product, Wishlist};
use crate::domain::value_objects::{CouponCode, Money};
use crate::services::{CheckoutRequest, ProductFilter, Quote, Services};

pub fn routes() -> Router<Services> {
    Router::new()
        .route("/api/v1/products", get(list_products))
        .route("/api/v1/products/:id", get(get_product))
        .route("/api/v1/categories", get(list_categories))
        .route("/api/v1/cart", get(get_cart).delete(clear_cart))
        .route("/api/v1/cart/items", post(add_to_cart))
        .route("/api/v1/cart/items/:product_id", put(update_quantity).delete(remove_from_cart))
        .route("/api/v1/wishlist", get(get_wishlist))
        .route("/api/v1/wishlist/:product_id", post(add_to_wishlist).delete(remove_from_wishlist))
        .route("/api/v1/wishlist/:product_id/toggle", post(toggle_wishlist))
        .route("/api/v1/wishlist/:product_id/move-to-cart", post(move_to_cart))
        .route("/api/v1/coupons/validate", post(validate_coupon))
        .route("/api/v1/checkout/quote", post(quote))
        .route("/api/v1/checkout", post(checkout))
        .route("/api/v1/orders", get(list_orders))
        .route("/api/v1/orders/:id", get(get_order))
        .route("/api/v1/orders/:id/cancel", post(cancel_order))
}

// =============================================================================
// Catalog
// =============================================================================

async fn list_products(State(s): State<Services>, Query(filter): Query<ProductFilter>) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(s.catalog.list(&filter).await?))
}

async fn get_product(State(s): State<Services>, Path(id): Path<Uuid>) -> ApiResult<Json<Product>> {
    Ok(Json(s.catalog.get(id).await?))
}

async fn list_categories(State(s): State<Services>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(s.catalog.categories().await?))
}

// =============================================================================
// Cart & wishlist
// =============================================================================

#[derive(Debug, Serialize)]
pub struct CartView {
    #[serde(flatten)]
    pub cart: Cart,
    pub item_count: u32,
    pub total: Money,
}

impl From<Cart> for CartView {
    fn from(cart: Cart) -> Self { Self { item_count: cart.item_count(), total: cart.total(), cart } }
}

#[derive(Debug, Deserialize)]
pub struct AddItem { pub product_id: Uuid, #[serde(default = "one")] pub quantity: u32 }

fn one() -> u32 { 1 }

#[derive(Debug, Deserialize)]
pub struct SetQuantity { pub quantity: i64 }

async fn get_cart(State(s): State<Services>, key: CartKey) -> ApiResult<Json<CartView>> {
    Ok(Json(s.carts.cart(&key.owner).await?.into()))
}

async fn clear_cart(State(s): State<Services>, key: CartKey) -> ApiResult<Json<CartView>> {
    Ok(Json(s.carts.clear_cart(&key.owner).await?.into()))
}

async fn add_to_cart(State(s): State<Services>, key: CartKey, Json(r): Json<AddItem>) -> ApiResult<Json<CartView>> {
    Ok(Json(s.carts.add_to_cart(&key.owner, r.product_id, r.quantity).await?.into()))
}

async fn update_quantity(State(s): State<Services>, key: CartKey, Path(product_id): Path<Uuid>, Json(r): Json<SetQuantity>) -> ApiResult<Json<CartView>> {
    Ok(Json(s.carts.update_quantity(&key.owner, product_id, r.quantity).await?.into()))
}

async fn remove_from_cart(State(s): State<Services>, key: CartKey, Path(product_id): Path<Uuid>) -> ApiResult<Json<CartView>> {
    Ok(Json(s.carts.remove_from_cart(&key.owner, product_id).await?.into()))
}

async fn get_wishlist(State(s): State<Services>, key: CartKey) -> ApiResult<Json<Wishlist>> {
    Ok(Json(s.carts.wishlist(&key.owner).await?))
}

async fn add_to_wishlist(State(s): State<Services>, key: CartKey, Path(product_id): Path<Uuid>) -> ApiResult<Json<Wishlist>> {
    Ok(Json(s.carts.add_to_wishlist(&key.owner, product_id).await?))
}

async fn remove_from_wishlist(State(s): State<Services>, key: CartKey, Path(product_id): Path<Uuid>) -> ApiResult<Json<Wishlist>> {
    Ok(Json(s.carts.remove_from_wishlist(&key.owner, product_id).await?))
}

async fn toggle_wishlist(State(s): State<Services>, key: CartKey, Path(product_id): Path<Uuid>) -> ApiResult<Json<Wishlist>> {
    Ok(Json(s.carts.toggle_wishlist(&key.owner, product_id).await?))
}

#[derive(Debug, Serialize)]
pub struct Moved { pub cart: CartView, pub wishlist: Wishlist }

async fn move_to_cart(State(s): State<Services>, key: CartKey, Path(product_id): Path<Uuid>) -> ApiResult<Json<Moved>> {
    let (cart, wishlist) = s.carts.move_to_cart(&key.owner, product_id).await?;
    Ok(Json(Moved { cart: cart.into(), wishlist }))
}

// =============================================================================
// Coupons & checkout
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CouponInput { pub code: String }

#[derive(Debug, Serialize)]
pub struct ValidCoupon { pub code: CouponCode, pub discount: Discount }

async fn validate_coupon(State(s): State<Services>, Json(r): Json<CouponInput>) -> ApiResult<Json<ValidCoupon>> {
    let coupon = s.coupons.validate(&r.code, Utc::now()).await?;
    Ok(Json(ValidCoupon { code: coupon.code, discount: coupon.discount }))
}

#[derive(Debug, Default, Deserialize)]
pub struct QuoteInput { pub coupon: Option<String> }

async fn quote(State(s): State<Services>, key: CartKey, Json(r): Json<QuoteInput>) -> ApiResult<Json<Quote>> {
    Ok(Json(s.orders.quote_cart(&key.owner, r.coupon.as_deref()).await?))
}

async fn checkout(State(s): State<Services>, key: CartKey, Json(r): Json<CheckoutRequest>) -> ApiResult<(StatusCode, Json<OrderRecord>)> {
    let order = s.orders.checkout(&key.owner, key.actor.as_ref(), r).await?;
    Ok((StatusCode::CREATED, Json(order.to_record())))
}

// =============================================================================
// Order history
// =============================================================================

async fn list_orders(State(s): State<Services>, auth: Authenticated) -> ApiResult<Json<Vec<OrderRecord>>> {
    Ok(Json(s.orders.orders_for(&auth.actor).await?.iter().map(|o| o.to_record()).collect()))
}

async fn get_order(State(s): State<Services>, auth: Authenticated, Path(id): Path<Uuid>) -> ApiResult<Json<OrderRecord>> {
    Ok(Json(s.orders.get_order(&auth.actor, id).await?.to_record()))
}

async fn cancel_order(State(s): State<Services>, auth: Authenticated, Path(id): Path<Uuid>) -> ApiResult<Json<OrderRecord>> {
    Ok(Json(s.orders.cancel_order(id, auth.actor.user_id).await?.to_record()))
}
