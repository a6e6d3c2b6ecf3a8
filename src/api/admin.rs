//! Back-office routes. Every handler goes through `Actor::require_admin` in the service it calls.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use super::error::ApiResult;
use super::extract::Authenticated;
use crate::domain::aggregates::{Coupon, NewProduct, OrderRecord, OrderStatus, Product, UserProfile};
use crate::services::admin::StockAlert;
use crate::services::{Dashboard, NewCoupon, Services};

pub fn routes() -> Router<Services> {
    Router::new()
        .route("/api/v1/admin/dashboard", get(dashboard))
        .route("/api/v1/admin/low-stock", get(low_stock))
        .route("/api/v1/admin/orders", get(list_orders))
        .route("/api/v1/admin/orders/:id", delete(delete_order))
        .route("/api/v1/admin/orders/:id/status", put(update_status))
        .route("/api/v1/admin/products", post(create_product))
        .route("/api/v1/admin/products/:id/stock", put(set_stock))
        .route("/api/v1/admin/products/:id/stock/remove", post(remove_stock))
        .route("/api/v1/admin/coupons", get(list_coupons).post(create_coupon))
        .route("/api/v1/admin/admins", post(create_admin))
}

#[derive(Debug, Deserialize)]
pub struct StatusFilter { pub status: Option<OrderStatus> }

#[derive(Debug, Deserialize)]
pub struct StatusUpdate { pub status: OrderStatus }

#[derive(Debug, Deserialize)]
pub struct StockLevel { pub stock: u32 }

#[derive(Debug, Deserialize)]
pub struct StockRemoval { pub quantity: u32 }

#[derive(Debug, Deserialize)]
pub struct NewAdmin { pub name: String, pub email: String, pub password: String }

async fn dashboard(State(s): State<Services>, auth: Authenticated) -> ApiResult<Json<Dashboard>> {
    Ok(Json(s.admin.dashboard(&auth.actor).await?))
}

async fn low_stock(State(s): State<Services>, auth: Authenticated) -> ApiResult<Json<Vec<StockAlert>>> {
    Ok(Json(s.admin.low_stock(&auth.actor).await?))
}

async fn list_orders(State(s): State<Services>, auth: Authenticated, Query(f): Query<StatusFilter>) -> ApiResult<Json<Vec<OrderRecord>>> {
    Ok(Json(s.orders.all_orders(&auth.actor, f.status).await?.iter().map(|o| o.to_record()).collect()))
}

async fn update_status(State(s): State<Services>, auth: Authenticated, Path(id): Path<Uuid>, Json(r): Json<StatusUpdate>) -> ApiResult<Json<OrderRecord>> {
    Ok(Json(s.orders.update_status(&auth.actor, id, r.status).await?.to_record()))
}

async fn delete_order(State(s): State<Services>, auth: Authenticated, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    s.orders.delete_order(&auth.actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_product(State(s): State<Services>, auth: Authenticated, Json(r): Json<NewProduct>) -> ApiResult<(StatusCode, Json<Product>)> {
    Ok((StatusCode::CREATED, Json(s.catalog.create_product(&auth.actor, r).await?)))
}

async fn set_stock(State(s): State<Services>, auth: Authenticated, Path(id): Path<Uuid>, Json(r): Json<StockLevel>) -> ApiResult<Json<Product>> {
    Ok(Json(s.catalog.set_stock(&auth.actor, id, r.stock).await?))
}

async fn remove_stock(State(s): State<Services>, auth: Authenticated, Path(id): Path<Uuid>, Json(r): Json<StockRemoval>) -> ApiResult<Json<Product>> {
    Ok(Json(s.catalog.update_product_stock(&auth.actor, id, r.quantity).await?))
}

async fn list_coupons(State(s): State<Services>, auth: Authenticated) -> ApiResult<Json<Vec<Coupon>>> {
    Ok(Json(s.coupons.list(&auth.actor).await?))
}

async fn create_coupon(State(s): State<Services>, auth: Authenticated, Json(r): Json<NewCoupon>) -> ApiResult<(StatusCode, Json<Coupon>)> {
    Ok((StatusCode::CREATED, Json(s.coupons.create(&auth.actor, r).await?)))
}

async fn create_admin(State(s): State<Services>, auth: Authenticated, Json(r): Json<NewAdmin>) -> ApiResult<(StatusCode, Json<UserProfile>)> {
    Ok((StatusCode::CREATED, Json(s.accounts.create_admin(&auth.actor, &r.name, &r.email, &r.password).await?)))
}
