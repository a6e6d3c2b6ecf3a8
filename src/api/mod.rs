//! HTTP surface.

mod account;
mod admin;
pub mod error;
pub mod extract;
mod shop;

use axum::routing::get;
use axum::{Json, Router};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::services::Services;

pub use error::{ApiError, ApiResult};
pub use extract::CART_SESSION_HEADER;

pub fn router(services: Services) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront"})) }))
        .merge(shop::routes())
        .merge(account::routes())
        .merge(admin::routes())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
        .with_state(services)
}
