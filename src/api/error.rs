//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::domain::aggregates::CouponError;
use crate::StorefrontError;

#[derive(Debug)]
pub enum ApiError {
    /// No bearer token, or one that does not resolve to a session.
    Unauthenticated,
    /// Guest request without a cart session key.
    MissingCartSession,
    Domain(StorefrontError),
}

impl From<StorefrontError> for ApiError {
    fn from(e: StorefrontError) -> Self { Self::Domain(e) }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::MissingCartSession => StatusCode::BAD_REQUEST,
            Self::Domain(e) => match e {
                StorefrontError::NotFound(_) => StatusCode::NOT_FOUND,
                StorefrontError::Unauthorized | StorefrontError::PasswordChangeRequired => StatusCode::FORBIDDEN,
                StorefrontError::InvalidState(_) | StorefrontError::AlreadyExists(_) | StorefrontError::InsufficientStock { .. } => StatusCode::CONFLICT,
                StorefrontError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                StorefrontError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                StorefrontError::Coupon(CouponError::NotFound) => StatusCode::NOT_FOUND,
                StorefrontError::Coupon(_) => StatusCode::BAD_REQUEST,
                StorefrontError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::MissingCartSession => "missing_cart_session",
            Self::Domain(e) => match e {
                StorefrontError::NotFound(_) => "not_found",
                StorefrontError::Unauthorized => "unauthorized",
                StorefrontError::InvalidState(_) => "invalid_state",
                StorefrontError::AlreadyExists(_) => "already_exists",
                StorefrontError::InvalidCredentials => "invalid_credentials",
                StorefrontError::PasswordChangeRequired => "password_change_required",
                StorefrontError::Validation(_) => "validation",
                StorefrontError::InsufficientStock { .. } => "insufficient_stock",
                StorefrontError::Coupon(CouponError::NotYetValid) => "coupon_not_yet_valid",
                StorefrontError::Coupon(CouponError::Expired) => "coupon_expired",
                StorefrontError::Coupon(_) => "coupon_not_found",
                StorefrontError::Store(_) => "internal",
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Don't expose backend details to clients
        let message = match &self {
            Self::Unauthenticated => "authentication required".to_string(),
            Self::MissingCartSession => "x-cart-session header is required for guest carts".to_string(),
            Self::Domain(e @ StorefrontError::Store(_)) => {
                tracing::error!(error = %e, "request failed");
                "internal server error".to_string()
            }
            Self::Domain(e) => e.to_string(),
        };
        (status, Json(json!({ "error": self.code(), "message": message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;

    #[test]
    fn statuses() {
        assert_eq!(ApiError::from(StorefrontError::NotFound("order")).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::from(StorefrontError::Unauthorized).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::from(StorefrontError::InvalidState("shipped".into())).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::from(StorefrontError::InvalidCredentials).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::from(StorefrontError::PasswordChangeRequired).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::from(StorefrontError::Coupon(CouponError::Expired)).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn backend_errors_are_not_leaked() {
        let response = ApiError::from(StorefrontError::Store(StoreError::Backend("password=hunter2".into()))).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(!String::from_utf8_lossy(&body).contains("hunter2"));
    }
}
