//! Request extractors: bearer tokens and cart ownership.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

use super::error::ApiError;
use crate::domain::aggregates::CartOwner;
use crate::services::{Actor, Services};
use crate::StorefrontError;

pub const CART_SESSION_HEADER: &str = "x-cart-session";

fn bearer(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

async fn resolve(parts: &Parts, state: &Services) -> Result<Option<Actor>, ApiError> {
    let Some(token) = bearer(parts) else { return Ok(None) };
    match state.accounts.authenticate(token).await {
        Ok(actor) => Ok(Some(actor)),
        Err(StorefrontError::InvalidCredentials) => Err(ApiError::Unauthenticated),
        Err(e) => Err(e.into()),
    }
}

/// A signed-in caller whose password is current. Rejects with 401 when the
/// token is missing or refused, and with 403 while a password change is pending.
#[derive(Debug, Clone, Copy)]
pub struct Authenticated {
    pub actor: Actor,
}

#[async_trait]
impl FromRequestParts<Services> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Services) -> Result<Self, Self::Rejection> {
        let actor = resolve(parts, state).await?.ok_or(ApiError::Unauthenticated)?;
        actor.require_password_current()?;
        Ok(Self { actor })
    }
}

/// Any valid session, including one that still has to change its password.
/// Only the routes that let such an account get unstuck take this.
#[derive(Debug, Clone, Copy)]
pub struct SignedIn(pub Actor);

#[async_trait]
impl FromRequestParts<Services> for SignedIn {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Services) -> Result<Self, Self::Rejection> {
        resolve(parts, state).await?.map(Self).ok_or(ApiError::Unauthenticated)
    }
}

/// Whose cart a request addresses: the signed-in user's, or the guest cart named
/// by the `x-cart-session` header.
#[derive(Debug, Clone)]
pub struct CartKey {
    pub owner: CartOwner,
    pub actor: Option<Actor>,
}

#[async_trait]
impl FromRequestParts<Services> for CartKey {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Services) -> Result<Self, Self::Rejection> {
        if let Some(actor) = resolve(parts, state).await? {
            actor.require_password_current()?;
            return Ok(Self { owner: CartOwner::user(actor.user_id), actor: Some(actor) });
        }
        let session = parts
            .headers
            .get(CART_SESSION_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty() && s.len() <= 128)
            .ok_or(ApiError::MissingCartSession)?;
        Ok(Self { owner: CartOwner::guest(session), actor: None })
    }
}
