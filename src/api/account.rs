//! Authentication, account settings and the address book.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use super::error::ApiResult;
use super::extract::{Authenticated, SignedIn};
use crate::domain::aggregates::{Address, UserProfile, UserSettings};
use crate::services::{Login, Services};

pub fn routes() -> Router<Services> {
    Router::new()
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/auth/password", put(change_password))
        .route("/api/v1/account", get(profile))
        .route("/api/v1/account/settings", put(update_settings))
        .route("/api/v1/addresses", get(list_addresses).post(add_address))
        .route("/api/v1/addresses/:id", put(update_address).delete(remove_address))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest { pub name: String, pub email: String, pub password: String }

#[derive(Debug, Deserialize)]
pub struct LoginRequest { pub email: String, pub password: String }

#[derive(Debug, Deserialize)]
pub struct PasswordChange { pub current_password: String, pub new_password: String }

async fn register(State(s): State<Services>, Json(r): Json<RegisterRequest>) -> ApiResult<(StatusCode, Json<UserProfile>)> {
    Ok((StatusCode::CREATED, Json(s.accounts.register(&r.name, &r.email, &r.password).await?)))
}

async fn login(State(s): State<Services>, Json(r): Json<LoginRequest>) -> ApiResult<Json<Login>> {
    Ok(Json(s.accounts.login(&r.email, &r.password).await?))
}

async fn logout(State(s): State<Services>, SignedIn(actor): SignedIn) -> ApiResult<StatusCode> {
    s.accounts.logout(&actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn change_password(State(s): State<Services>, SignedIn(actor): SignedIn, Json(r): Json<PasswordChange>) -> ApiResult<Json<Login>> {
    Ok(Json(s.accounts.change_password(&actor, &r.current_password, &r.new_password).await?))
}

async fn profile(State(s): State<Services>, SignedIn(actor): SignedIn) -> ApiResult<Json<UserProfile>> {
    Ok(Json(s.accounts.profile(&actor).await?))
}

async fn update_settings(State(s): State<Services>, auth: Authenticated, Json(settings): Json<UserSettings>) -> ApiResult<Json<UserProfile>> {
    Ok(Json(s.accounts.update_settings(&auth.actor, settings).await?))
}

async fn list_addresses(State(s): State<Services>, auth: Authenticated) -> ApiResult<Json<Vec<Address>>> {
    Ok(Json(s.addresses.list(&auth.actor).await?))
}

async fn add_address(State(s): State<Services>, auth: Authenticated, Json(address): Json<Address>) -> ApiResult<(StatusCode, Json<Address>)> {
    Ok((StatusCode::CREATED, Json(s.addresses.add(&auth.actor, address).await?)))
}

async fn update_address(State(s): State<Services>, auth: Authenticated, Path(id): Path<Uuid>, Json(address): Json<Address>) -> ApiResult<Json<Address>> {
    Ok(Json(s.addresses.update(&auth.actor, Address { id: Some(id), ..address }).await?))
}

async fn remove_address(State(s): State<Services>, auth: Authenticated, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    s.addresses.remove(&auth.actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
