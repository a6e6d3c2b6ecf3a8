//! Configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `DATABASE_URL` - `PostgreSQL` connection string; unset runs on the in-memory store
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8083)
//! - `NATS_URL` - Order notifications go to NATS when set, to the log otherwise
//! - `STORE_CURRENCY` - Three-letter currency of every price (default: USD)
//! - `SHIPPING_FEE` - Flat shipping fee (default: 0)
//! - `FREE_SHIPPING_THRESHOLD` - Discounted subtotal from which shipping is free
//! - `LOW_STOCK_THRESHOLD` - Admin low-stock cut-off (default: 5)
//! - `SEED_DEMO_DATA` - Seed a demo catalog into an empty store (default: true)
//! - `ADMIN_EMAIL` / `ADMIN_PASSWORD` - Bootstrap admin, created if missing
//! - `JWT_SECRET` - Session signing secret, at least 32 bytes. Unset signs with a
//!   random per-process key, so sessions end on restart
//! - `SESSION_TTL_MINUTES` - Session lifetime (default: 1440)

use chrono::Duration;
use rust_decimal::Decimal;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use thiserror::Error;

use crate::domain::value_objects::Money;
use crate::services::sessions::MIN_SECRET_LENGTH;
use crate::services::{CheckoutSettings, SessionTokens};

/// Longest accepted session lifetime: 30 days.
const MAX_SESSION_TTL_MINUTES: i64 = 30 * 24 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin").field("email", &self.email).field("password", &"[REDACTED]").finish()
    }
}

#[derive(Clone)]
pub struct SessionSecret(String);

impl std::fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str("SessionSecret([REDACTED])") }
}

#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    pub database_url: Option<String>,
    pub host: IpAddr,
    pub port: u16,
    pub nats_url: Option<String>,
    pub currency: String,
    pub shipping_fee: Decimal,
    pub free_shipping_threshold: Option<Decimal>,
    pub low_stock_threshold: u32,
    pub seed_demo_data: bool,
    pub admin: Option<BootstrapAdmin>,
    pub session_secret: Option<SessionSecret>,
    pub session_ttl_minutes: i64,
}

impl StorefrontConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let currency = get("STORE_CURRENCY").unwrap_or_else(|| "USD".to_string()).to_ascii_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::InvalidEnvVar("STORE_CURRENCY".into(), "expected a three-letter code".into()));
        }

        let admin = match (get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(BootstrapAdmin { email, password }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::MissingEnvVar("ADMIN_PASSWORD".into())),
            (None, Some(_)) => return Err(ConfigError::MissingEnvVar("ADMIN_EMAIL".into())),
        };

        let shipping_fee = parse_or("SHIPPING_FEE", get("SHIPPING_FEE"), Decimal::ZERO)?;
        let free_shipping_threshold = get("FREE_SHIPPING_THRESHOLD").map(|v| parse("FREE_SHIPPING_THRESHOLD", &v)).transpose()?;
        if shipping_fee.is_sign_negative() || free_shipping_threshold.is_some_and(|t: Decimal| t.is_sign_negative()) {
            return Err(ConfigError::InvalidEnvVar("SHIPPING_FEE".into(), "amounts must not be negative".into()));
        }

        let session_secret = get("JWT_SECRET").map(SessionSecret);
        if session_secret.as_ref().is_some_and(|s| s.0.len() < MIN_SECRET_LENGTH) {
            return Err(ConfigError::InvalidEnvVar("JWT_SECRET".into(), format!("must be at least {MIN_SECRET_LENGTH} bytes")));
        }
        let session_ttl_minutes: i64 = parse_or("SESSION_TTL_MINUTES", get("SESSION_TTL_MINUTES"), 1440)?;
        if !(1..=MAX_SESSION_TTL_MINUTES).contains(&session_ttl_minutes) {
            return Err(ConfigError::InvalidEnvVar("SESSION_TTL_MINUTES".into(), format!("expected 1 to {MAX_SESSION_TTL_MINUTES}")));
        }

        Ok(Self {
            database_url: get("DATABASE_URL"),
            host: parse_or("HOST", get("HOST"), IpAddr::from([0, 0, 0, 0]))?,
            port: parse_or("PORT", get("PORT"), 8083)?,
            nats_url: get("NATS_URL"),
            currency,
            shipping_fee,
            free_shipping_threshold,
            low_stock_threshold: parse_or("LOW_STOCK_THRESHOLD", get("LOW_STOCK_THRESHOLD"), 5)?,
            seed_demo_data: parse_bool("SEED_DEMO_DATA", get("SEED_DEMO_DATA"), true)?,
            admin,
            session_secret,
            session_ttl_minutes,
        })
    }

    pub fn addr(&self) -> SocketAddr { SocketAddr::new(self.host, self.port) }

    /// Signing keys for session tokens; a random key when no secret is configured.
    pub fn session_tokens(&self) -> SessionTokens {
        let ttl = Duration::minutes(self.session_ttl_minutes);
        match &self.session_secret {
            Some(secret) => SessionTokens::new(secret.0.as_bytes(), ttl),
            None => SessionTokens::ephemeral(ttl),
        }
    }

    pub fn checkout(&self) -> CheckoutSettings {
        CheckoutSettings {
            currency: self.currency.clone(),
            shipping_fee: Money::new(self.shipping_fee, &self.currency),
            free_shipping_threshold: self.free_shipping_threshold.map(|t| Money::new(t, &self.currency)),
        }
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.map_or(Ok(default), |v| parse(key, &v))
}

fn parse_bool(key: &str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::InvalidEnvVar(key.to_string(), format!("not a boolean: {other}"))),
    }
}
