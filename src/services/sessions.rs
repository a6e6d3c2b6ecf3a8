//! Signed bearer tokens.
//!
//! A token names the user, their role and the user's token version at issue
//! time. Bumping the stored version (logout, password change) revokes every
//! token issued before it.

use argon2::password_hash::rand_core::{OsRng, RngCore};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{Role, User};

/// Shortest accepted signing secret, in bytes.
pub const MIN_SECRET_LENGTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,
    pub role: Role,
    pub ver: u32,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session expired")]
    Expired,
    #[error("invalid session token")]
    Invalid,
    #[error("failed to sign session token: {0}")]
    Signing(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl SessionTokens {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp", "iat"]);
        Self { encoding: EncodingKey::from_secret(secret), decoding: DecodingKey::from_secret(secret), validation, ttl }
    }

    /// Keys from a random secret; tokens do not survive a restart.
    pub fn ephemeral(ttl: Duration) -> Self {
        let mut secret = [0u8; MIN_SECRET_LENGTH];
        OsRng.fill_bytes(&mut secret);
        Self::new(&secret, ttl)
    }

    pub fn ttl(&self) -> Duration { self.ttl }

    pub fn issue(&self, user: &User) -> Result<IssuedToken, SessionError> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let claims = SessionClaims { sub: user.id, role: user.role, ver: user.token_version, iat: now.timestamp(), exp: expires_at.timestamp() };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| SessionError::Signing(e.to_string()))?;
        Ok(IssuedToken { token, expires_at })
    }

    /// Checks signature and expiry. Whether the token version is still current is up to the caller.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        decode::<SessionClaims>(token, &self.decoding, &self.validation).map(|data| data.claims).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => SessionError::Expired,
            _ => SessionError::Invalid,
        })
    }
}

impl std::fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokens").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Email;

    fn user() -> User {
        User::new("Ann", Email::parse("ann@example.com").unwrap(), "hash".into(), Role::User)
    }

    #[test]
    fn issued_tokens_verify() {
        let tokens = SessionTokens::ephemeral(Duration::minutes(30));
        let user = user();
        let issued = tokens.issue(&user).unwrap();
        let claims = tokens.verify(&issued.token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.ver, 0);
        assert_eq!(claims.exp, issued.expires_at.timestamp());
    }

    #[test]
    fn expired_tokens_are_refused() {
        let tokens = SessionTokens::ephemeral(Duration::seconds(-5));
        let issued = tokens.issue(&user()).unwrap();
        assert_eq!(tokens.verify(&issued.token), Err(SessionError::Expired));
    }

    #[test]
    fn foreign_and_tampered_tokens_are_refused() {
        let ours = SessionTokens::new(&[7u8; 32], Duration::minutes(5));
        let theirs = SessionTokens::new(&[9u8; 32], Duration::minutes(5));
        let issued = theirs.issue(&user()).unwrap();
        assert_eq!(ours.verify(&issued.token), Err(SessionError::Invalid));
        assert_eq!(ours.verify("not.a.token"), Err(SessionError::Invalid));
    }
}
