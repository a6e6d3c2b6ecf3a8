//! Accounts, credentials and the role gate.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::sessions::SessionTokens;
use crate::domain::aggregates::{Role, User, UserProfile, UserSettings};
use crate::domain::value_objects::Email;
use crate::store::{DynStore, StoreError};
use crate::{Result, StorefrontError};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// The identity an operation runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
    pub must_change_password: bool,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self { Self { user_id, role, must_change_password: false } }

    pub fn is_admin(&self) -> bool { self.role == Role::Admin }

    /// Refuses accounts still on a password they were told to replace.
    pub fn require_password_current(&self) -> Result<()> {
        if self.must_change_password { Err(StorefrontError::PasswordChangeRequired) } else { Ok(()) }
    }

    /// The single gate every admin-only operation passes through.
    pub fn require_admin(&self) -> Result<()> {
        if !self.is_admin() { return Err(StorefrontError::Unauthorized); }
        self.require_password_current()
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self { Self { user_id: user.id, role: user.role, must_change_password: user.must_change_password } }
}

/// A freshly issued session.
#[derive(Debug, Clone, Serialize)]
pub struct Login {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

/// One-way password hashing.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String>;
    fn verify(&self, password: &str, hash: &str) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2Hasher;

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| StorefrontError::Store(StoreError::Backend(format!("password hashing failed: {e}"))))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        PasswordHash::new(hash).is_ok_and(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
    }
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(StorefrontError::Validation(format!("password must be at least {MIN_PASSWORD_LENGTH} characters")));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() { return Err(StorefrontError::Validation("name is required".into())); }
    Ok(name.to_string())
}

pub struct AccountService {
    store: DynStore,
    hasher: Arc<dyn CredentialHasher>,
    tokens: SessionTokens,
}

impl AccountService {
    pub fn new(store: DynStore, hasher: Arc<dyn CredentialHasher>, tokens: SessionTokens) -> Self { Self { store, hasher, tokens } }

    /// Creates a `user`-role account with default settings and an empty address book.
    #[tracing::instrument(skip(self, password))]
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<UserProfile> {
        let name = validate_name(name)?;
        let email = Email::parse(email)?;
        validate_password(password)?;
        let user = User::new(name, email, self.hasher.hash(password)?, Role::User);
        self.store.create_user(&user).await.map_err(|e| match e {
            StoreError::Conflict(_) => StorefrontError::AlreadyExists("account"),
            other => other.into(),
        })?;
        tracing::info!(user_id = %user.id, "account registered");
        Ok(user.profile())
    }

    /// Unknown email, malformed email and wrong password all look the same to the caller.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Login> {
        let email = Email::parse(email).map_err(|_| StorefrontError::InvalidCredentials)?;
        let user = self.store.find_user_by_email(&email).await?.ok_or(StorefrontError::InvalidCredentials)?;
        if !self.hasher.verify(password, &user.password_hash) {
            return Err(StorefrontError::InvalidCredentials);
        }
        self.session(&user)
    }

    /// Resolves a bearer token to the actor it was issued to. Tokens that are
    /// expired, forged, or older than the user's last logout or password change
    /// are refused.
    pub async fn authenticate(&self, token: &str) -> Result<Actor> {
        let claims = self.tokens.verify(token).map_err(|e| {
            tracing::debug!(error = %e, "session token refused");
            StorefrontError::InvalidCredentials
        })?;
        let user = self.store.get_user(claims.sub).await?.ok_or(StorefrontError::InvalidCredentials)?;
        if user.token_version != claims.ver {
            return Err(StorefrontError::InvalidCredentials);
        }
        Ok(Actor::from(&user))
    }

    /// Signs the user out of every session.
    #[tracing::instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn logout(&self, actor: &Actor) -> Result<()> {
        let mut user = self.load(actor.user_id).await?;
        user.revoke_sessions();
        self.store.update_user(&user).await?;
        tracing::info!("sessions revoked");
        Ok(())
    }

    pub async fn profile(&self, actor: &Actor) -> Result<UserProfile> {
        Ok(self.load(actor.user_id).await?.profile())
    }

    /// Replaces the password and revokes older sessions; the caller gets a new one.
    #[tracing::instrument(skip(self, current, new), fields(user_id = %actor.user_id))]
    pub async fn change_password(&self, actor: &Actor, current: &str, new: &str) -> Result<Login> {
        let mut user = self.load(actor.user_id).await?;
        if !self.hasher.verify(current, &user.password_hash) {
            return Err(StorefrontError::InvalidCredentials);
        }
        validate_password(new)?;
        user.password_hash = self.hasher.hash(new)?;
        user.must_change_password = false;
        user.revoke_sessions();
        self.store.update_user(&user).await?;
        tracing::info!("password changed");
        self.session(&user)
    }

    pub async fn update_settings(&self, actor: &Actor, settings: UserSettings) -> Result<UserProfile> {
        if settings.currency.trim().len() != 3 {
            return Err(StorefrontError::Validation("currency must be a three-letter code".into()));
        }
        let mut user = self.load(actor.user_id).await?;
        user.settings = UserSettings { currency: settings.currency.trim().to_uppercase(), ..settings };
        self.store.update_user(&user).await?;
        Ok(user.profile())
    }

    /// Admins are only ever created by another admin (or at bootstrap).
    #[tracing::instrument(skip(self, password), fields(by = %actor.user_id))]
    pub async fn create_admin(&self, actor: &Actor, name: &str, email: &str, password: &str) -> Result<UserProfile> {
        actor.require_admin()?;
        self.insert_admin(name, email, password).await
    }

    /// Creates the bootstrap admin unless an account with that email exists.
    pub async fn ensure_admin(&self, name: &str, email: &str, password: &str) -> Result<Option<UserProfile>> {
        if self.store.find_user_by_email(&Email::parse(email)?).await?.is_some() {
            return Ok(None);
        }
        self.insert_admin(name, email, password).await.map(Some)
    }

    async fn insert_admin(&self, name: &str, email: &str, password: &str) -> Result<UserProfile> {
        let name = validate_name(name)?;
        let email = Email::parse(email)?;
        validate_password(password)?;
        let mut user = User::new(name, email, self.hasher.hash(password)?, Role::Admin);
        user.must_change_password = true;
        self.store.create_user(&user).await.map_err(|e| match e {
            StoreError::Conflict(_) => StorefrontError::AlreadyExists("account"),
            other => other.into(),
        })?;
        tracing::info!(user_id = %user.id, "admin account created");
        Ok(user.profile())
    }

    fn session(&self, user: &User) -> Result<Login> {
        let issued = self.tokens.issue(user).map_err(|e| StorefrontError::Store(StoreError::Backend(e.to_string())))?;
        Ok(Login { token: issued.token, expires_at: issued.expires_at, user: user.profile() })
    }

    async fn load(&self, id: Uuid) -> Result<User> {
        self.store.get_user(id).await?.ok_or(StorefrontError::NotFound("user"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, UserRepository};
    use chrono::Duration;

    fn service() -> AccountService {
        with_store(Arc::new(MemoryStore::new()))
    }

    fn with_store(store: Arc<MemoryStore>) -> AccountService {
        AccountService::new(store, Arc::new(Argon2Hasher), SessionTokens::ephemeral(Duration::hours(1)))
    }

    #[tokio::test]
    async fn register_then_login() {
        let accounts = service();
        let profile = accounts.register("Ann", "Ann@Example.com", "correct horse").await.unwrap();
        assert_eq!(profile.role, Role::User);
        assert_eq!(profile.settings, UserSettings::default());

        let login = accounts.login("ann@example.com", "correct horse").await.unwrap();
        assert_eq!(login.user.email.as_str(), "ann@example.com");
        let actor = accounts.authenticate(&login.token).await.unwrap();
        assert_eq!(actor.user_id, profile.id);
        assert!(!actor.must_change_password);
    }

    #[tokio::test]
    async fn malformed_emails_cannot_register() {
        let accounts = service();
        for email in ["john doe@example.com", "x@.", "<script>@x"] {
            let err = accounts.register("John", email, "password1").await.unwrap_err();
            assert!(matches!(err, StorefrontError::Validation(_)), "{email}");
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_without_a_second_record() {
        let store = Arc::new(MemoryStore::new());
        let accounts = with_store(store.clone());
        accounts.register("Ann", "ann@example.com", "password1").await.unwrap();
        let err = accounts.register("Other Ann", "ANN@example.com", "password2").await.unwrap_err();
        assert!(matches!(err, StorefrontError::AlreadyExists("account")));
        assert_eq!(store.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let accounts = service();
        accounts.register("Ann", "ann@example.com", "password1").await.unwrap();
        assert!(matches!(accounts.login("ann@example.com", "password2").await, Err(StorefrontError::InvalidCredentials)));
        assert!(matches!(accounts.login("bob@example.com", "password1").await, Err(StorefrontError::InvalidCredentials)));
        assert!(matches!(accounts.login("not-an-email", "password1").await, Err(StorefrontError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn short_password_is_a_validation_error() {
        let err = service().register("Ann", "ann@example.com", "short").await.unwrap_err();
        assert!(matches!(err, StorefrontError::Validation(_)));
    }

    #[tokio::test]
    async fn only_admins_create_admins() {
        let accounts = service();
        let user = accounts.register("Ann", "ann@example.com", "password1").await.unwrap();
        let err = accounts.create_admin(&Actor::new(user.id, Role::User), "Eve", "eve@example.com", "password1").await.unwrap_err();
        assert!(matches!(err, StorefrontError::Unauthorized));

        let root = accounts.ensure_admin("Root", "root@example.com", "bootstrap-pw").await.unwrap().unwrap();
        assert!(root.must_change_password);
        assert!(accounts.ensure_admin("Root", "root@example.com", "bootstrap-pw").await.unwrap().is_none());
        let admin = accounts.create_admin(&Actor::new(root.id, Role::Admin), "Ops", "ops@example.com", "password1").await.unwrap();
        assert_eq!(admin.role, Role::Admin);
    }

    #[tokio::test]
    async fn bootstrap_admin_is_held_until_the_password_changes() {
        let accounts = service();
        accounts.ensure_admin("Root", "root@example.com", "bootstrap-pw").await.unwrap();
        let first = accounts.login("root@example.com", "bootstrap-pw").await.unwrap();
        let actor = accounts.authenticate(&first.token).await.unwrap();
        assert!(actor.must_change_password);
        assert!(matches!(actor.require_admin(), Err(StorefrontError::PasswordChangeRequired)));
        assert!(matches!(
            accounts.create_admin(&actor, "Ops", "ops@example.com", "password1").await,
            Err(StorefrontError::PasswordChangeRequired)
        ));

        let second = accounts.change_password(&actor, "bootstrap-pw", "new-password").await.unwrap();
        assert!(!second.user.must_change_password);
        let actor = accounts.authenticate(&second.token).await.unwrap();
        assert!(actor.require_admin().is_ok());
    }

    #[tokio::test]
    async fn change_password_revokes_older_tokens() {
        let accounts = service();
        accounts.register("Ann", "ann@example.com", "password1").await.unwrap();
        let old: Vec<String> = {
            let mut tokens = vec![];
            for _ in 0..3 {
                tokens.push(accounts.login("ann@example.com", "password1").await.unwrap().token);
            }
            tokens
        };
        let actor = accounts.authenticate(&old[0]).await.unwrap();
        assert!(matches!(accounts.change_password(&actor, "wrong-one", "new-password").await, Err(StorefrontError::InvalidCredentials)));

        let fresh = accounts.change_password(&actor, "password1", "new-password").await.unwrap();
        for token in &old {
            assert!(matches!(accounts.authenticate(token).await, Err(StorefrontError::InvalidCredentials)));
        }
        assert_eq!(accounts.authenticate(&fresh.token).await.unwrap().user_id, actor.user_id);
        assert!(accounts.login("ann@example.com", "password1").await.is_err());
        assert!(accounts.login("ann@example.com", "new-password").await.is_ok());
    }

    #[tokio::test]
    async fn logout_signs_out_everywhere() {
        let accounts = service();
        accounts.register("Ann", "ann@example.com", "password1").await.unwrap();
        let phone = accounts.login("ann@example.com", "password1").await.unwrap().token;
        let laptop = accounts.login("ann@example.com", "password1").await.unwrap().token;
        let actor = accounts.authenticate(&phone).await.unwrap();
        accounts.logout(&actor).await.unwrap();
        assert!(accounts.authenticate(&phone).await.is_err());
        assert!(accounts.authenticate(&laptop).await.is_err());
        let again = accounts.login("ann@example.com", "password1").await.unwrap().token;
        assert!(accounts.authenticate(&again).await.is_ok());
    }

    #[tokio::test]
    async fn tokens_for_deleted_or_unknown_users_are_refused() {
        let accounts = service();
        let stranger = User::new("Zed", Email::parse("zed@example.com").unwrap(), "hash".into(), Role::Admin);
        let token = accounts.tokens.issue(&stranger).unwrap().token;
        assert!(matches!(accounts.authenticate(&token).await, Err(StorefrontError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn settings_are_normalised() {
        let accounts = service();
        let user = accounts.register("Ann", "ann@example.com", "password1").await.unwrap();
        let actor = Actor::new(user.id, Role::User);
        let profile = accounts.update_settings(&actor, UserSettings { currency: "eur".into(), promotions: true, ..UserSettings::default() }).await.unwrap();
        assert_eq!(profile.settings.currency, "EUR");
        assert!(profile.settings.promotions);
        assert!(accounts.update_settings(&actor, UserSettings { currency: "euro".into(), ..UserSettings::default() }).await.is_err());
    }
}
