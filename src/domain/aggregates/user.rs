//! User accounts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::Email;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

/// Per-user preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    pub currency: String,
    pub email_notifications: bool,
    pub order_updates: bool,
    pub promotions: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self { currency: "USD".to_string(), email_notifications: true, order_updates: true, promotions: false }
    }
}

/// Stored account. Holds the password hash, so it never leaves the service layer;
/// callers get a [`UserProfile`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: Email,
    pub password_hash: String,
    pub role: Role,
    pub settings: UserSettings,
    pub must_change_password: bool,
    /// Stamped into session tokens; bumping it signs the user out everywhere.
    pub token_version: u32,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl Into<String>, email: Email, password_hash: String, role: Role) -> Self {
        Self {
            id: Uuid::now_v7(), name: name.into(), email, password_hash, role, settings: UserSettings::default(),
            must_change_password: false, token_version: 0, created_at: Utc::now(),
        }
    }

    pub fn is_admin(&self) -> bool { self.role == Role::Admin }

    pub fn revoke_sessions(&mut self) { self.token_version = self.token_version.wrapping_add(1); }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id, name: self.name.clone(), email: self.email.clone(), role: self.role,
            must_change_password: self.must_change_password, settings: self.settings.clone(), created_at: self.created_at,
        }
    }
}

/// Public view of a user: no credential, settings flattened alongside the identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: Email,
    pub role: Role,
    pub must_change_password: bool,
    #[serde(flatten)]
    pub settings: UserSettings,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_flattens_settings_and_omits_hash() {
        let user = User::new("Ann", Email::parse("ann@example.com").unwrap(), "$argon2id$secret".into(), Role::User);
        let json = serde_json::to_value(user.profile()).unwrap();
        assert_eq!(json["currency"], "USD");
        assert_eq!(json["role"], "user");
        assert!(json.get("password_hash").is_none());
        assert!(!json.to_string().contains("argon2"));
    }

    #[test]
    fn role_parses() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("root".parse::<Role>().is_err());
    }
}
