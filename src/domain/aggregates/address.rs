//! Address book entries

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A shipping destination. `id` is `None` until the address is saved to a user's book.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Address {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[validate(length(min = 1, max = 120, message = "full name is required"))]
    pub full_name: String,
    #[validate(email(message = "a valid email is required"))]
    pub email: String,
    #[validate(length(min = 5, max = 32, message = "a valid phone number is required"))]
    pub phone: String,
    #[validate(length(min = 1, max = 200, message = "street is required"))]
    pub street: String,
    #[validate(length(min = 1, max = 100, message = "city is required"))]
    pub city: String,
    #[validate(length(max = 100))]
    #[serde(default)]
    pub state: String,
    #[validate(length(min = 1, max = 20, message = "postal code is required"))]
    pub postal_code: String,
    #[validate(length(min = 2, max = 60, message = "country is required"))]
    pub country: String,
}

impl Address {
    pub fn is_saved(&self) -> bool { self.id.is_some() }

    /// Copy for embedding in an order; detached from the address book.
    pub fn detached(&self) -> Self { Self { id: None, ..self.clone() } }
}

/// An address together with the user that owns it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedAddress {
    pub owner: Uuid,
    pub address: Address,
}

#[cfg(test)]
pub(crate) fn sample() -> Address {
    Address {
        id: None, full_name: "Ada Lovelace".into(), email: "ada@example.com".into(), phone: "+44 20 7946 0000".into(),
        street: "12 St James's Square".into(), city: "London".into(), state: String::new(), postal_code: "SW1Y 4JH".into(),
        country: "GB".into(),
    }
}
