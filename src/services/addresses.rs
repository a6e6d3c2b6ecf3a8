//! Per-user address book.

use uuid::Uuid;
use validator::Validate;

use super::accounts::Actor;
use crate::domain::aggregates::{Address, OwnedAddress};
use crate::store::DynStore;
use crate::{Result, StorefrontError};

pub struct AddressService {
    store: DynStore,
}

impl AddressService {
    pub fn new(store: DynStore) -> Self { Self { store } }

    pub async fn list(&self, actor: &Actor) -> Result<Vec<Address>> {
        Ok(self.store.list_addresses(actor.user_id).await?)
    }

    pub async fn add(&self, actor: &Actor, address: Address) -> Result<Address> {
        address.validate()?;
        Ok(self.store.insert_address(actor.user_id, &address).await?)
    }

    /// Edits a saved address; the address must carry its identifier.
    pub async fn update(&self, actor: &Actor, address: Address) -> Result<Address> {
        let id = address.id.ok_or_else(|| StorefrontError::Validation("only saved addresses can be edited".into()))?;
        address.validate()?;
        self.owned(actor, id).await?;
        self.store.update_address(actor.user_id, &address).await?;
        Ok(address)
    }

    pub async fn remove(&self, actor: &Actor, id: Uuid) -> Result<()> {
        self.owned(actor, id).await?;
        Ok(self.store.delete_address(id).await?)
    }

    /// Looks up a saved address the actor owns.
    pub async fn owned(&self, actor: &Actor, id: Uuid) -> Result<Address> {
        let OwnedAddress { owner, address } = self.store.get_address(id).await?.ok_or(StorefrontError::NotFound("address"))?;
        if owner != actor.user_id { return Err(StorefrontError::Unauthorized); }
        Ok(address)
    }
}
