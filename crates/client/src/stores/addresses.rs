//! Address book store.

use std::sync::Arc;

use jdp_core::{Address, AddressId, AddressInput};
use tracing::instrument;

use super::resource::{FetchOutcome, LoadState, Resource};
use crate::clock::SharedClock;
use crate::services::{AddressError, AddressService};

/// The user's addresses. Clones share state.
#[derive(Debug, Clone)]
pub struct AddressStore {
    inner: Arc<AddressStoreInner>,
}

#[derive(Debug)]
struct AddressStoreInner {
    service: AddressService,
    addresses: Resource<Vec<Address>, AddressError>,
}

impl AddressStore {
    #[must_use]
    pub fn new(service: AddressService, clock: SharedClock) -> Self {
        Self {
            inner: Arc::new(AddressStoreInner {
                service,
                addresses: Resource::memory("addresses", None, clock),
            }),
        }
    }

    /// # Errors
    ///
    /// Returns the service failure.
    #[instrument(skip(self))]
    pub async fn fetch(&self, force: bool) -> Result<FetchOutcome, AddressError> {
        let service = &self.inner.service;
        self.inner.addresses.fetch(force, || service.list()).await
    }

    /// # Errors
    ///
    /// Returns the service failure.
    pub async fn refresh(&self) -> Result<FetchOutcome, AddressError> {
        self.fetch(true).await
    }

    /// Create an address and add it to the list.
    ///
    /// # Errors
    ///
    /// Returns the service failure; the list is unchanged.
    pub async fn create(&self, input: &AddressInput) -> Result<Address, AddressError> {
        let created = self.inner.service.create(input).await?;
        self.upsert(created.clone());
        Ok(created)
    }

    /// Update an address in place.
    ///
    /// # Errors
    ///
    /// Returns the service failure; the list is unchanged.
    pub async fn update(&self, id: &AddressId, input: &AddressInput) -> Result<Address, AddressError> {
        let updated = self.inner.service.update(id, input).await?;
        self.upsert(updated.clone());
        Ok(updated)
    }

    /// # Errors
    ///
    /// Returns the service failure; the list is unchanged.
    pub async fn delete(&self, id: &AddressId) -> Result<(), AddressError> {
        self.inner.service.delete(id).await?;
        self.inner.addresses.update(|all| all.retain(|a| &a.id != id));
        Ok(())
    }

    #[must_use]
    pub fn addresses(&self) -> Vec<Address> {
        self.inner.addresses.data().unwrap_or_default()
    }

    #[must_use]
    pub fn default_shipping(&self) -> Option<Address> {
        self.inner
            .addresses
            .with(|all| all.iter().find(|a| a.is_default_shipping).cloned())
            .flatten()
    }

    #[must_use]
    pub fn default_billing(&self) -> Option<Address> {
        self.inner
            .addresses
            .with(|all| all.iter().find(|a| a.is_default_billing).cloned())
            .flatten()
    }

    #[must_use]
    pub fn state(&self) -> LoadState<AddressError> {
        self.inner.addresses.state()
    }

    pub fn reset(&self) {
        self.inner.addresses.reset();
    }

    // At most one address carries each default flag.
    fn upsert(&self, address: Address) {
        let mut all = self.addresses();
        for other in all.iter_mut().filter(|a| a.id != address.id) {
            other.is_default_shipping &= !address.is_default_shipping;
            other.is_default_billing &= !address.is_default_billing;
        }
        match all.iter_mut().find(|a| a.id == address.id) {
            Some(existing) => *existing = address,
            None => all.push(address),
        }
        self.inner.addresses.replace(all);
    }
}
