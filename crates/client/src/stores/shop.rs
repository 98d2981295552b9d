//! Shop catalog store.
//!
//! The catalog is persisted for an hour. Listing pages read it through
//! [`ShopStore::view`], which filters by collection and sorts without
//! touching the snapshot.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use jdp_core::{CatalogSort, ShopReference};
use tracing::instrument;

use super::resource::{FetchOutcome, LoadState, Resource};
use crate::cache::PersistedCache;
use crate::clock::SharedClock;
use crate::services::{ShopError, ShopService};
use crate::storage::{KeyValueStore, keys};

/// Catalog cache lifetime.
pub const CATALOG_TTL: Duration = Duration::from_secs(3600); // 1 hour

/// Persisted catalog shape version.
pub const CATALOG_VERSION: u32 = 2;

/// The shop catalog. Clones share state.
#[derive(Debug, Clone)]
pub struct ShopStore {
    inner: Arc<ShopStoreInner>,
}

#[derive(Debug)]
struct ShopStoreInner {
    service: ShopService,
    catalog: Resource<Vec<ShopReference>, ShopError>,
}

impl ShopStore {
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>, clock: SharedClock, service: ShopService) -> Self {
        let cache = PersistedCache::new(storage, keys::SHOP_CATALOG, CATALOG_TTL, CATALOG_VERSION);
        Self {
            inner: Arc::new(ShopStoreInner {
                service,
                catalog: Resource::persisted("shop", cache, clock),
            }),
        }
    }

    /// Load the catalog unless a current copy exists.
    ///
    /// # Errors
    ///
    /// Returns the service failure; a stale persisted catalog is still
    /// served when one exists.
    #[instrument(skip(self))]
    pub async fn fetch(&self, force: bool) -> Result<FetchOutcome, ShopError> {
        let service = &self.inner.service;
        self.inner.catalog.fetch(force, || service.fetch_catalog()).await
    }

    /// Forced fetch.
    ///
    /// # Errors
    ///
    /// See [`ShopStore::fetch`].
    pub async fn refresh(&self) -> Result<FetchOutcome, ShopError> {
        self.fetch(true).await
    }

    /// Every reference in backend order.
    #[must_use]
    pub fn references(&self) -> Vec<ShopReference> {
        self.inner.catalog.data().unwrap_or_default()
    }

    /// References in a collection, backend order.
    #[must_use]
    pub fn filtered(&self, collection: &str) -> Vec<ShopReference> {
        self.view(Some(collection), CatalogSort::Default)
    }

    /// Every reference, sorted.
    #[must_use]
    pub fn sorted(&self, sort: CatalogSort) -> Vec<ShopReference> {
        self.view(None, sort)
    }

    /// Optionally filter by collection, then sort.
    #[must_use]
    pub fn view(&self, collection: Option<&str>, sort: CatalogSort) -> Vec<ShopReference> {
        let collection = collection.map(str::trim).filter(|c| !c.is_empty());
        let mut references: Vec<ShopReference> = self
            .inner
            .catalog
            .with(|all| {
                all.iter()
                    .filter(|r| collection.is_none_or(|c| r.in_collection(c)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        sort.apply(&mut references);
        references
    }

    /// Distinct collection slugs, alphabetical.
    #[must_use]
    pub fn collections(&self) -> Vec<String> {
        self.inner
            .catalog
            .with(|all| {
                all.iter()
                    .flat_map(|r| r.collections.iter().cloned())
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn reference_by_slug(&self, slug: &str) -> Option<ShopReference> {
        self.inner
            .catalog
            .with(|all| all.iter().find(|r| r.slug == slug).cloned())
            .flatten()
    }

    #[must_use]
    pub fn state(&self) -> LoadState<ShopError> {
        self.inner.catalog.state()
    }

    #[must_use]
    pub fn last_fetch(&self) -> Option<i64> {
        self.inner.catalog.last_fetch()
    }

    /// Abandon an in-flight catalog request.
    pub fn cancel(&self) {
        self.inner.service.cancel();
    }
}
