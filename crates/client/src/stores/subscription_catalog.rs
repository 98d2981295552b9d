//! One-click plan catalog store.

use std::sync::Arc;
use std::time::Duration;

use jdp_core::{PlanId, SubscriptionPlan};
use tracing::instrument;

use super::resource::{FetchOutcome, LoadState, Resource};
use crate::cache::PersistedCache;
use crate::clock::SharedClock;
use crate::services::{SubscriptionError, SubscriptionService};
use crate::storage::{KeyValueStore, keys};

/// Plan catalog cache lifetime.
pub const PLAN_CATALOG_TTL: Duration = Duration::from_secs(3600); // 1 hour

/// Persisted plan catalog shape version.
pub const PLAN_CATALOG_VERSION: u32 = 1;

/// Available subscription plans. Clones share state.
#[derive(Debug, Clone)]
pub struct SubscriptionCatalogStore {
    inner: Arc<SubscriptionCatalogInner>,
}

#[derive(Debug)]
struct SubscriptionCatalogInner {
    service: SubscriptionService,
    plans: Resource<Vec<SubscriptionPlan>, SubscriptionError>,
}

impl SubscriptionCatalogStore {
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>, clock: SharedClock, service: SubscriptionService) -> Self {
        let cache = PersistedCache::new(
            storage,
            keys::SUBSCRIPTION_CATALOG,
            PLAN_CATALOG_TTL,
            PLAN_CATALOG_VERSION,
        );
        Self {
            inner: Arc::new(SubscriptionCatalogInner {
                service,
                plans: Resource::persisted("subscription_catalog", cache, clock),
            }),
        }
    }

    /// # Errors
    ///
    /// Returns the service failure; a stale persisted catalog is still
    /// served when one exists.
    #[instrument(skip(self))]
    pub async fn fetch(&self, force: bool) -> Result<FetchOutcome, SubscriptionError> {
        let service = &self.inner.service;
        self.inner.plans.fetch(force, || service.fetch_catalog()).await
    }

    /// # Errors
    ///
    /// See [`SubscriptionCatalogStore::fetch`].
    pub async fn refresh(&self) -> Result<FetchOutcome, SubscriptionError> {
        self.fetch(true).await
    }

    #[must_use]
    pub fn plans(&self) -> Vec<SubscriptionPlan> {
        self.inner.plans.data().unwrap_or_default()
    }

    #[must_use]
    pub fn plan(&self, id: &PlanId) -> Option<SubscriptionPlan> {
        self.inner
            .plans
            .with(|plans| plans.iter().find(|p| &p.id == id).cloned())
            .flatten()
    }

    #[must_use]
    pub fn state(&self) -> LoadState<SubscriptionError> {
        self.inner.plans.state()
    }
}
