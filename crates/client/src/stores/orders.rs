//! Paid order invoices.

use std::sync::Arc;

use jdp_core::Invoice;

use super::resource::{FetchOutcome, LoadState, Resource};
use crate::clock::SharedClock;
use crate::services::{OrderError, OrderService};

/// Invoices, most recent first. Clones share state.
#[derive(Debug, Clone)]
pub struct OrderStore {
    inner: Arc<OrderStoreInner>,
}

#[derive(Debug)]
struct OrderStoreInner {
    service: OrderService,
    invoices: Resource<Vec<Invoice>, OrderError>,
}

impl OrderStore {
    #[must_use]
    pub fn new(service: OrderService, clock: SharedClock) -> Self {
        Self {
            inner: Arc::new(OrderStoreInner {
                service,
                invoices: Resource::memory("orders", None, clock),
            }),
        }
    }

    /// # Errors
    ///
    /// Returns the service failure.
    pub async fn fetch(&self, force: bool) -> Result<FetchOutcome, OrderError> {
        let service = &self.inner.service;
        self.inner.invoices.fetch(force, || service.fetch_invoices()).await
    }

    /// # Errors
    ///
    /// Returns the service failure.
    pub async fn refresh(&self) -> Result<FetchOutcome, OrderError> {
        self.fetch(true).await
    }

    #[must_use]
    pub fn invoices(&self) -> Vec<Invoice> {
        self.inner.invoices.data().unwrap_or_default()
    }

    #[must_use]
    pub fn state(&self) -> LoadState<OrderError> {
        self.inner.invoices.state()
    }

    pub fn reset(&self) {
        self.inner.invoices.reset();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::source::MockSource;
    use crate::stores::testing::ScriptedSource;

    #[tokio::test]
    async fn test_fetch_once_then_unchanged() {
        let source = Arc::new(ScriptedSource::new());
        let store = OrderStore::new(OrderService::new(source.clone()), Arc::new(ManualClock::at(0)));
        assert_eq!(store.fetch(false).await.unwrap(), FetchOutcome::Fetched);
        assert_eq!(store.fetch(false).await.unwrap(), FetchOutcome::Unchanged);
        assert_eq!(source.calls(), 1);
        assert_eq!(store.invoices()[0].number, "F-2024-000402");

        assert_eq!(store.refresh().await.unwrap(), FetchOutcome::Fetched);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_reset_forgets_invoices() {
        let store = OrderStore::new(
            OrderService::new(Arc::new(MockSource::new())),
            Arc::new(ManualClock::at(0)),
        );
        store.fetch(false).await.unwrap();
        store.reset();
        assert!(store.invoices().is_empty());
        assert_eq!(store.state(), LoadState::Idle);
    }
}
