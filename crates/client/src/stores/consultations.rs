//! Webinar consultations store.
//!
//! Replays and upcoming sessions are classified by position relative to the
//! server pointers (see [`WebinarList`]), never by the entries' own flags.

use std::sync::Arc;
use std::time::Duration;

use jdp_core::{Webinar, WebinarList};
use tracing::instrument;

use super::resource::{FetchOutcome, LoadState, Resource};
use crate::cache::PersistedCache;
use crate::clock::SharedClock;
use crate::services::{ConsultationError, ConsultationService};
use crate::storage::{KeyValueStore, keys};

/// Webinar list cache lifetime.
pub const WEBINARS_TTL: Duration = Duration::from_secs(15 * 60); // 15 minutes

/// Persisted webinar list shape version.
pub const WEBINARS_VERSION: u32 = 1;

/// Webinar list. Clones share state.
#[derive(Debug, Clone)]
pub struct ConsultationsStore {
    inner: Arc<ConsultationsInner>,
}

#[derive(Debug)]
struct ConsultationsInner {
    service: ConsultationService,
    webinars: Resource<WebinarList, ConsultationError>,
}

impl ConsultationsStore {
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>, clock: SharedClock, service: ConsultationService) -> Self {
        let cache = PersistedCache::new(storage, keys::CONSULTATIONS, WEBINARS_TTL, WEBINARS_VERSION);
        Self {
            inner: Arc::new(ConsultationsInner {
                service,
                webinars: Resource::persisted("consultations", cache, clock),
            }),
        }
    }

    /// # Errors
    ///
    /// Returns the service failure; a stale persisted list is still served
    /// when one exists.
    #[instrument(skip(self))]
    pub async fn fetch(&self, force: bool) -> Result<FetchOutcome, ConsultationError> {
        let service = &self.inner.service;
        self.inner
            .webinars
            .fetch(force, || service.fetch_webinars())
            .await
    }

    /// # Errors
    ///
    /// See [`ConsultationsStore::fetch`].
    pub async fn refresh(&self) -> Result<FetchOutcome, ConsultationError> {
        self.fetch(true).await
    }

    #[must_use]
    pub fn webinars(&self) -> WebinarList {
        self.inner.webinars.data().unwrap_or_default()
    }

    /// Past sessions, most recent first.
    #[must_use]
    pub fn replays(&self) -> Vec<Webinar> {
        self.inner
            .webinars
            .with(|list| list.replays().into_iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Scheduled sessions, soonest first.
    #[must_use]
    pub fn upcoming(&self) -> Vec<Webinar> {
        self.inner
            .webinars
            .with(|list| list.upcoming().into_iter().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn next(&self) -> Option<Webinar> {
        self.inner.webinars.with(|list| list.next().cloned()).flatten()
    }

    #[must_use]
    pub fn last(&self) -> Option<Webinar> {
        self.inner.webinars.with(|list| list.last().cloned()).flatten()
    }

    #[must_use]
    pub fn state(&self) -> LoadState<ConsultationError> {
        self.inner.webinars.state()
    }

    /// Abandon an in-flight request.
    pub fn cancel(&self) {
        self.inner.service.cancel();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::source::MockSource;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn test_classification_by_position() {
        let store = ConsultationsStore::new(
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::at(0)),
            ConsultationService::new(Arc::new(MockSource::new()), Duration::from_secs(30)),
        );
        store.fetch(false).await.unwrap();

        let replays: Vec<_> = store.replays().iter().map(|w| w.id.to_string()).collect();
        assert_eq!(replays, ["72", "71"]);
        let upcoming: Vec<_> = store.upcoming().iter().map(|w| w.id.to_string()).collect();
        assert_eq!(upcoming, ["73", "74"]);
        assert_eq!(store.next().unwrap().id.as_str(), "73");
        assert_eq!(store.last().unwrap().id.as_str(), "72");
    }
}
