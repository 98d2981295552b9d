//! Load state shared by every fetching store.
//!
//! A [`Resource`] owns one snapshot and walks the state machine
//! `Idle → Loading → (Ready | Failed)`. `Failed → Loading` on retry and
//! `Ready → Loading` on a forced refresh; it is never loading and failed at
//! the same time. A resource may be backed by a [`PersistedCache`], in which
//! case a fresh persisted entry is adopted without any network call and an
//! expired one is served as a fallback when the fetch fails.

use std::future::Future;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::cache::PersistedCache;
use crate::clock::{SharedClock, duration_millis};
use crate::services::ServiceError;

/// Where a resource stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState<E> {
    /// Never fetched.
    Idle,
    Loading,
    Ready,
    Failed(E),
}

impl<E> Default for LoadState<E> {
    fn default() -> Self {
        Self::Idle
    }
}

impl<E> LoadState<E> {
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// The failure, when failed.
    #[must_use]
    pub const fn error(&self) -> Option<&E> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// How a fetch was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// In-memory data was still within its TTL.
    Unchanged,
    /// A fresh persisted entry was adopted.
    FromCache,
    /// The service answered.
    Fetched,
    /// A newer request took over; nothing changed.
    Superseded,
}

struct Snapshot<T, E> {
    data: Option<T>,
    state: LoadState<E>,
    /// Unix milliseconds of the fetch that produced `data`.
    last_fetch: Option<i64>,
    /// Bumped on every fetch start and every direct write.
    generation: u64,
}

/// A store's snapshot plus its load state.
pub struct Resource<T, E> {
    name: &'static str,
    ttl: Option<Duration>,
    cache: Option<PersistedCache<T>>,
    clock: SharedClock,
    snapshot: RwLock<Snapshot<T, E>>,
}

impl<T, E> std::fmt::Debug for Resource<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl<T, E> Resource<T, E>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync,
    E: ServiceError,
{
    /// An in-memory resource. With `ttl = None` data stays current until a
    /// forced refresh.
    #[must_use]
    pub fn memory(name: &'static str, ttl: Option<Duration>, clock: SharedClock) -> Self {
        Self {
            name,
            ttl,
            cache: None,
            clock,
            snapshot: RwLock::new(Snapshot {
                data: None,
                state: LoadState::Idle,
                last_fetch: None,
                generation: 0,
            }),
        }
    }

    /// A resource persisted through `cache`; the cache TTL applies in memory too.
    #[must_use]
    pub fn persisted(name: &'static str, cache: PersistedCache<T>, clock: SharedClock) -> Self {
        let mut resource = Self::memory(name, Some(cache.ttl()), clock);
        resource.cache = Some(cache);
        resource
    }

    /// Fetch through `load` unless current data can be reused.
    ///
    /// Without `force`, in-memory data within its TTL is kept and a fresh
    /// persisted entry is adopted, both without calling `load`. A superseded
    /// load leaves the snapshot untouched.
    ///
    /// # Errors
    ///
    /// Returns the load failure. When a stale persisted entry of the right
    /// version exists it is served as the snapshot anyway.
    pub async fn fetch<F, Fut>(&self, force: bool, load: F) -> Result<FetchOutcome, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let now = self.clock.now_millis();
        if !force {
            if self.is_current(now) {
                debug!(store = self.name, "Cache hit for in-memory snapshot");
                return Ok(FetchOutcome::Unchanged);
            }
            if let Some(entry) = self.cache.as_ref().and_then(|c| c.load_fresh(now)) {
                debug!(store = self.name, "Adopting persisted cache entry");
                let mut snap = self.write();
                snap.data = Some(entry.data);
                snap.last_fetch = Some(entry.timestamp);
                snap.state = LoadState::Ready;
                snap.generation += 1;
                return Ok(FetchOutcome::FromCache);
            }
        }

        let generation = {
            let mut snap = self.write();
            snap.generation += 1;
            snap.state = LoadState::Loading;
            snap.generation
        };

        let result = load().await;
        let now = self.clock.now_millis();
        let mut snap = self.write();
        if snap.generation != generation {
            debug!(store = self.name, "Discarding result of a superseded fetch");
            return Ok(FetchOutcome::Superseded);
        }

        match result {
            Ok(data) => {
                if let Some(cache) = &self.cache
                    && let Err(e) = cache.save(&data, now)
                {
                    warn!(store = self.name, error = %e, "Failed to persist snapshot");
                }
                snap.data = Some(data);
                snap.last_fetch = Some(now);
                snap.state = LoadState::Ready;
                Ok(FetchOutcome::Fetched)
            }
            Err(e) if e.is_superseded() => {
                debug!(store = self.name, "Fetch cancelled");
                snap.state = if snap.data.is_some() {
                    LoadState::Ready
                } else {
                    LoadState::Idle
                };
                Ok(FetchOutcome::Superseded)
            }
            Err(e) => {
                if let Some(stale) = self.cache.as_ref().and_then(PersistedCache::load_stale) {
                    warn!(
                        store = self.name,
                        error = %e,
                        age_ms = now.saturating_sub(stale.timestamp),
                        "Fetch failed, serving stale persisted snapshot"
                    );
                    snap.data = Some(stale.data);
                    snap.last_fetch = Some(stale.timestamp);
                } else {
                    warn!(store = self.name, error = %e, "Fetch failed");
                }
                snap.state = LoadState::Failed(e.clone());
                Err(e)
            }
        }
    }

    /// Current snapshot.
    #[must_use]
    pub fn data(&self) -> Option<T> {
        self.read().data.clone()
    }

    /// Read the snapshot without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.read().data.as_ref().map(f)
    }

    #[must_use]
    pub fn state(&self) -> LoadState<E> {
        self.read().state.clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.read().state.is_loading()
    }

    #[must_use]
    pub fn error(&self) -> Option<E> {
        self.read().state.error().cloned()
    }

    /// Unix milliseconds of the fetch behind the snapshot.
    #[must_use]
    pub fn last_fetch(&self) -> Option<i64> {
        self.read().last_fetch
    }

    /// Replace the snapshot after a local mutation. Any fetch in flight is
    /// superseded. Persisted resources are rewritten.
    pub fn replace(&self, data: T) {
        let now = self.clock.now_millis();
        if let Some(cache) = &self.cache
            && let Err(e) = cache.save(&data, now)
        {
            warn!(store = self.name, error = %e, "Failed to persist snapshot");
        }
        let mut snap = self.write();
        snap.data = Some(data);
        snap.last_fetch = Some(now);
        snap.state = LoadState::Ready;
        snap.generation += 1;
    }

    /// Edit the snapshot in place, if there is one.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let updated = {
            let mut snap = self.write();
            snap.generation += 1;
            snap.data.as_mut().map(|data| {
                f(data);
                data.clone()
            })
        };
        if let (Some(cache), Some(data)) = (&self.cache, updated)
            && let Err(e) = cache.save(&data, self.clock.now_millis())
        {
            warn!(store = self.name, error = %e, "Failed to persist snapshot");
        }
    }

    /// Forget the snapshot and any persisted entry.
    pub fn reset(&self) {
        if let Some(cache) = &self.cache {
            cache.purge();
        }
        let mut snap = self.write();
        snap.data = None;
        snap.last_fetch = None;
        snap.state = LoadState::Idle;
        snap.generation += 1;
    }

    fn is_current(&self, now: i64) -> bool {
        let snap = self.read();
        let Some(fetched_at) = snap.last_fetch.filter(|_| snap.data.is_some()) else {
            return false;
        };
        self.ttl
            .is_none_or(|ttl| now.saturating_sub(fetched_at) < duration_millis(ttl))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Snapshot<T, E>> {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Snapshot<T, E>> {
        self.snapshot.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use jdp_core::ErrorCode;

    use super::*;
    use crate::cache::CacheEntry;
    use crate::clock::{Clock, ManualClock};
    use crate::services::ShopError;
    use crate::storage::{KeyValueStoreExt, MemoryStore};

    const HOUR: Duration = Duration::from_secs(3600);
    const KEY: &str = "test.resource";

    fn setup() -> (Arc<MemoryStore>, ManualClock, Resource<Vec<u32>, ShopError>) {
        let storage = Arc::new(MemoryStore::new());
        let clock = ManualClock::at(1_000_000);
        let cache = PersistedCache::new(storage.clone(), KEY, HOUR, 2);
        let resource = Resource::persisted("test", cache, Arc::new(clock.clone()));
        (storage, clock, resource)
    }

    #[tokio::test]
    async fn test_fetch_persists_and_reuses_within_ttl() {
        let (storage, clock, resource) = setup();
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let load = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ShopError>(vec![1, 2])
        };

        assert_eq!(resource.fetch(false, load).await.unwrap(), FetchOutcome::Fetched);
        assert_eq!(resource.state(), LoadState::Ready);
        let entry: CacheEntry<Vec<u32>> = storage.get_json(KEY).unwrap();
        assert_eq!(entry.timestamp, 1_000_000);

        clock.advance(Duration::from_secs(60));
        assert_eq!(resource.fetch(false, load).await.unwrap(), FetchOutcome::Unchanged);
        assert_eq!(resource.fetch(true, load).await.unwrap(), FetchOutcome::Fetched);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fresh_persisted_entry_avoids_network() {
        let (storage, clock, resource) = setup();
        storage
            .set_json(KEY, &CacheEntry::new(vec![7_u32], clock.now_millis() - 1000, 2))
            .unwrap();
        let outcome = resource
            .fetch(false, || async { Err::<Vec<u32>, _>(ShopError::new(ErrorCode::Network, "down")) })
            .await
            .unwrap();
        assert_eq!(outcome, FetchOutcome::FromCache);
        assert_eq!(resource.data(), Some(vec![7]));
    }

    #[tokio::test]
    async fn test_wrong_version_is_never_served_and_triggers_fetch() {
        let (storage, clock, resource) = setup();
        storage
            .set_json(KEY, &CacheEntry::new(vec![9_u32], clock.now_millis(), 1))
            .unwrap();
        let outcome = resource
            .fetch(false, || async { Ok::<_, ShopError>(vec![3]) })
            .await
            .unwrap();
        assert_eq!(outcome, FetchOutcome::Fetched);
        assert_eq!(resource.data(), Some(vec![3]));
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_stale_entry() {
        let (storage, clock, resource) = setup();
        storage
            .set_json(KEY, &CacheEntry::new(vec![5_u32], clock.now_millis() - 2 * 3_600_000, 2))
            .unwrap();
        let err = resource
            .fetch(false, || async { Err::<Vec<u32>, _>(ShopError::new(ErrorCode::Network, "down")) })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Network);
        assert_eq!(resource.data(), Some(vec![5]));
        assert!(matches!(resource.state(), LoadState::Failed(_)));
        assert!(!resource.is_loading());
    }

    #[tokio::test]
    async fn test_failure_without_cache_keeps_no_data() {
        let (_, _, resource) = setup();
        let err = resource
            .fetch(false, || async { Err::<Vec<u32>, _>(ShopError::new(ErrorCode::Timeout, "slow")) })
            .await
            .unwrap_err();
        assert_eq!(resource.error(), Some(err));
        assert_eq!(resource.data(), None);
    }

    #[tokio::test]
    async fn test_cancelled_result_leaves_state_untouched() {
        let (_, _, resource) = setup();
        resource.replace(vec![1]);
        let outcome = resource
            .fetch(true, || async { Err::<Vec<u32>, _>(ShopError::new(ErrorCode::Cancelled, "superseded")) })
            .await
            .unwrap();
        assert_eq!(outcome, FetchOutcome::Superseded);
        assert_eq!(resource.data(), Some(vec![1]));
        assert_eq!(resource.state(), LoadState::Ready);
    }

    #[tokio::test]
    async fn test_memory_resource_without_ttl_stays_current() {
        let clock = ManualClock::at(0);
        let resource: Resource<u32, ShopError> = Resource::memory("mem", None, Arc::new(clock.clone()));
        resource.fetch(false, || async { Ok(1) }).await.unwrap();
        clock.advance(Duration::from_secs(86_400 * 30));
        let outcome = resource.fetch(false, || async { Ok(2) }).await.unwrap();
        assert_eq!(outcome, FetchOutcome::Unchanged);
        assert_eq!(resource.data(), Some(1));
    }
}
