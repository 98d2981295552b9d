//! Versioned, time-limited cache entries persisted in a [`KeyValueStore`].
//!
//! An entry is served only while `now - timestamp < ttl` and its version
//! equals the version the code expects. Bumping the version in a release
//! transparently invalidates every persisted shape from older releases.
//! Wrong-version and undecodable entries are purged when read; an expired
//! entry of the current version stays behind as the fallback for a failed
//! fetch until the next save replaces it.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::duration_millis;
use crate::storage::{KeyValueStore, KeyValueStoreExt, StorageError};

/// Data wrapped with its fetch time and schema version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    /// Unix milliseconds at which `data` was fetched.
    pub timestamp: i64,
    pub version: u32,
}

impl<T> CacheEntry<T> {
    /// Wrap freshly fetched data.
    pub const fn new(data: T, timestamp: i64, version: u32) -> Self {
        Self {
            data,
            timestamp,
            version,
        }
    }

    /// Whether the entry may be served at `now`.
    #[must_use]
    pub fn is_valid(&self, now: i64, ttl: Duration, version: u32) -> bool {
        self.version == version && now.saturating_sub(self.timestamp) < duration_millis(ttl)
    }
}

/// A single persisted cache slot.
pub struct PersistedCache<T> {
    storage: Arc<dyn KeyValueStore>,
    key: &'static str,
    ttl: Duration,
    version: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for PersistedCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedCache")
            .field("key", &self.key)
            .field("ttl", &self.ttl)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl<T> PersistedCache<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Bind a cache slot to a storage key.
    pub fn new(storage: Arc<dyn KeyValueStore>, key: &'static str, ttl: Duration, version: u32) -> Self {
        Self {
            storage,
            key,
            ttl,
            version,
            _marker: PhantomData,
        }
    }

    /// Time-to-live of entries in this slot.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Expected schema version.
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Load a valid entry. Wrong-version entries are purged; expired entries
    /// are never returned but stay readable through [`Self::load_stale`].
    pub fn load_fresh(&self, now: i64) -> Option<CacheEntry<T>> {
        let entry: CacheEntry<T> = self.storage.get_json(self.key)?;
        if entry.is_valid(now, self.ttl, self.version) {
            debug!(key = self.key, "Persisted cache hit");
            return Some(entry);
        }
        if entry.version == self.version {
            // Keep the expired entry around as a fallback for failed fetches.
            debug!(key = self.key, "Persisted cache expired");
        } else {
            debug!(key = self.key, found = entry.version, expected = self.version, "Persisted cache version mismatch");
            self.purge();
        }
        None
    }

    /// Load an entry of the expected version regardless of age.
    ///
    /// Used only as a fallback when a network fetch fails.
    pub fn load_stale(&self) -> Option<CacheEntry<T>> {
        self.storage
            .get_json::<CacheEntry<T>>(self.key)
            .filter(|e| e.version == self.version)
    }

    /// Persist data with a fresh timestamp.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entry cannot be written.
    pub fn save(&self, data: &T, now: i64) -> Result<(), StorageError>
    where
        T: Clone,
    {
        let entry = CacheEntry::new(data.clone(), now, self.version);
        self.storage.set_json(self.key, &entry)
    }

    /// Remove the slot.
    pub fn purge(&self) {
        self.storage.remove_logged(self.key);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    const TTL: Duration = Duration::from_secs(60);

    fn cache(storage: &Arc<MemoryStore>, version: u32) -> PersistedCache<Vec<u32>> {
        PersistedCache::new(storage.clone(), "jdp.test", TTL, version)
    }

    #[test]
    fn test_fresh_entry_is_served() {
        let storage = Arc::new(MemoryStore::new());
        let c = cache(&storage, 1);
        c.save(&vec![1, 2], 1_000).unwrap();
        assert_eq!(c.load_fresh(1_000 + 59_999).unwrap().data, vec![1, 2]);
    }

    #[test]
    fn test_entry_at_exact_ttl_is_not_served() {
        let storage = Arc::new(MemoryStore::new());
        let c = cache(&storage, 1);
        c.save(&vec![1], 0).unwrap();
        assert!(c.load_fresh(60_000).is_none());
        // Expired but same version: still available as fallback.
        assert_eq!(c.load_stale().unwrap().data, vec![1]);
    }

    #[test]
    fn test_version_mismatch_is_purged() {
        let storage = Arc::new(MemoryStore::new());
        cache(&storage, 1).save(&vec![1], 0).unwrap();
        let v2 = cache(&storage, 2);
        assert!(v2.load_fresh(0).is_none());
        assert!(v2.load_stale().is_none());
        assert!(!storage.contains("jdp.test"));
    }

    #[test]
    fn test_undecodable_entry_is_purged() {
        let storage = Arc::new(MemoryStore::new());
        storage.set("jdp.test", r#"{"data":"pas une liste","timestamp":0,"version":1}"#).unwrap();
        let c = cache(&storage, 1);
        assert!(c.load_fresh(0).is_none());
        assert!(!storage.contains("jdp.test"));
    }
}
