//! Persisted key/value storage.
//!
//! The on-device equivalent of browser local storage. Each store owns its
//! keys (see [`keys`]); no two stores write the same key. Values are JSON
//! strings.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;

/// Storage keys. Each key is written by exactly one store.
pub mod keys {
    /// Bearer token (auth store).
    pub const AUTH_TOKEN: &str = "jdp.auth.token";
    /// Token expiry, unix milliseconds (auth store).
    pub const AUTH_TOKEN_EXPIRES_AT: &str = "jdp.auth.token_expires_at";
    /// Sanitised user profile (auth store).
    pub const AUTH_USER: &str = "jdp.auth.user";
    /// Local cart with its absolute expiry (cart store).
    pub const CART: &str = "jdp.cart";
    /// Shop catalog cache entry (shop store).
    pub const SHOP_CATALOG: &str = "jdp.shop.catalog";
    /// One-click plan catalog cache entry (subscription catalog store).
    pub const SUBSCRIPTION_CATALOG: &str = "jdp.subscriptions.catalog";
    /// Webinar list cache entry (consultations store).
    pub const CONSULTATIONS: &str = "jdp.consultations";
    /// Bookmarked slugs (bookmark store).
    pub const BOOKMARKS: &str = "jdp.bookmarks";

    /// Every auth key, cleared together.
    pub const AUTH_KEYS: [&str; 3] = [AUTH_TOKEN, AUTH_TOKEN_EXPIRES_AT, AUTH_USER];
}

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem failure.
    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),

    /// Value could not be (de)serialized.
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key contains characters that cannot map to a file name.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),
}

/// A string key/value store.
pub trait KeyValueStore: Send + Sync {
    /// Read a raw value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a raw value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a key; missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Typed JSON helpers over any [`KeyValueStore`].
pub trait KeyValueStoreExt: KeyValueStore {
    /// Read and decode a JSON value. Undecodable values are treated as absent
    /// and removed, so a shape change never wedges a store.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "Failed to read persisted value");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Discarding undecodable persisted value");
                self.remove_logged(key);
                None
            }
        }
    }

    /// Encode and write a JSON value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if encoding or writing fails.
    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw)
    }

    /// Remove a key, logging rather than propagating failures.
    fn remove_logged(&self, key: &str) {
        if let Err(e) = self.remove(key) {
            warn!(key, error = %e, "Failed to remove persisted value");
        }
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {}

// =============================================================================
// MemoryStore
// =============================================================================

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a key is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

// =============================================================================
// FileStore
// =============================================================================

/// One file per key under a directory.
///
/// Writes go to a temporary sibling and are renamed into place, so a crash
/// never leaves a half-written value behind.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a storage directory.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the directory cannot be created.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory backing this store.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
            && !key.starts_with('.');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        store.set(keys::CART, "[]").unwrap();
        assert_eq!(store.get(keys::CART).unwrap().as_deref(), Some("[]"));
        store.remove(keys::CART).unwrap();
        assert!(!store.contains(keys::CART));
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        FileStore::open(dir.path())
            .unwrap()
            .set_json(keys::BOOKMARKS, &vec!["or-2024"])
            .unwrap();

        let reopened = FileStore::open(dir.path()).unwrap();
        let slugs: Vec<String> = reopened.get_json(keys::BOOKMARKS).unwrap();
        assert_eq!(slugs, ["or-2024"]);
    }

    #[test]
    fn test_file_store_missing_key_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.get(keys::AUTH_TOKEN).unwrap().is_none());
        store.remove(keys::AUTH_TOKEN).unwrap();
    }

    #[test]
    fn test_file_store_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.set("../escape", "x"),
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_undecodable_value_is_discarded() {
        let store = MemoryStore::new();
        store.set(keys::CART, "{not json").unwrap();
        let value: Option<Vec<String>> = store.get_json(keys::CART);
        assert!(value.is_none());
        assert!(!store.contains(keys::CART));
    }
}
