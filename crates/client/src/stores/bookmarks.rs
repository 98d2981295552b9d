//! Bookmarked news.
//!
//! Toggling is optimistic: the set changes before the backend answers and
//! is put back, with a notification, when the call fails.

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, instrument, warn};

use super::notifications::Notifications;
use super::optimistic;
use crate::services::{BookmarkError, BookmarkService};
use crate::storage::{KeyValueStore, KeyValueStoreExt, keys};

/// Bookmarked slugs. Clones share state.
#[derive(Clone)]
pub struct BookmarkStore {
    inner: Arc<BookmarkStoreInner>,
}

struct BookmarkStoreInner {
    service: BookmarkService,
    storage: Arc<dyn KeyValueStore>,
    notifications: Notifications,
    slugs: RwLock<BTreeSet<String>>,
}

impl std::fmt::Debug for BookmarkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookmarkStore")
            .field("count", &self.slugs().len())
            .finish_non_exhaustive()
    }
}

impl BookmarkStore {
    /// Build the store from the persisted set.
    #[must_use]
    pub fn new(
        service: BookmarkService,
        storage: Arc<dyn KeyValueStore>,
        notifications: Notifications,
    ) -> Self {
        let slugs: BTreeSet<String> = storage.get_json(keys::BOOKMARKS).unwrap_or_default();
        Self {
            inner: Arc::new(BookmarkStoreInner {
                service,
                storage,
                notifications,
                slugs: RwLock::new(slugs),
            }),
        }
    }

    /// Replace the set with the backend's.
    ///
    /// # Errors
    ///
    /// Returns the service failure; the persisted set is kept.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<(), BookmarkError> {
        let slugs = self.inner.service.list().await?;
        debug!(count = slugs.len(), "Bookmarks loaded");
        *self.write() = slugs.into_iter().collect();
        self.persist();
        Ok(())
    }

    #[must_use]
    pub fn is_bookmarked(&self, slug: &str) -> bool {
        self.read().contains(slug.trim())
    }

    /// Bookmarked slugs, alphabetical.
    #[must_use]
    pub fn slugs(&self) -> Vec<String> {
        self.read().iter().cloned().collect()
    }

    /// Flip a slug's bookmark. Returns whether it is now bookmarked.
    ///
    /// # Errors
    ///
    /// Returns the service failure after the change has been rolled back
    /// and an error notification raised.
    #[instrument(skip(self), fields(slug = %slug))]
    pub async fn toggle(&self, slug: &str) -> Result<bool, BookmarkError> {
        let slug = slug.trim();
        if slug.is_empty() {
            return Err(BookmarkError::validation("Article inconnu."));
        }
        let adding = !self.is_bookmarked(slug);
        let service = &self.inner.service;

        optimistic::apply(
            || self.set(slug, adding),
            move || async move {
                if adding {
                    service.add(slug).await
                } else {
                    service.remove(slug).await
                }
            },
            |e: &BookmarkError| {
                warn!(error = %e, "Bookmark update failed, rolling back");
                self.set(slug, !adding);
                self.inner
                    .notifications
                    .error("Impossible de mettre à jour vos favoris. Veuillez réessayer.");
            },
        )
        .await?;
        Ok(adding)
    }

    /// Forget every bookmark locally (logout).
    pub fn clear(&self) {
        self.write().clear();
        self.inner.storage.remove_logged(keys::BOOKMARKS);
    }

    fn set(&self, slug: &str, bookmarked: bool) {
        {
            let mut slugs = self.write();
            if bookmarked {
                slugs.insert(slug.to_string());
            } else {
                slugs.remove(slug);
            }
        }
        self.persist();
    }

    fn persist(&self) {
        let slugs = self.read().clone();
        if let Err(e) = self.inner.storage.set_json(keys::BOOKMARKS, &slugs) {
            warn!(error = %e, "Failed to persist bookmarks");
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeSet<String>> {
        self.inner.slugs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeSet<String>> {
        self.inner.slugs.write().unwrap_or_else(PoisonError::into_inner)
    }
}
