//! News bookmarks.

use serde_json::{Value, json};
use tracing::instrument;

use super::error::define_service_error;
use super::{check_rejection, wire};
use crate::http::ApiRequest;
use crate::source::SharedSource;

define_service_error!(BookmarkError, "bookmark");

/// Bookmark endpoints (`/api/bookmarks`).
#[derive(Clone)]
pub struct BookmarkService {
    source: SharedSource,
}

impl std::fmt::Debug for BookmarkService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookmarkService")
            .field("source", &self.source.label())
            .finish()
    }
}

impl BookmarkService {
    #[must_use]
    pub fn new(source: SharedSource) -> Self {
        Self { source }
    }

    /// Bookmarked news slugs.
    ///
    /// # Errors
    ///
    /// Returns the classified backend failure.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<String>, BookmarkError> {
        let body = self.source.send(ApiRequest::get("/api/bookmarks")).await?;
        check_rejection(&body)?;
        Ok(wire::items(&body, &["bookmarks", "data"])
            .iter()
            .filter_map(|entry| match entry {
                Value::String(slug) if !slug.trim().is_empty() => Some(slug.trim().to_string()),
                Value::Object(_) => wire::string(entry, &["slug", "newsSlug", "news_slug"]),
                _ => None,
            })
            .collect())
    }

    /// Bookmark a slug.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty slug (no call made).
    #[instrument(skip(self), fields(slug = %slug))]
    pub async fn add(&self, slug: &str) -> Result<(), BookmarkError> {
        let slug = non_empty(slug)?;
        let body = self
            .source
            .send(ApiRequest::post("/api/bookmarks").json(json!({ "slug": slug })))
            .await?;
        check_rejection(&body)?;
        Ok(())
    }

    /// Remove a bookmark.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty slug (no call made).
    #[instrument(skip(self), fields(slug = %slug))]
    pub async fn remove(&self, slug: &str) -> Result<(), BookmarkError> {
        let slug = non_empty(slug)?;
        let path = format!("/api/bookmarks/{}", urlencoding::encode(slug));
        let body = self.source.send(ApiRequest::delete(path)).await?;
        check_rejection(&body)?;
        Ok(())
    }
}

fn non_empty(slug: &str) -> Result<&str, BookmarkError> {
    let slug = slug.trim();
    if slug.is_empty() {
        return Err(BookmarkError::validation("Article inconnu."));
    }
    Ok(slug)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::source::MockSource;
    use jdp_core::ErrorCode;

    fn service() -> BookmarkService {
        BookmarkService::new(Arc::new(MockSource::new()))
    }

    #[tokio::test]
    async fn test_list_reads_object_entries() {
        assert_eq!(service().list().await.unwrap(), ["or-record-historique"]);
    }

    #[tokio::test]
    async fn test_add_and_remove() {
        service().add("argent-industriel").await.unwrap();
        service().remove("argent-industriel").await.unwrap();
    }

    #[tokio::test]
    async fn test_blank_slug_is_validation() {
        let err = service().add("  ").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);
    }
}
