//! News feed store.
//!
//! The feed is paginated: selecting a kind loads page 1 and replaces the
//! feed, [`NewsStore::load_more`] appends the next page. Switching kind
//! while a page is loading discards the older response.

use std::sync::Arc;
use std::time::Duration;

use jdp_core::{NewsItem, NewsKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::resource::{FetchOutcome, LoadState, Resource};
use crate::clock::SharedClock;
use crate::services::{NewsError, NewsService};

/// Lifetime of the feed and of the trending/latest lists.
pub const NEWS_TTL: Duration = Duration::from_secs(300); // 5 minutes

/// Pages loaded so far for one kind filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NewsFeed {
    pub kind: Option<NewsKind>,
    pub items: Vec<NewsItem>,
    pub page: u32,
    pub total_pages: u32,
}

impl NewsFeed {
    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.page < self.total_pages
    }
}

/// News feed, trending and latest lists. Clones share state.
#[derive(Debug, Clone)]
pub struct NewsStore {
    inner: Arc<NewsStoreInner>,
}

#[derive(Debug)]
struct NewsStoreInner {
    service: NewsService,
    feed: Resource<NewsFeed, NewsError>,
    trending: Resource<Vec<NewsItem>, NewsError>,
    latest: Resource<Vec<NewsItem>, NewsError>,
}

impl NewsStore {
    #[must_use]
    pub fn new(service: NewsService, clock: SharedClock) -> Self {
        Self {
            inner: Arc::new(NewsStoreInner {
                service,
                feed: Resource::memory("news.feed", Some(NEWS_TTL), clock.clone()),
                trending: Resource::memory("news.trending", Some(NEWS_TTL), clock.clone()),
                latest: Resource::memory("news.latest", Some(NEWS_TTL), clock),
            }),
        }
    }

    /// Load page 1 of the feed for `kind`. A different kind than the one
    /// loaded always refetches.
    ///
    /// # Errors
    ///
    /// Returns the service failure. A superseded request reports
    /// [`FetchOutcome::Superseded`].
    #[instrument(skip(self), fields(kind = ?kind.map(NewsKind::as_str)))]
    pub async fn fetch(&self, kind: Option<NewsKind>, force: bool) -> Result<FetchOutcome, NewsError> {
        let same_kind = self.inner.feed.with(|f| f.kind == kind).unwrap_or(false);
        let service = &self.inner.service;
        self.inner
            .feed
            .fetch(force || !same_kind, || async move {
                let page = service.list(kind, 1).await?;
                Ok(NewsFeed {
                    kind,
                    items: page.items,
                    page: page.page,
                    total_pages: page.total_pages,
                })
            })
            .await
    }

    /// Reload page 1 of the current kind.
    ///
    /// # Errors
    ///
    /// See [`NewsStore::fetch`].
    pub async fn refresh(&self) -> Result<FetchOutcome, NewsError> {
        self.fetch(self.kind(), true).await
    }

    /// Append the next page of the current feed.
    ///
    /// # Errors
    ///
    /// Returns the service failure; loaded pages are kept.
    #[instrument(skip(self))]
    pub async fn load_more(&self) -> Result<FetchOutcome, NewsError> {
        let Some(current) = self.inner.feed.data() else {
            return self.fetch(None, false).await;
        };
        if !current.has_more() {
            debug!(page = current.page, "Feed fully loaded");
            return Ok(FetchOutcome::Unchanged);
        }
        let service = &self.inner.service;
        self.inner
            .feed
            .fetch(true, || async move {
                let next = service.list(current.kind, current.page + 1).await?;
                let mut items = current.items;
                for item in next.items {
                    if !items.iter().any(|i| i.id == item.id) {
                        items.push(item);
                    }
                }
                Ok(NewsFeed {
                    kind: current.kind,
                    items,
                    page: next.page,
                    total_pages: next.total_pages,
                })
            })
            .await
    }

    /// Full article by slug (cached by the service).
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown slug.
    pub async fn detail(&self, slug: &str) -> Result<NewsItem, NewsError> {
        self.inner.service.detail(slug).await
    }

    /// # Errors
    ///
    /// Returns the service failure.
    pub async fn fetch_trending(&self, force: bool) -> Result<FetchOutcome, NewsError> {
        let service = &self.inner.service;
        self.inner.trending.fetch(force, || service.trending()).await
    }

    /// # Errors
    ///
    /// Returns the service failure.
    pub async fn fetch_latest(&self, force: bool) -> Result<FetchOutcome, NewsError> {
        let service = &self.inner.service;
        self.inner.latest.fetch(force, || service.latest()).await
    }

    #[must_use]
    pub fn feed(&self) -> NewsFeed {
        self.inner.feed.data().unwrap_or_default()
    }

    #[must_use]
    pub fn kind(&self) -> Option<NewsKind> {
        self.inner.feed.with(|f| f.kind).flatten()
    }

    #[must_use]
    pub fn trending(&self) -> Vec<NewsItem> {
        self.inner.trending.data().unwrap_or_default()
    }

    #[must_use]
    pub fn latest(&self) -> Vec<NewsItem> {
        self.inner.latest.data().unwrap_or_default()
    }

    #[must_use]
    pub fn state(&self) -> LoadState<NewsError> {
        self.inner.feed.state()
    }

    /// Abandon an in-flight feed request.
    pub fn cancel(&self) {
        self.inner.service.cancel();
    }
}
