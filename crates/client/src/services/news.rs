//! Editorial news.
//!
//! List pages go through a supersession slot (the newest filter/page wins).
//! Detail, trending and latest responses are cached in memory for five
//! minutes with `moka`.

use std::sync::Arc;
use std::time::Duration;

use jdp_core::{Encadre, NewsBody, NewsId, NewsItem, NewsKind, NewsPage};
use moka::future::Cache;
use serde_json::Value;
use tracing::{debug, instrument};

use super::error::define_service_error;
use super::{check_rejection, wire};
use crate::http::{ApiRequest, RequestSlot};
use crate::source::SharedSource;

define_service_error!(NewsError, "news");

/// Length of generated excerpts, in characters.
const EXCERPT_CHARS: usize = 200;

#[derive(Clone)]
enum CacheValue {
    Item(Box<NewsItem>),
    Items(Vec<NewsItem>),
}

/// News endpoints (`/api/news`).
#[derive(Clone)]
pub struct NewsService {
    inner: Arc<NewsServiceInner>,
}

struct NewsServiceInner {
    source: SharedSource,
    slot: RequestSlot,
    timeout: Duration,
    cache: Cache<String, CacheValue>,
}

impl std::fmt::Debug for NewsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewsService")
            .field("source", &self.inner.source.label())
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}

impl NewsService {
    #[must_use]
    pub fn new(source: SharedSource, timeout: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(500)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();
        Self {
            inner: Arc::new(NewsServiceInner {
                source,
                slot: RequestSlot::new("news.list"),
                timeout,
                cache,
            }),
        }
    }

    /// One page of the news feed, optionally filtered by kind.
    ///
    /// # Errors
    ///
    /// `Cancelled` when a newer list request superseded this one.
    #[instrument(skip(self), fields(kind = ?kind.map(NewsKind::as_str)))]
    pub async fn list(&self, kind: Option<NewsKind>, page: u32) -> Result<NewsPage, NewsError> {
        let page = page.max(1);
        let mut request = ApiRequest::get("/api/news").query("page", page);
        if let Some(kind) = kind {
            request = request.query("type", kind.as_str());
        }
        let body = self
            .inner
            .slot
            .run(self.inner.timeout, self.inner.source.send(request))
            .await?;
        check_rejection(&body)?;

        let items = map_items(&body);
        let meta = wire::field(&body, &["meta", "pagination"]).unwrap_or(&body);
        let current = wire::count_u32(meta, &["current_page", "currentPage", "page"]).unwrap_or(page);
        let total_pages = wire::count_u32(meta, &["last_page", "lastPage", "total_pages", "totalPages"])
            .unwrap_or(current)
            .max(current);

        Ok(NewsPage {
            items,
            page: current,
            total_pages,
        })
    }

    /// Full item by slug.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown slug.
    #[instrument(skip(self), fields(slug = %slug))]
    pub async fn detail(&self, slug: &str) -> Result<NewsItem, NewsError> {
        let slug = slug.trim();
        if slug.is_empty() {
            return Err(NewsError::validation("Article inconnu."));
        }
        let cache_key = format!("detail:{slug}");
        if let Some(CacheValue::Item(item)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for news detail");
            return Ok(*item);
        }

        let path = format!("/api/news/{}", urlencoding::encode(slug));
        let body = self.inner.source.send(ApiRequest::get(path)).await?;
        check_rejection(&body)?;
        let item = map_item(wire::unwrap(&body, &["data", "news", "article"]))
            .ok_or_else(|| NewsError::invalid_response("Article illisible."))?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Item(Box::new(item.clone())))
            .await;
        Ok(item)
    }

    /// Most-read items.
    ///
    /// # Errors
    ///
    /// Returns the classified backend failure.
    #[instrument(skip(self))]
    pub async fn trending(&self) -> Result<Vec<NewsItem>, NewsError> {
        self.cached_list("trending", "/api/news/trending").await
    }

    /// Most recent items.
    ///
    /// # Errors
    ///
    /// Returns the classified backend failure.
    #[instrument(skip(self))]
    pub async fn latest(&self) -> Result<Vec<NewsItem>, NewsError> {
        self.cached_list("latest", "/api/news/latest").await
    }

    /// Abandon an in-flight list request.
    pub fn cancel(&self) {
        self.inner.slot.cancel();
    }

    /// Drop every cached response.
    pub fn invalidate(&self) {
        self.inner.cache.invalidate_all();
    }

    async fn cached_list(&self, key: &str, path: &str) -> Result<Vec<NewsItem>, NewsError> {
        if let Some(CacheValue::Items(items)) = self.inner.cache.get(key).await {
            debug!(key, "Cache hit for news list");
            return Ok(items);
        }
        let body = self.inner.source.send(ApiRequest::get(path)).await?;
        check_rejection(&body)?;
        let items = map_items(&body);
        self.inner
            .cache
            .insert(key.to_string(), CacheValue::Items(items.clone()))
            .await;
        Ok(items)
    }
}

fn map_items(body: &Value) -> Vec<NewsItem> {
    wire::items(body, &["data", "news", "items"])
        .iter()
        .filter_map(map_item)
        .collect()
}

fn map_item(raw: &Value) -> Option<NewsItem> {
    let slug = wire::string(raw, &["slug"])?;
    let kind = wire::string(raw, &["type", "kind", "format"])
        .and_then(|k| NewsKind::from_wire(&k))
        .unwrap_or(NewsKind::Article);
    let html = wire::string(raw, &["content", "html", "body"]);

    let body = match kind {
        NewsKind::Video => {
            let video = wire::field(raw, &["video"]).unwrap_or(raw);
            wire::string(video, &["youtubeId", "youtube_id", "youtube"]).map(|youtube_id| NewsBody::Video {
                youtube_id,
                duration_seconds: wire::count_u32(video, &["duration", "durationSeconds", "duration_seconds"]),
            })
        }
        NewsKind::Article => html.clone().map(|html| NewsBody::Article {
            html,
            encadres: wire::list(raw, &["encadres", "callouts", "boxes"])
                .iter()
                .filter_map(|e| {
                    Some(Encadre {
                        title: wire::string(e, &["title", "titre"]).map(|t| wire::decode_entities(&t)),
                        html: wire::string(e, &["content", "html", "body"])?,
                    })
                })
                .collect(),
        }),
        NewsKind::Brief => html.clone().map(|html| NewsBody::Brief { html }),
    };

    let author = wire::string(raw, &["author", "authorName"])
        .or_else(|| wire::field(raw, &["author"]).and_then(|a| wire::string(a, &["name", "fullName"])));

    Some(NewsItem {
        id: NewsId::new(wire::string(raw, &["id", "uuid"]).unwrap_or_else(|| slug.clone())),
        title: wire::string(raw, &["title", "titre"]).map_or_else(|| slug.clone(), |t| wire::decode_entities(&t)),
        slug,
        kind,
        published_at: wire::datetime(raw, &["publishedAt", "published_at", "date", "createdAt"]),
        author,
        tags: wire::strings(raw, &["tags", "categories"]),
        image_url: wire::string(raw, &["image", "imageUrl", "image_url", "thumbnail"]),
        excerpt: wire::string(raw, &["excerpt", "summary", "chapo"])
            .map(|e| wire::html_to_text(&e))
            .or_else(|| html.as_deref().and_then(|h| wire::excerpt(h, EXCERPT_CHARS))),
        body,
    })
}
