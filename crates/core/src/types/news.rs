//! Editorial content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::NewsId;

/// Editorial format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsKind {
    Article,
    Video,
    Brief,
}

impl NewsKind {
    /// Query-string / wire form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::Video => "video",
            Self::Brief => "brief",
        }
    }

    /// Parse the wire form, accepting the French labels the CMS sometimes sends.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "article" => Some(Self::Article),
            "video" | "vidéo" => Some(Self::Video),
            "brief" | "breve" | "brève" => Some(Self::Brief),
            _ => None,
        }
    }
}

/// A callout block ("encadré") inside an article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encadre {
    pub title: Option<String>,
    pub html: String,
}

/// Kind-specific body of a news item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NewsBody {
    /// Rich HTML content with optional callouts.
    Article {
        html: String,
        encadres: Vec<Encadre>,
    },
    /// A YouTube video instead of content.
    Video {
        youtube_id: String,
        duration_seconds: Option<u32>,
    },
    /// A short text.
    Brief { html: String },
}

/// An editorial content unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: NewsId,
    pub slug: String,
    pub title: String,
    pub kind: NewsKind,
    pub published_at: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    /// Plain-text excerpt derived from the HTML content.
    pub excerpt: Option<String>,
    /// Absent in list responses; present on detail.
    pub body: Option<NewsBody>,
}

impl NewsItem {
    /// YouTube watch URL for videos.
    #[must_use]
    pub fn video_url(&self) -> Option<String> {
        match &self.body {
            Some(NewsBody::Video { youtube_id, .. }) => {
                Some(format!("https://www.youtube.com/watch?v={youtube_id}"))
            }
            _ => None,
        }
    }
}

/// One page of news.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NewsPage {
    pub items: Vec<NewsItem>,
    pub page: u32,
    pub total_pages: u32,
}

impl NewsPage {
    /// Whether another page can be requested.
    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.page < self.total_pages
    }
}
