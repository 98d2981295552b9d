//! News, webinars and bookmarks against the fake backend.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use axum::http::Method;
use jdp_client::stores::{FetchOutcome, NotificationLevel};
use jdp_core::NewsKind;
use jdp_integration_tests::FakeBackend;
use serde_json::json;

fn slugs(items: &[jdp_core::NewsItem]) -> Vec<&str> {
    items.iter().map(|i| i.slug.as_str()).collect()
}

#[tokio::test]
async fn test_news_pages_are_appended() {
    let backend = FakeBackend::start().await;
    let (state, _) = backend.state();
    let news = state.news_store();

    news.fetch(None, false).await.unwrap();
    let feed = news.feed();
    assert_eq!((feed.page, feed.total_pages), (1, 3));
    assert_eq!(slugs(&feed.items), vec!["banques-centrales-achats", "or-record-historique"]);

    news.load_more().await.unwrap();
    news.load_more().await.unwrap();
    let feed = news.feed();
    assert_eq!(feed.items.len(), 5);
    assert!(!feed.has_more());
    assert_eq!(news.load_more().await.unwrap(), FetchOutcome::Unchanged);

    let pages: Vec<Option<String>> = backend
        .requests_to("/api/news")
        .iter()
        .map(|r| r.query_value("page").map(ToString::to_string))
        .collect();
    assert_eq!(
        pages,
        vec![Some("1".to_string()), Some("2".to_string()), Some("3".to_string())]
    );
}

#[tokio::test]
async fn test_latest_filter_wins_over_slow_response() {
    let backend = FakeBackend::start().await;
    let (state, _) = backend.state();
    let news = state.news_store();
    backend.delay("/api/news", ("type", "video"), Duration::from_millis(300));

    let slow = news.fetch(Some(NewsKind::Video), false);
    let fast = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        news.fetch(Some(NewsKind::Brief), false).await
    };
    let (slow, fast) = tokio::join!(slow, fast);

    assert_eq!(slow.unwrap(), FetchOutcome::Superseded);
    assert_eq!(fast.unwrap(), FetchOutcome::Fetched);

    // Give the held response time to arrive; it must not land.
    tokio::time::sleep(Duration::from_millis(350)).await;
    let feed = news.feed();
    assert_eq!(feed.kind, Some(NewsKind::Brief));
    assert_eq!(slugs(&feed.items), vec!["flash-fed-taux"]);
}

#[tokio::test]
async fn test_trending_and_detail() {
    let backend = FakeBackend::start().await;
    let (state, _) = backend.state();
    let news = state.news_store();

    news.fetch_trending(false).await.unwrap();
    assert_eq!(
        slugs(&news.trending()),
        vec!["or-record-historique", "argent-industriel", "banques-centrales-achats"]
    );

    let video = news.detail("argent-industriel").await.unwrap();
    assert_eq!(video.kind, NewsKind::Video);
    assert!(news.detail("inconnu").await.is_err());
}

#[tokio::test]
async fn test_webinar_next_and_last() {
    let backend = FakeBackend::start().await;
    let (state, _) = backend.state();
    let consultations = state.consultations_store();

    consultations.fetch(false).await.unwrap();

    assert_eq!(consultations.webinars().items.len(), 4);
    assert_eq!(consultations.next().unwrap().title, "Constituer un patrimoine en métaux");
    assert_eq!(consultations.last().unwrap().title, "Argent métal : perspectives 2025");
    assert_eq!(backend.requests_to("/api/fetchWebinarList").len(), 1);
}

#[tokio::test]
async fn test_failed_bookmark_is_rolled_back() {
    let backend = FakeBackend::start().await;
    let (state, _) = backend.state();
    let bookmarks = state.bookmark_store();
    bookmarks.load().await.unwrap();
    assert_eq!(bookmarks.slugs(), vec!["or-record-historique".to_string()]);

    backend.respond(Method::POST, "/api/bookmarks", 500, json!({ "message": "Erreur interne." }));
    assert!(bookmarks.toggle("argent-industriel").await.is_err());

    assert!(!bookmarks.is_bookmarked("argent-industriel"));
    let notifications = state.notifications().drain();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].level, NotificationLevel::Error);
}

#[tokio::test]
async fn test_bookmark_removal_hits_slug_path() {
    let backend = FakeBackend::start().await;
    let (state, _) = backend.state();
    let bookmarks = state.bookmark_store();
    bookmarks.load().await.unwrap();

    let now_bookmarked = bookmarks.toggle("or-record-historique").await.unwrap();

    assert!(!now_bookmarked);
    assert!(bookmarks.slugs().is_empty());
    let deletes = backend.requests_to("/api/bookmarks/or-record-historique");
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].method, Method::DELETE);
    assert!(state.notifications().drain().is_empty());
}
