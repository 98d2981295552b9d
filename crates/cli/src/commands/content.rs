//! News, webinar and bookmark commands.

use jdp_client::AppState;
use jdp_core::NewsKind;
use tracing::info;

use super::flush_notifications;

/// List news, loading up to `pages` pages.
///
/// # Errors
///
/// Returns an error for an unknown kind or a failed fetch.
pub async fn news(state: &AppState, kind: Option<&str>, pages: u32) -> Result<(), Box<dyn std::error::Error>> {
    let kind = kind
        .map(|k| NewsKind::from_wire(k).ok_or_else(|| format!("Unknown news kind: {k}")))
        .transpose()?;
    let news = state.news_store();
    news.fetch(kind, false).await?;
    for _ in 1..pages {
        if !news.feed().has_more() {
            break;
        }
        news.load_more().await?;
    }

    let feed = news.feed();
    info!(page = feed.page, total_pages = feed.total_pages, "News");
    for item in &feed.items {
        let date = item
            .published_at
            .map_or_else(String::new, |d| d.format("%d/%m/%Y").to_string());
        info!("  [{}] {} {} ({})", item.kind.as_str(), date, item.title, item.slug);
    }
    Ok(())
}

/// List upcoming webinars and available replays.
///
/// # Errors
///
/// Returns an error if the webinar list cannot be fetched.
pub async fn webinars(state: &AppState) -> Result<(), Box<dyn std::error::Error>> {
    let consultations = state.consultations_store();
    consultations.fetch(false).await?;

    if let Some(next) = consultations.next() {
        info!(scheduled_at = ?next.scheduled_at, speaker = ?next.speaker, "Next webinar: {}", next.title);
    }
    for webinar in consultations.upcoming() {
        info!("  upcoming: {} {:?}", webinar.title, webinar.scheduled_at);
    }
    for webinar in consultations.replays() {
        info!("  replay: {} {}", webinar.title, webinar.replay_url.as_deref().unwrap_or("-"));
    }
    Ok(())
}

/// List bookmarked news slugs.
///
/// # Errors
///
/// Returns an error if the bookmarks cannot be loaded.
pub async fn bookmarks(state: &AppState) -> Result<(), Box<dyn std::error::Error>> {
    state.auth_store().initialize().await?;
    let bookmarks = state.bookmark_store();
    bookmarks.load().await?;
    for slug in bookmarks.slugs() {
        info!("  {slug}");
    }
    Ok(())
}

/// Toggle a bookmark. A rejected toggle is rolled back.
///
/// # Errors
///
/// Returns the backend failure after rollback.
pub async fn toggle_bookmark(state: &AppState, slug: &str) -> Result<(), Box<dyn std::error::Error>> {
    state.auth_store().initialize().await?;
    let bookmarks = state.bookmark_store();
    let result = bookmarks.toggle(slug).await;
    flush_notifications(&state.notifications());
    let bookmarked = result?;
    info!(slug, bookmarked, "Bookmark updated");
    Ok(())
}
