//! Metal price charts.
//!
//! Chart configurations come pre-built from an external endpoint. Before
//! any chart is requested the charting library manifest must be loaded;
//! [`ChartLibrary`] guards that load so concurrent requesters share one
//! underlying fetch, and once loaded it stays loaded for the life of the
//! handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDate;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

use super::error::define_service_error;
use super::{check_rejection, wire};
use crate::http::ApiRequest;
use crate::source::SharedSource;

define_service_error!(ChartError, "chart");

/// Loaded charting library metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartManifest {
    pub version: String,
    pub theme: Option<String>,
}

/// Shared handle on the charting library.
pub struct ChartLibrary {
    source: SharedSource,
    manifest: OnceCell<ChartManifest>,
    loads: AtomicUsize,
}

impl std::fmt::Debug for ChartLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChartLibrary")
            .field("source", &self.source.label())
            .field("manifest", &self.manifest.get())
            .finish_non_exhaustive()
    }
}

impl ChartLibrary {
    #[must_use]
    pub fn new(source: SharedSource) -> Self {
        Self {
            source,
            manifest: OnceCell::new(),
            loads: AtomicUsize::new(0),
        }
    }

    /// Load the library once. Concurrent callers await the same load; a
    /// failed load is retried by the next caller.
    ///
    /// # Errors
    ///
    /// Returns the classified failure of the manifest fetch.
    pub async fn ensure_loaded(&self) -> Result<&ChartManifest, ChartError> {
        self.manifest
            .get_or_try_init(|| async {
                self.loads.fetch_add(1, Ordering::SeqCst);
                let body = self.source.send(ApiRequest::get("/manifest")).await?;
                check_rejection(&body)?;
                let version = wire::string(&body, &["version"])
                    .ok_or_else(|| ChartError::invalid_response("Manifeste sans version."))?;
                info!(version = %version, "Chart library loaded");
                Ok::<_, ChartError>(ChartManifest {
                    version,
                    theme: wire::string(&body, &["theme"]),
                })
            })
            .await
    }

    /// Whether the library is loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.manifest.initialized()
    }

    /// Number of underlying load attempts so far.
    #[must_use]
    pub fn load_attempts(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

/// Date range of a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// A pre-built chart configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartConfig {
    pub title: Option<String>,
    pub series: Vec<String>,
    /// Payload as returned, handed to the renderer untouched.
    pub payload: Value,
}

/// Chart configuration endpoint.
#[derive(Debug, Clone)]
pub struct ChartService {
    library: Arc<ChartLibrary>,
}

impl ChartService {
    #[must_use]
    pub const fn new(library: Arc<ChartLibrary>) -> Self {
        Self { library }
    }

    /// The shared library handle.
    #[must_use]
    pub const fn library(&self) -> &Arc<ChartLibrary> {
        &self.library
    }

    /// Chart for a metal family and series over a date range.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank family or an inverted range (no call made),
    /// otherwise the library load or fetch failure.
    #[instrument(skip(self), fields(family = %family, series = %series))]
    pub async fn fetch_chart(&self, family: &str, series: &str, range: ChartRange) -> Result<ChartConfig, ChartError> {
        if family.trim().is_empty() {
            return Err(ChartError::validation("Famille de métal requise."));
        }
        if range.from > range.to {
            return Err(ChartError::validation("La date de début suit la date de fin."));
        }
        let manifest = self.library.ensure_loaded().await?;
        debug!(version = %manifest.version, "Fetching chart configuration");

        let request = ApiRequest::get("/chart")
            .query("family", family.trim())
            .query("series", series.trim())
            .query("from", range.from.format("%Y-%m-%d"))
            .query("to", range.to.format("%Y-%m-%d"));
        let body = self.library.source.send(request).await?;
        check_rejection(&body)?;

        let payload = wire::unwrap(&body, &["data", "chart"]).clone();
        Ok(ChartConfig {
            title: wire::string(&payload, &["title"])
                .or_else(|| wire::field(&payload, &["title"]).and_then(|t| wire::string(t, &["text"]))),
            series: wire::list(&payload, &["series"])
                .iter()
                .filter_map(|s| wire::string(s, &["name", "id"]))
                .collect(),
            payload,
        })
    }
}
