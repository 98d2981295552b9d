//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `JDP_API_BASE_URL` - Backend base URL (only when at least one feature
//!   area talks to the real backend)
//!
//! ## Optional
//! - `JDP_ENV` - `development` (default) or `production`
//! - `JDP_MOCK` - Default data source for every area (default: false)
//! - `JDP_MOCK_<AREA>` - Per-area override, where `<AREA>` is one of `AUTH`,
//!   `CART`, `SHOP`, `SUBSCRIPTIONS`, `PAYMENTS`, `CONSULTATIONS`, `NEWS`,
//!   `BOOKMARKS`, `ACCOUNT`, `CHARTS`
//! - `JDP_MOCK_DELAY_MS` - Artificial latency for mock responses (default: 0)
//! - `JDP_STORAGE_DIR` - Persisted state directory (default: .jdp)
//! - `JDP_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `JDP_CHART_DATA_URL` - External chart-configuration endpoint
//! - `JDP_STRIPE_API_BASE` - Payment provider API (default: <https://api.stripe.com>)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//!
//! In production every area must use the real backend; a mocked area is a
//! startup error.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
const DEFAULT_STORAGE_DIR: &str = ".jdp";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Mock data source enabled for {0} in a production build")]
    MockInProduction(FeatureArea),
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// A group of services that share one data-source selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureArea {
    Auth,
    Cart,
    Shop,
    Subscriptions,
    Payments,
    Consultations,
    News,
    Bookmarks,
    /// Addresses, invoices, the user's subscription and legacy linking.
    Account,
    Charts,
}

impl FeatureArea {
    /// Every area, in a stable order.
    pub const ALL: [Self; 10] = [
        Self::Auth,
        Self::Cart,
        Self::Shop,
        Self::Subscriptions,
        Self::Payments,
        Self::Consultations,
        Self::News,
        Self::Bookmarks,
        Self::Account,
        Self::Charts,
    ];

    /// Suffix used in `JDP_MOCK_<AREA>`.
    #[must_use]
    pub const fn env_suffix(self) -> &'static str {
        match self {
            Self::Auth => "AUTH",
            Self::Cart => "CART",
            Self::Shop => "SHOP",
            Self::Subscriptions => "SUBSCRIPTIONS",
            Self::Payments => "PAYMENTS",
            Self::Consultations => "CONSULTATIONS",
            Self::News => "NEWS",
            Self::Bookmarks => "BOOKMARKS",
            Self::Account => "ACCOUNT",
            Self::Charts => "CHARTS",
        }
    }
}

impl fmt::Display for FeatureArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.env_suffix().to_ascii_lowercase())
    }
}

/// Mock/real selection per feature area.
#[derive(Debug, Clone, Default)]
pub struct MockSettings {
    /// Selection for areas without an override.
    pub default: bool,
    /// Per-area overrides.
    pub overrides: HashMap<FeatureArea, bool>,
    /// Artificial latency added to every mock response.
    pub delay: Duration,
}

impl MockSettings {
    /// Every area mocked, no delay.
    #[must_use]
    pub fn all() -> Self {
        Self {
            default: true,
            ..Self::default()
        }
    }

    /// Whether `area` uses the fixture data source.
    #[must_use]
    pub fn is_mocked(&self, area: FeatureArea) -> bool {
        self.overrides.get(&area).copied().unwrap_or(self.default)
    }

    fn any_real(&self) -> bool {
        FeatureArea::ALL.iter().any(|a| !self.is_mocked(*a))
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Deployment environment.
    pub environment: Environment,
    /// Backend base URL.
    pub api_base_url: Option<Url>,
    /// Data-source selection.
    pub mock: MockSettings,
    /// Directory holding persisted state files.
    pub storage_dir: PathBuf,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// External chart-configuration endpoint.
    pub chart_data_url: Option<Url>,
    /// Payment provider API base.
    pub stripe_api_base: String,
    /// Sentry DSN for error tracking.
    pub sentry_dsn: Option<String>,
}

impl ClientConfig {
    /// Configuration with every area mocked; used by tests and demos.
    #[must_use]
    pub fn mocked(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            environment: Environment::Development,
            api_base_url: None,
            mock: MockSettings::all(),
            storage_dir: storage_dir.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            chart_data_url: None,
            stripe_api_base: DEFAULT_STRIPE_API_BASE.to_string(),
            sentry_dsn: None,
        }
    }

    /// Configuration talking to a real backend for every area.
    #[must_use]
    pub fn for_backend(api_base_url: Url, storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            api_base_url: Some(api_base_url),
            mock: MockSettings::default(),
            ..Self::mocked(storage_dir)
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is invalid, the base URL is
    /// missing while a real data source is selected, or a mock is enabled in
    /// production.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("JDP_ENV").as_deref().map(str::trim) {
            None | Some("" | "development" | "dev") => Environment::Development,
            Some("production" | "prod") => Environment::Production,
            Some(other) => {
                return Err(ConfigError::InvalidEnvVar(
                    "JDP_ENV".to_string(),
                    format!("expected development or production, got {other}"),
                ));
            }
        };

        let default_mock = parse_bool(&lookup, "JDP_MOCK")?.unwrap_or(false);
        let mut overrides = HashMap::new();
        for area in FeatureArea::ALL {
            let key = format!("JDP_MOCK_{}", area.env_suffix());
            if let Some(value) = parse_bool(&lookup, &key)? {
                overrides.insert(area, value);
            }
        }
        let delay_ms = parse_u64(&lookup, "JDP_MOCK_DELAY_MS")?.unwrap_or(0);
        let mock = MockSettings {
            default: default_mock,
            overrides,
            delay: Duration::from_millis(delay_ms),
        };

        let api_base_url = lookup("JDP_API_BASE_URL")
            .map(|v| parse_http_url("JDP_API_BASE_URL", &v))
            .transpose()?;
        let chart_data_url = lookup("JDP_CHART_DATA_URL")
            .map(|v| parse_http_url("JDP_CHART_DATA_URL", &v))
            .transpose()?;
        let stripe_api_base = lookup("JDP_STRIPE_API_BASE")
            .map(|v| parse_http_url("JDP_STRIPE_API_BASE", &v))
            .transpose()?
            .map_or_else(|| DEFAULT_STRIPE_API_BASE.to_string(), |u| u.as_str().trim_end_matches('/').to_string());

        let request_timeout = parse_u64(&lookup, "JDP_REQUEST_TIMEOUT_SECS")?
            .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs);

        let config = Self {
            environment,
            api_base_url,
            mock,
            storage_dir: lookup("JDP_STORAGE_DIR")
                .map_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR), PathBuf::from),
            request_timeout,
            chart_data_url,
            stripe_api_base,
            sentry_dsn: lookup("SENTRY_DSN").filter(|v| !v.trim().is_empty()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MockInProduction` when a production build has a
    /// mocked area, and `ConfigError::MissingEnvVar` when a real data source
    /// is selected without a base URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environment == Environment::Production
            && let Some(area) = FeatureArea::ALL.into_iter().find(|a| self.mock.is_mocked(*a))
        {
            return Err(ConfigError::MockInProduction(area));
        }

        if self.mock.any_real() && self.api_base_url.is_none() {
            return Err(ConfigError::MissingEnvVar("JDP_API_BASE_URL".to_string()));
        }

        Ok(())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_bool<F>(lookup: &F, key: &str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        other => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("expected a boolean, got {other}"),
        )),
    }
}

fn parse_u64<F>(lookup: &F, key: &str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
        .transpose()
}

fn parse_http_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("URL must use http or https, got {other}"),
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_all_mocked_needs_no_base_url() {
        let config = ClientConfig::from_lookup(lookup_from(&[("JDP_MOCK", "true")])).unwrap();
        assert!(config.api_base_url.is_none());
        assert!(config.mock.is_mocked(FeatureArea::Shop));
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn test_real_area_requires_base_url() {
        let err = ClientConfig::from_lookup(lookup_from(&[
            ("JDP_MOCK", "true"),
            ("JDP_MOCK_NEWS", "false"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "JDP_API_BASE_URL"));
    }

    #[test]
    fn test_per_area_override() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("JDP_API_BASE_URL", "https://api.example.fr"),
            ("JDP_MOCK_CHARTS", "yes"),
        ]))
        .unwrap();
        assert!(config.mock.is_mocked(FeatureArea::Charts));
        assert!(!config.mock.is_mocked(FeatureArea::Auth));
    }

    #[test]
    fn test_mock_in_production_is_rejected() {
        let err = ClientConfig::from_lookup(lookup_from(&[
            ("JDP_ENV", "production"),
            ("JDP_API_BASE_URL", "https://api.example.fr"),
            ("JDP_MOCK_PAYMENTS", "1"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MockInProduction(FeatureArea::Payments)));
    }

    #[test]
    fn test_invalid_values() {
        assert!(ClientConfig::from_lookup(lookup_from(&[("JDP_MOCK", "maybe")])).is_err());
        assert!(
            ClientConfig::from_lookup(lookup_from(&[
                ("JDP_MOCK", "1"),
                ("JDP_API_BASE_URL", "ftp://files.example.fr"),
            ]))
            .is_err()
        );
        assert!(
            ClientConfig::from_lookup(lookup_from(&[
                ("JDP_MOCK", "1"),
                ("JDP_REQUEST_TIMEOUT_SECS", "soon"),
            ]))
            .is_err()
        );
    }

    #[test]
    fn test_custom_timeout_and_delay() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("JDP_MOCK", "on"),
            ("JDP_REQUEST_TIMEOUT_SECS", "5"),
            ("JDP_MOCK_DELAY_MS", "250"),
        ]))
        .unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.mock.delay, Duration::from_millis(250));
    }
}
