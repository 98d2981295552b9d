//! Linking an account from the previous platform.
//!
//! A lookup by email tells whether a legacy account exists; linking it with
//! the verification code sent to that address carries its history (and its
//! star counter) over.

use jdp_core::Email;
use serde_json::json;
use tracing::{info, instrument};

use super::error::define_service_error;
use super::{check_rejection, wire};
use crate::http::ApiRequest;
use crate::source::SharedSource;

define_service_error!(LegacyError, "legacy account");

/// Result of a legacy account lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegacyLookup {
    NotFound,
    Found {
        legacy_id: String,
        /// Masked address the verification code was sent to.
        masked_email: Option<String>,
    },
}

/// Result of a successful link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyLink {
    /// Star counter after the merge, when the backend reports it.
    pub jdp_star: Option<u32>,
}

/// Legacy-linking endpoints.
#[derive(Clone)]
pub struct LegacyService {
    source: SharedSource,
}

impl std::fmt::Debug for LegacyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LegacyService")
            .field("source", &self.source.label())
            .finish()
    }
}

impl LegacyService {
    #[must_use]
    pub fn new(source: SharedSource) -> Self {
        Self { source }
    }

    /// Look a legacy account up by email.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed email (no call made).
    #[instrument(skip(self, email))]
    pub async fn lookup(&self, email: &str) -> Result<LegacyLookup, LegacyError> {
        let email = Email::parse(email).map_err(|e| LegacyError::validation(e.to_string()))?;
        let body = self
            .source
            .send(ApiRequest::post("/api/legacy/lookup").json(json!({ "email": email.as_str() })))
            .await?;
        check_rejection(&body)?;
        let payload = wire::unwrap(&body, &["data"]);
        let legacy_id = wire::string(payload, &["legacyId", "legacy_id", "id"]);
        let found = wire::flag(payload, &["found", "exists"]).unwrap_or(legacy_id.is_some());
        Ok(match (found, legacy_id) {
            (true, Some(legacy_id)) => LegacyLookup::Found {
                legacy_id,
                masked_email: wire::string(payload, &["maskedEmail", "masked_email"]),
            },
            _ => LegacyLookup::NotFound,
        })
    }

    /// Link the legacy account using the emailed verification code.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank id or code (no call made), `Rejected` for a
    /// wrong code.
    #[instrument(skip(self, code), fields(legacy_id = %legacy_id))]
    pub async fn link(&self, legacy_id: &str, code: &str) -> Result<LegacyLink, LegacyError> {
        if legacy_id.trim().is_empty() || code.trim().is_empty() {
            return Err(LegacyError::validation("Identifiant et code requis."));
        }
        let body = self
            .source
            .send(ApiRequest::post("/api/legacy/link").json(json!({
                "legacyId": legacy_id.trim(),
                "code": code.trim(),
            })))
            .await?;
        check_rejection(&body)?;
        let link = LegacyLink {
            jdp_star: wire::count_u32(wire::unwrap(&body, &["data"]), &["jdpStar", "jdp_star"]),
        };
        info!(jdp_star = ?link.jdp_star, "Legacy account linked");
        Ok(link)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::source::MockSource;
    use jdp_core::ErrorCode;

    fn service() -> LegacyService {
        LegacyService::new(Arc::new(MockSource::new()))
    }

    #[tokio::test]
    async fn test_lookup_found_and_not_found() {
        let found = service().lookup("camille@ancien-jdp.fr").await.unwrap();
        assert_eq!(
            found,
            LegacyLookup::Found {
                legacy_id: "L-1042".to_string(),
                masked_email: Some("c***@ancien-jdp.fr".to_string()),
            }
        );
        assert_eq!(service().lookup("x@example.fr").await.unwrap(), LegacyLookup::NotFound);
    }

    #[tokio::test]
    async fn test_link_wrong_code_is_rejected() {
        let err = service().link("L-1042", "000000").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Rejected);
        assert_eq!(err.message, "Code de vérification invalide.");
    }

    #[tokio::test]
    async fn test_link_reports_stars() {
        let link = service().link("L-1042", "482913").await.unwrap();
        assert_eq!(link.jdp_star, Some(25));
    }
}
