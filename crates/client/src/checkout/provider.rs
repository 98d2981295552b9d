//! Card confirmation with the payment provider.
//!
//! Confirmation happens client-side: the intent is created by the backend,
//! then confirmed against the provider with the session's publishable key
//! and client secret. The backend is never involved in this step.

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::services::{PaymentIntentKind, PaymentSession};

/// Provider error attached to a confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Raw answer of a confirmation: the intent status and/or an error.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProviderConfirmation {
    pub status: Option<String>,
    pub error: Option<ProviderError>,
}

impl ProviderConfirmation {
    #[must_use]
    pub fn status(status: &str) -> Self {
        Self {
            status: Some(status.to_string()),
            error: None,
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: None,
            error: Some(ProviderError {
                code: None,
                message: Some(message.into()),
            }),
        }
    }
}

/// Client-side card confirmation.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Confirm a payment intent with a card payment method.
    async fn confirm_card_payment(&self, session: &PaymentSession, payment_method: &str) -> ProviderConfirmation;

    /// Confirm a setup intent with a card payment method.
    async fn confirm_card_setup(&self, session: &PaymentSession, payment_method: &str) -> ProviderConfirmation;
}

// =============================================================================
// StripeProvider
// =============================================================================

#[derive(Debug, Deserialize)]
struct IntentBody {
    status: Option<String>,
    #[serde(alias = "last_setup_error")]
    last_payment_error: Option<ProviderError>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ProviderError,
}

/// Stripe's publishable-key confirmation endpoints.
#[derive(Debug, Clone)]
pub struct StripeProvider {
    client: reqwest::Client,
    api_base: String,
}

impl StripeProvider {
    /// `api_base` is `https://api.stripe.com` outside tests.
    #[must_use]
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Confirm against the collection of `expected`; a session of another
    /// kind fails without reaching the provider.
    #[instrument(skip(self, session, payment_method), fields(intent = expected.as_str()))]
    async fn confirm(
        &self,
        expected: PaymentIntentKind,
        session: &PaymentSession,
        payment_method: &str,
    ) -> ProviderConfirmation {
        if session.intent != expected {
            warn!(session = session.intent.as_str(), "Confirmation method does not match the session");
            return ProviderConfirmation::failed("Type de session de paiement inattendu.");
        }
        let Some(intent_id) = session.intent_id() else {
            return ProviderConfirmation::failed("Session de paiement invalide.");
        };
        let collection = match expected {
            PaymentIntentKind::Payment => "payment_intents",
            PaymentIntentKind::Setup => "setup_intents",
        };
        let url = format!("{}/v1/{collection}/{intent_id}/confirm", self.api_base);
        let form = [
            ("client_secret", session.client_secret.expose_secret()),
            ("payment_method", payment_method),
        ];

        let response = match self
            .client
            .post(&url)
            .bearer_auth(&session.publishable_key)
            .form(&form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Provider unreachable");
                return ProviderConfirmation::failed("Le service de paiement est injoignable.");
            }
        };
        let status = response.status();
        match response.text().await {
            Ok(body) => parse_confirmation(status, &body),
            Err(e) => {
                warn!(error = %e, "Failed to read provider response");
                ProviderConfirmation::failed("Réponse du service de paiement illisible.")
            }
        }
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    async fn confirm_card_payment(&self, session: &PaymentSession, payment_method: &str) -> ProviderConfirmation {
        self.confirm(PaymentIntentKind::Payment, session, payment_method).await
    }

    async fn confirm_card_setup(&self, session: &PaymentSession, payment_method: &str) -> ProviderConfirmation {
        self.confirm(PaymentIntentKind::Setup, session, payment_method).await
    }
}

/// Read a confirmation response. Error statuses carry `{ "error": {..} }`,
/// success carries the intent object.
#[must_use]
pub fn parse_confirmation(status: StatusCode, body: &str) -> ProviderConfirmation {
    if !status.is_success() {
        debug!(status = status.as_u16(), "Provider rejected confirmation");
        return match serde_json::from_str::<ErrorBody>(body) {
            Ok(ErrorBody { error }) => ProviderConfirmation {
                status: None,
                error: Some(error),
            },
            Err(_) => ProviderConfirmation::failed(format!("Paiement refusé (HTTP {}).", status.as_u16())),
        };
    }
    match serde_json::from_str::<IntentBody>(body) {
        Ok(intent) => ProviderConfirmation {
            status: intent.status,
            error: intent.last_payment_error,
        },
        Err(e) => {
            warn!(error = %e, "Undecodable provider response");
            ProviderConfirmation::failed("Réponse du service de paiement illisible.")
        }
    }
}

// =============================================================================
// MockProvider
// =============================================================================

/// Answers every confirmation with a fixed result. Used when payments are
/// mocked.
#[derive(Debug, Clone)]
pub struct MockProvider {
    answer: ProviderConfirmation,
}

impl MockProvider {
    #[must_use]
    pub const fn new(answer: ProviderConfirmation) -> Self {
        Self { answer }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new(ProviderConfirmation::status("succeeded"))
    }
}

#[async_trait]
impl PaymentProvider for MockProvider {
    async fn confirm_card_payment(&self, _session: &PaymentSession, _payment_method: &str) -> ProviderConfirmation {
        self.answer.clone()
    }

    async fn confirm_card_setup(&self, _session: &PaymentSession, _payment_method: &str) -> ProviderConfirmation {
        self.answer.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn session(intent: PaymentIntentKind) -> PaymentSession {
        PaymentSession {
            client_secret: SecretString::from("pi_123_secret_abc".to_string()),
            publishable_key: "pk_test_123".to_string(),
            intent,
        }
    }

    #[tokio::test]
    async fn test_mismatched_session_kind_is_refused() {
        // Nothing listens on the discard port; a request would fail differently.
        let provider = StripeProvider::new("http://127.0.0.1:9");

        let out = provider
            .confirm_card_setup(&session(PaymentIntentKind::Payment), "pm_card_visa")
            .await;
        assert_eq!(out, ProviderConfirmation::failed("Type de session de paiement inattendu."));

        let out = provider
            .confirm_card_payment(&session(PaymentIntentKind::Setup), "pm_card_visa")
            .await;
        assert_eq!(out, ProviderConfirmation::failed("Type de session de paiement inattendu."));
    }

    #[test]
    fn test_intent_body_status() {
        let out = parse_confirmation(StatusCode::OK, r#"{"id":"pi_1","status":"requires_action"}"#);
        assert_eq!(out, ProviderConfirmation::status("requires_action"));
    }

    #[test]
    fn test_error_body_message() {
        let out = parse_confirmation(
            StatusCode::PAYMENT_REQUIRED,
            r#"{"error":{"code":"card_declined","message":"Your card was declined."}}"#,
        );
        let error = out.error.unwrap();
        assert_eq!(error.code.as_deref(), Some("card_declined"));
        assert_eq!(error.message.as_deref(), Some("Your card was declined."));
        assert!(out.status.is_none());
    }

    #[test]
    fn test_setup_error_alias() {
        let out = parse_confirmation(
            StatusCode::OK,
            r#"{"status":"requires_payment_method","last_setup_error":{"message":"Carte expirée."}}"#,
        );
        assert_eq!(out.status.as_deref(), Some("requires_payment_method"));
        assert_eq!(out.error.unwrap().message.as_deref(), Some("Carte expirée."));
    }

    #[test]
    fn test_unreadable_error_names_status() {
        let out = parse_confirmation(StatusCode::BAD_GATEWAY, "<html>");
        assert!(out.error.unwrap().message.unwrap().contains("502"));
    }
}
