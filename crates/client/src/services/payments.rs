//! Payment session initialisation.
//!
//! Two backend calls return the same shape but mean different things:
//! `/initPayment` creates a payment intent (the card is charged on
//! confirmation) while `/oneClickInitPayment` creates a setup intent (the
//! card is only authorised for future recurring charges). The session
//! remembers which one it is so confirmation can use the matching method.

use jdp_core::BasketCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::instrument;

use super::error::define_service_error;
use super::{check_rejection, wire};
use crate::http::ApiRequest;
use crate::source::SharedSource;

define_service_error!(PaymentError, "payment");

/// Kind of provider intent behind a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentIntentKind {
    /// Immediate charge.
    Payment,
    /// Future recurring charges, nothing charged now.
    Setup,
}

impl PaymentIntentKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Payment => "payment_intent",
            Self::Setup => "setup_intent",
        }
    }
}

/// Credentials needed to confirm a payment with the provider.
#[derive(Debug, Clone)]
pub struct PaymentSession {
    pub client_secret: SecretString,
    pub publishable_key: String,
    pub intent: PaymentIntentKind,
}

impl PaymentSession {
    /// Intent id (`pi_...` / `seti_...`): the client secret up to `_secret_`.
    #[must_use]
    pub fn intent_id(&self) -> Option<String> {
        self.client_secret
            .expose_secret()
            .split_once("_secret_")
            .map(|(id, _)| id.to_string())
            .filter(|id| !id.is_empty())
    }
}

/// Payment endpoints.
#[derive(Clone)]
pub struct PaymentService {
    source: SharedSource,
}

impl std::fmt::Debug for PaymentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentService")
            .field("source", &self.source.label())
            .finish()
    }
}

impl PaymentService {
    #[must_use]
    pub fn new(source: SharedSource) -> Self {
        Self { source }
    }

    /// Create a payment intent for a shop basket.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty basket code (no call made), otherwise the
    /// classified backend failure.
    #[instrument(skip(self), fields(basket_code = %basket_code))]
    pub async fn init_payment(&self, basket_code: &BasketCode) -> Result<PaymentSession, PaymentError> {
        self.init("/initPayment", basket_code, PaymentIntentKind::Payment)
            .await
    }

    /// Create a setup intent for a one-click basket.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty basket code (no call made), otherwise the
    /// classified backend failure.
    #[instrument(skip(self), fields(basket_code = %basket_code))]
    pub async fn init_oneclick_payment(&self, basket_code: &BasketCode) -> Result<PaymentSession, PaymentError> {
        self.init("/oneClickInitPayment", basket_code, PaymentIntentKind::Setup)
            .await
    }

    async fn init(
        &self,
        path: &str,
        basket_code: &BasketCode,
        intent: PaymentIntentKind,
    ) -> Result<PaymentSession, PaymentError> {
        if basket_code.is_empty() {
            return Err(PaymentError::validation("Code panier manquant."));
        }
        let body = self
            .source
            .send(ApiRequest::post(path).json(json!({ "basketCode": basket_code.as_str() })))
            .await?;
        map_session(&body, intent)
    }
}

fn map_session(body: &Value, intent: PaymentIntentKind) -> Result<PaymentSession, PaymentError> {
    check_rejection(body)?;
    let payload = wire::unwrap(body, &["data"]);
    let client_secret = wire::string(payload, &["clientSecret", "client_secret"])
        .ok_or_else(|| PaymentError::invalid_response("Réponse de paiement sans client secret."))?;
    let publishable_key = wire::string(payload, &["publishableKey", "publishable_key", "stripeKey"])
        .ok_or_else(|| PaymentError::invalid_response("Réponse de paiement sans clé publique."))?;
    Ok(PaymentSession {
        client_secret: SecretString::from(client_secret),
        publishable_key,
        intent,
    })
}
