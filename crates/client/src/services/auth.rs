//! Authentication service.

use std::time::Duration;

use jdp_core::{Email, ProfileUpdate, User, UserId};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value, json};
use tracing::{debug, instrument};

use super::error::define_service_error;
use super::{addresses, check_rejection, wire};
use crate::http::ApiRequest;
use crate::source::SharedSource;

define_service_error!(
    /// Failure of an authentication call.
    AuthError,
    "auth"
);

/// Token lifetime assumed when the backend omits `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Backend user fields the client is allowed to keep.
///
/// Anything else in a user payload (password hash, remember token, payment
/// customer ids) is dropped before mapping and never reaches storage.
pub const ALLOWED_USER_FIELDS: &[&str] = &[
    "id",
    "userId",
    "email",
    "firstName",
    "firstname",
    "first_name",
    "lastName",
    "lastname",
    "last_name",
    "phone",
    "telephone",
    "birthDate",
    "birthdate",
    "birth_date",
    "addresses",
    "adresses",
    "jdpStar",
    "jdp_star",
    "isVerified",
    "is_verified",
    "emailVerified",
    "acceptsMarketing",
    "accepts_marketing",
    "newsletter",
];

/// A granted bearer token.
#[derive(Debug, Clone)]
pub struct AuthToken {
    pub token: SecretString,
    /// Lifetime from the moment of grant.
    pub expires_in: Duration,
}

/// Registration form.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: SecretString,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub accepts_marketing: bool,
}

/// Authentication endpoints.
#[derive(Clone)]
pub struct AuthService {
    source: SharedSource,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("source", &self.source.label())
            .finish()
    }
}

impl AuthService {
    #[must_use]
    pub fn new(source: SharedSource) -> Self {
        Self { source }
    }

    /// Exchange credentials for a token.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed email or empty password (no call made),
    /// otherwise the classified backend failure.
    #[instrument(skip(self, password), fields(email = %mask(email)))]
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<AuthToken, AuthError> {
        let email = Email::parse(email).map_err(|e| AuthError::validation(e.to_string()))?;
        if password.expose_secret().is_empty() {
            return Err(AuthError::validation("Le mot de passe est requis."));
        }
        let body = self
            .source
            .send(ApiRequest::post("/auth/login").json(json!({
                "email": email.as_str(),
                "password": password.expose_secret(),
            })))
            .await?;
        map_token(&body)
    }

    /// Create an account and return its first token.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed form, `AlreadyExists` when the email is
    /// taken, otherwise the classified backend failure.
    #[instrument(skip(self, registration), fields(email = %mask(&registration.email)))]
    pub async fn register(&self, registration: &Registration) -> Result<AuthToken, AuthError> {
        let email = Email::parse(&registration.email).map_err(|e| AuthError::validation(e.to_string()))?;
        if registration.password.expose_secret().len() < 8 {
            return Err(AuthError::validation(
                "Le mot de passe doit contenir au moins 8 caractères.",
            ));
        }
        let body = self
            .source
            .send(ApiRequest::post("/auth/register").json(json!({
                "email": email.as_str(),
                "password": registration.password.expose_secret(),
                "firstName": registration.first_name,
                "lastName": registration.last_name,
                "acceptsMarketing": registration.accepts_marketing,
            })))
            .await?;
        map_token(&body)
    }

    /// Current user's profile, sanitised.
    ///
    /// # Errors
    ///
    /// `AuthRequired` when the token is missing or rejected.
    #[instrument(skip(self))]
    pub async fn me(&self) -> Result<User, AuthError> {
        let body = self.source.send(ApiRequest::get("/auth/me")).await?;
        check_rejection(&body)?;
        map_user(wire::unwrap(&body, &["data", "user"]))
    }

    /// Invalidate the token server-side.
    ///
    /// # Errors
    ///
    /// Returns the classified backend failure. Callers treat it as
    /// best-effort.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), AuthError> {
        let body = self.source.send(ApiRequest::post("/auth/logout")).await?;
        check_rejection(&body)?;
        Ok(())
    }

    /// Request a password-reset email. Returns the backend's message.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed email, otherwise the classified backend
    /// failure.
    #[instrument(skip(self), fields(email = %mask(email)))]
    pub async fn forgot_password(&self, email: &str) -> Result<String, AuthError> {
        let email = Email::parse(email).map_err(|e| AuthError::validation(e.to_string()))?;
        let body = self
            .source
            .send(ApiRequest::post("/auth/forgot-password").json(json!({ "email": email.as_str() })))
            .await?;
        check_rejection(&body)?;
        Ok(wire::string(&body, &["message"]).unwrap_or_else(|| {
            "Si un compte existe pour cette adresse, un e-mail vient d'être envoyé.".to_string()
        }))
    }

    /// Update profile fields and return the updated user.
    ///
    /// # Errors
    ///
    /// Returns the classified backend failure.
    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, AuthError> {
        let payload = serde_json::to_value(update)
            .map_err(|e| AuthError::validation(format!("Profil invalide: {e}")))?;
        let body = self
            .source
            .send(ApiRequest::put("/auth/me").json(payload))
            .await?;
        check_rejection(&body)?;
        map_user(wire::unwrap(&body, &["data", "user"]))
    }
}

fn mask(email: &str) -> String {
    Email::parse(email).map_or_else(|_| "<invalid>".to_string(), |e| e.masked())
}

fn map_token(body: &Value) -> Result<AuthToken, AuthError> {
    check_rejection(body)?;
    let payload = wire::unwrap(body, &["data"]);
    let token = wire::string(payload, &["access_token", "accessToken", "token"])
        .ok_or_else(|| AuthError::invalid_response("Réponse d'authentification sans jeton."))?;
    let expires_in = wire::count(payload, &["expires_in", "expiresIn"])
        .filter(|secs| *secs > 0)
        .map_or(DEFAULT_TOKEN_LIFETIME, Duration::from_secs);
    debug!(expires_in_secs = expires_in.as_secs(), "Token granted");
    Ok(AuthToken {
        token: SecretString::from(token),
        expires_in,
    })
}

/// Keep only whitelisted fields of a backend user payload.
#[must_use]
pub fn sanitize_user(raw: &Value) -> Value {
    let Some(obj) = raw.as_object() else {
        return Value::Null;
    };
    let kept: Map<String, Value> = obj
        .iter()
        .filter(|(key, _)| ALLOWED_USER_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Value::Object(kept)
}

/// Map a backend user payload (sanitised first).
///
/// # Errors
///
/// `InvalidResponse` when the id or email is missing or unusable.
pub fn map_user(raw: &Value) -> Result<User, AuthError> {
    let user = sanitize_user(raw);
    let id = wire::string(&user, &["id", "userId"])
        .ok_or_else(|| AuthError::invalid_response("Profil sans identifiant."))?;
    let email = wire::string(&user, &["email"])
        .ok_or_else(|| AuthError::invalid_response("Profil sans e-mail."))?;
    let email = Email::parse(&email).map_err(|e| AuthError::invalid_response(e.to_string()))?;

    Ok(User {
        id: UserId::new(id),
        email,
        first_name: wire::string(&user, &["firstName", "firstname", "first_name"]),
        last_name: wire::string(&user, &["lastName", "lastname", "last_name"]),
        phone: wire::string(&user, &["phone", "telephone"]),
        birth_date: wire::date(&user, &["birthDate", "birthdate", "birth_date"]),
        addresses: wire::list(&user, &["addresses", "adresses"])
            .iter()
            .filter_map(addresses::map_address)
            .collect(),
        jdp_star: wire::count_u32(&user, &["jdpStar", "jdp_star"]).unwrap_or(0),
        is_verified: wire::flag(&user, &["isVerified", "is_verified", "emailVerified"]).unwrap_or(false),
        accepts_marketing: wire::flag(&user, &["acceptsMarketing", "accepts_marketing", "newsletter"])
            .unwrap_or(false),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::source::MockSource;
    use jdp_core::ErrorCode;

    fn service() -> AuthService {
        AuthService::new(Arc::new(MockSource::new()))
    }

    #[test]
    fn test_sanitize_drops_credentials() {
        let raw = json!({ "id": 1, "email": "a@b.fr", "password": "hash", "remember_token": "x" });
        let clean = sanitize_user(&raw);
        assert!(clean.get("password").is_none());
        assert!(clean.get("remember_token").is_none());
        assert_eq!(clean["email"], "a@b.fr");
    }

    #[test]
    fn test_map_user_fallback_names() {
        let raw = json!({
            "id": 9,
            "email": "x@y.fr",
            "firstname": "Léa",
            "last_name": "Roux",
            "jdpStar": "4",
            "is_verified": "1",
        });
        let user = map_user(&raw).unwrap();
        assert_eq!(user.first_name.as_deref(), Some("Léa"));
        assert_eq!(user.last_name.as_deref(), Some("Roux"));
        assert_eq!(user.jdp_star, 4);
        assert!(user.is_verified);
        assert!(user.phone.is_none());
    }

    #[test]
    fn test_map_user_requires_email() {
        let err = map_user(&json!({ "id": 1 })).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidResponse);
    }

    #[test]
    fn test_token_defaults_lifetime() {
        let token = map_token(&json!({ "token": "abc" })).unwrap();
        assert_eq!(token.expires_in, DEFAULT_TOKEN_LIFETIME);
        assert_eq!(token.token.expose_secret(), "abc");
    }

    #[tokio::test]
    async fn test_login_validates_before_network() {
        let err = service()
            .login("not-an-email", &SecretString::from("secret123"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);
    }

    #[tokio::test]
    async fn test_login_with_mock() {
        let token = service()
            .login("camille@example.fr", &SecretString::from("secret123"))
            .await
            .unwrap();
        assert_eq!(token.expires_in, Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_login_invalid_credentials() {
        let err = service()
            .login("camille@example.fr", &SecretString::from("bad"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidCredentials);
        assert_eq!(err.status, Some(401));
    }

    #[tokio::test]
    async fn test_register_conflict_reads_nested_error() {
        let err = service()
            .register(&Registration {
                email: "existing@example.fr".to_string(),
                password: SecretString::from("longenough"),
                first_name: None,
                last_name: None,
                accepts_marketing: false,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyExists);
        assert_eq!(err.message, "Un compte existe déjà avec cet e-mail.");
    }

    #[tokio::test]
    async fn test_me_is_sanitised_and_mapped() {
        let user = service().me().await.unwrap();
        assert_eq!(user.email.as_str(), "camille.martin@example.fr");
        assert_eq!(user.first_name.as_deref(), Some("Camille"));
        assert_eq!(user.jdp_star, 12);
        assert_eq!(user.addresses.len(), 2);
        assert_eq!(user.birth_date.unwrap().to_string(), "1984-03-12");
    }

    #[tokio::test]
    async fn test_update_profile_merges() {
        let user = service()
            .update_profile(&ProfileUpdate {
                first_name: Some("Camille-Anne".to_string()),
                ..ProfileUpdate::default()
            })
            .await
            .unwrap();
        assert_eq!(user.first_name.as_deref(), Some("Camille-Anne"));
    }
}
