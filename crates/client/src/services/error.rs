//! Shared service error machinery.

use jdp_core::ErrorCode;
use serde_json::Value;

/// A domain rejection embedded in a successful (2xx) response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub code: ErrorCode,
    pub message: String,
}

const DEFAULT_REJECTION: &str = "La demande a été refusée par le serveur.";

/// Detect `{"success": false}`, `{"status": "error"}` or an `error` member
/// (flat string or nested object) in a 2xx body.
///
/// # Errors
///
/// Returns the rejection when the body signals one.
pub fn check_rejection(body: &Value) -> Result<(), Rejection> {
    let Some(obj) = body.as_object() else {
        return Ok(());
    };

    let failed_flag = obj.get("success").is_some_and(|v| match v {
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_i64() == Some(0),
        Value::String(s) => s.eq_ignore_ascii_case("false"),
        _ => false,
    });
    let failed_status = obj
        .get("status")
        .and_then(Value::as_str)
        .is_some_and(|s| s.eq_ignore_ascii_case("error") || s.eq_ignore_ascii_case("fail"));
    let error = obj.get("error").filter(|e| match e {
        Value::Object(_) => true,
        Value::String(s) => !s.trim().is_empty(),
        _ => false,
    });

    if !failed_flag && !failed_status && error.is_none() {
        return Ok(());
    }

    let nested = error.filter(|e| e.is_object());
    let code = nested
        .and_then(|e| e.get("code"))
        .or_else(|| obj.get("code"))
        .and_then(Value::as_str)
        .and_then(ErrorCode::from_wire)
        .unwrap_or(ErrorCode::Rejected);
    let message = nested
        .and_then(|e| e.get("message"))
        .or_else(|| obj.get("message"))
        .or_else(|| error.filter(|e| e.is_string()))
        .or_else(|| obj.get("msg"))
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(DEFAULT_REJECTION)
        .to_string();

    Err(Rejection { code, message })
}

/// Common surface of every service error.
pub trait ServiceError: std::error::Error + Clone + Send + Sync + 'static {
    /// Machine-readable classification.
    fn code(&self) -> ErrorCode;

    /// Human-readable message.
    fn message(&self) -> &str;

    /// Whether the request was superseded rather than failed.
    fn is_superseded(&self) -> bool {
        self.code() == ErrorCode::Cancelled
    }
}

/// Define a service error type.
///
/// Every service error carries an [`ErrorCode`], the HTTP status when there
/// was one and a message fit for display. Transport errors and body
/// rejections convert into it with `?`.
macro_rules! define_service_error {
    ($(#[$meta:meta])* $name:ident, $service:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        #[error("{service} error ({code}): {message}", service = $service)]
        pub struct $name {
            /// Machine-readable classification.
            pub code: ::jdp_core::ErrorCode,
            /// HTTP status, when the failure carried one.
            pub status: Option<u16>,
            /// Human-readable message.
            pub message: String,
        }

        impl $name {
            /// Build an error without HTTP status.
            #[must_use]
            pub fn new(code: ::jdp_core::ErrorCode, message: impl Into<String>) -> Self {
                Self {
                    code,
                    status: None,
                    message: message.into(),
                }
            }

            /// Input rejected locally, before any network call.
            #[must_use]
            pub fn validation(message: impl Into<String>) -> Self {
                Self::new(::jdp_core::ErrorCode::Validation, message)
            }

            /// A 2xx body that could not be mapped.
            #[must_use]
            pub fn invalid_response(message: impl Into<String>) -> Self {
                Self::new(::jdp_core::ErrorCode::InvalidResponse, message)
            }

            /// Whether the request was superseded rather than failed.
            #[must_use]
            pub const fn is_cancelled(&self) -> bool {
                matches!(self.code, ::jdp_core::ErrorCode::Cancelled)
            }
        }

        impl $crate::services::ServiceError for $name {
            fn code(&self) -> ::jdp_core::ErrorCode {
                self.code
            }

            fn message(&self) -> &str {
                &self.message
            }
        }

        impl From<$crate::http::HttpError> for $name {
            fn from(e: $crate::http::HttpError) -> Self {
                Self {
                    code: e.code(),
                    status: e.status(),
                    message: e.message(),
                }
            }
        }

        impl From<$crate::services::Rejection> for $name {
            fn from(r: $crate::services::Rejection) -> Self {
                Self::new(r.code, r.message)
            }
        }
    };
}

pub(crate) use define_service_error;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::http::HttpError;
    use serde_json::json;

    define_service_error!(SampleError, "sample");

    #[test]
    fn test_plain_body_is_not_a_rejection() {
        assert!(check_rejection(&json!({ "plans": [] })).is_ok());
        assert!(check_rejection(&json!({ "success": true, "error": null })).is_ok());
        assert!(check_rejection(&json!([1, 2])).is_ok());
    }

    #[test]
    fn test_flat_rejection() {
        let r = check_rejection(&json!({ "success": false, "message": "Code invalide" })).unwrap_err();
        assert_eq!(r.code, ErrorCode::Rejected);
        assert_eq!(r.message, "Code invalide");
    }

    #[test]
    fn test_nested_rejection_with_known_code() {
        let body = json!({ "error": { "code": "basket_expired", "message": "Panier expiré" } });
        let r = check_rejection(&body).unwrap_err();
        assert_eq!(r.code, ErrorCode::BasketExpired);
        assert_eq!(r.message, "Panier expiré");
    }

    #[test]
    fn test_string_error_member() {
        let r = check_rejection(&json!({ "error": "Quota dépassé" })).unwrap_err();
        assert_eq!(r.message, "Quota dépassé");
    }

    #[test]
    fn test_service_error_from_http() {
        let err: SampleError = HttpError::Status {
            status: 410,
            body: String::new(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::BasketExpired);
        assert_eq!(err.status, Some(410));
        assert!(!err.is_cancelled());
        assert!(SampleError::from(HttpError::Cancelled).is_cancelled());
    }
}
