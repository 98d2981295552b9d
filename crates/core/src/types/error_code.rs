//! Machine-readable error codes shared by every service error.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Classification of a failed operation.
///
/// Transport-level codes come from the HTTP layer, domain-level codes from
/// the backend's response, and `Validation` from checks performed before any
/// network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Transport
    Network,
    Timeout,
    Cancelled,
    HttpStatus,
    InvalidResponse,
    // Domain
    InvalidCredentials,
    NotFound,
    AlreadyExists,
    BasketExpired,
    AuthRequired,
    Rejected,
    // Local
    Validation,
    Unknown,
}

impl ErrorCode {
    /// Stable snake_case form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::HttpStatus => "http_status",
            Self::InvalidResponse => "invalid_response",
            Self::InvalidCredentials => "invalid_credentials",
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::BasketExpired => "basket_expired",
            Self::AuthRequired => "auth_required",
            Self::Rejected => "rejected",
            Self::Validation => "validation",
            Self::Unknown => "unknown",
        }
    }

    /// Map an HTTP status to the closest code.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::Validation,
            401 => Self::AuthRequired,
            403 => Self::InvalidCredentials,
            404 => Self::NotFound,
            409 => Self::AlreadyExists,
            410 => Self::BasketExpired,
            408 | 504 => Self::Timeout,
            _ => Self::HttpStatus,
        }
    }

    /// Map a backend-supplied code string (`"ALREADY_EXISTS"`, `"basket-expired"`).
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        let code = match normalized.as_str() {
            "invalid_credentials" | "bad_credentials" | "wrong_password" => Self::InvalidCredentials,
            "not_found" | "unknown_reference" => Self::NotFound,
            "already_exists" | "already_in_basket" | "email_taken" => Self::AlreadyExists,
            "basket_expired" | "session_expired" => Self::BasketExpired,
            "auth_required" | "unauthenticated" | "unauthorized" => Self::AuthRequired,
            "validation" | "invalid_input" => Self::Validation,
            "rejected" => Self::Rejected,
            _ => return None,
        };
        Some(code)
    }

    /// Whether retrying the same call may succeed.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::HttpStatus)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert_eq!(ErrorCode::from_status(401), ErrorCode::AuthRequired);
        assert_eq!(ErrorCode::from_status(409), ErrorCode::AlreadyExists);
        assert_eq!(ErrorCode::from_status(500), ErrorCode::HttpStatus);
    }

    #[test]
    fn test_from_wire() {
        assert_eq!(ErrorCode::from_wire("ALREADY_EXISTS"), Some(ErrorCode::AlreadyExists));
        assert_eq!(ErrorCode::from_wire("basket-expired"), Some(ErrorCode::BasketExpired));
        assert_eq!(ErrorCode::from_wire("teapot"), None);
    }

    #[test]
    fn test_display_matches_serde() {
        let json = serde_json::to_string(&ErrorCode::InvalidResponse).unwrap_or_default();
        assert_eq!(json, format!("\"{}\"", ErrorCode::InvalidResponse));
    }
}
