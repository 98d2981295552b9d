//! Navigation guards.
//!
//! Route access is decided from two flags and the session state. The
//! return path carried to the login page is sanitised so it can never be
//! turned into an open redirect or a script URL.

/// Login page.
pub const LOGIN_ROUTE: &str = "/connexion";

/// Where authenticated users are sent from guest-only pages.
pub const HOME_ROUTE: &str = "/";

const BLOCKED_SCHEMES: [&str; 4] = ["data:", "javascript:", "vbscript:", "file:"];

/// Access flags of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouteMeta {
    pub requires_auth: bool,
    pub guest_only: bool,
}

impl RouteMeta {
    pub const PUBLIC: Self = Self {
        requires_auth: false,
        guest_only: false,
    };

    pub const PROTECTED: Self = Self {
        requires_auth: true,
        guest_only: false,
    };

    pub const GUEST_ONLY: Self = Self {
        requires_auth: false,
        guest_only: true,
    };
}

/// Guard decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Proceed,
    Redirect {
        to: String,
        /// Sanitised path to come back to after logging in.
        return_to: Option<String>,
    },
}

/// Decide whether navigation to `target` may proceed.
#[must_use]
pub fn guard(target: &str, meta: RouteMeta, is_authenticated: bool) -> Navigation {
    if meta.requires_auth && !is_authenticated {
        tracing::debug!(target_path = %target, "Protected route, redirecting to login");
        return Navigation::Redirect {
            to: LOGIN_ROUTE.to_string(),
            return_to: Some(sanitize_return_path(Some(target), HOME_ROUTE)),
        };
    }
    if meta.guest_only && is_authenticated {
        return Navigation::Redirect {
            to: HOME_ROUTE.to_string(),
            return_to: None,
        };
    }
    Navigation::Proceed
}

/// `candidate` when it is a safe same-site path, `fallback` otherwise.
///
/// A safe path starts with exactly one `/`, contains no backslash or
/// control character, and does not carry a script or data scheme.
#[must_use]
pub fn sanitize_return_path(candidate: Option<&str>, fallback: &str) -> String {
    match candidate.map(str::trim) {
        Some(path) if is_safe_path(path) => path.to_string(),
        _ => fallback.to_string(),
    }
}

fn is_safe_path(path: &str) -> bool {
    if !path.starts_with('/') || path.starts_with("//") {
        return false;
    }
    // Browsers treat `/\host` like `//host`.
    if path.contains('\\') || path.chars().any(char::is_control) {
        return false;
    }
    let lowered = path.to_ascii_lowercase();
    let rest = lowered.trim_start_matches('/').trim_start();
    !BLOCKED_SCHEMES.iter().any(|scheme| rest.starts_with(scheme))
}
