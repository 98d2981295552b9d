//! Authentication session.
//!
//! The session is three persisted keys: the raw bearer token, its absolute
//! expiry and the sanitised user. They are always cleared together. The
//! HTTP layer reads the token on every request and clears the keys on a 401;
//! this store owns every other write.
//!
//! A persisted token only counts once the backend has vouched for it, by
//! issuing it at login or by answering the profile call in
//! [`AuthStore::initialize`].

use std::sync::{Arc, PoisonError, RwLock};

use jdp_core::{ProfileUpdate, User};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, instrument, warn};

use super::resource::LoadState;
use crate::clock::{SharedClock, duration_millis};
use crate::services::{AuthError, AuthService, AuthToken, Registration};
use crate::storage::{KeyValueStore, KeyValueStoreExt, keys};

/// The authentication session. Clones share state.
#[derive(Clone)]
pub struct AuthStore {
    inner: Arc<AuthStoreInner>,
}

struct AuthStoreInner {
    service: AuthService,
    storage: Arc<dyn KeyValueStore>,
    clock: SharedClock,
    state: RwLock<AuthSnapshot>,
}

#[derive(Default)]
struct AuthSnapshot {
    user: Option<User>,
    status: LoadState<AuthError>,
    validated: bool,
}

impl std::fmt::Debug for AuthStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthStore")
            .field("authenticated", &self.is_authenticated())
            .field("user", &self.user().map(|u| u.email.masked()))
            .finish_non_exhaustive()
    }
}

impl AuthStore {
    #[must_use]
    pub fn new(service: AuthService, storage: Arc<dyn KeyValueStore>, clock: SharedClock) -> Self {
        Self {
            inner: Arc::new(AuthStoreInner {
                service,
                storage,
                clock,
                state: RwLock::new(AuthSnapshot::default()),
            }),
        }
    }

    /// Restore the session at startup.
    ///
    /// A persisted, unexpired token is validated by fetching the profile;
    /// any failure clears the session. An expired token is cleared without
    /// a call.
    ///
    /// # Errors
    ///
    /// Returns the validation failure after clearing the session.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<(), AuthError> {
        if self.token().is_none() {
            debug!("No persisted session");
            self.clear_local();
            return Ok(());
        }
        if self.token_expired() {
            info!("Persisted token expired, clearing session");
            self.clear_session();
            return Ok(());
        }

        // Show the persisted profile while it is being validated.
        let persisted: Option<User> = self.inner.storage.get_json(keys::AUTH_USER);
        {
            let mut state = self.write();
            state.user = persisted;
            state.status = LoadState::Loading;
            state.validated = false;
        }

        match self.inner.service.me().await {
            Ok(user) => {
                self.set_user(user);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Session validation failed, clearing session");
                self.clear_session();
                self.write().status = LoadState::Failed(e.clone());
                Err(e)
            }
        }
    }

    /// Log in and load the profile.
    ///
    /// # Errors
    ///
    /// Returns the login failure. A failed profile fetch afterwards keeps
    /// the token and is only recorded in [`AuthStore::status`].
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<(), AuthError> {
        self.write().status = LoadState::Loading;
        let token = self.inner.service.login(email, password).await;
        self.start_session(token).await
    }

    /// Create an account and load its profile.
    ///
    /// # Errors
    ///
    /// Returns the registration failure; see [`AuthStore::login`].
    #[instrument(skip(self, registration))]
    pub async fn register(&self, registration: &Registration) -> Result<(), AuthError> {
        self.write().status = LoadState::Loading;
        let token = self.inner.service.register(registration).await;
        self.start_session(token).await
    }

    /// Re-fetch the profile. Failure ends the session.
    ///
    /// # Errors
    ///
    /// Returns the fetch failure after clearing the session.
    #[instrument(skip(self))]
    pub async fn refresh_profile(&self) -> Result<User, AuthError> {
        self.write().status = LoadState::Loading;
        match self.inner.service.me().await {
            Ok(user) => {
                self.set_user(user.clone());
                Ok(user)
            }
            Err(e) => {
                warn!(error = %e, "Profile refresh failed, clearing session");
                self.clear_session();
                self.write().status = LoadState::Failed(e.clone());
                Err(e)
            }
        }
    }

    /// End the session. The backend call is best-effort; local state is
    /// always cleared.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        if let Err(e) = self.inner.service.logout().await {
            warn!(error = %e, "Backend logout failed, clearing local session anyway");
        }
        self.clear_session();
        info!("Logged out");
    }

    /// Update profile fields and keep the returned user.
    ///
    /// # Errors
    ///
    /// Returns the service failure; the current user is kept.
    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, AuthError> {
        let user = self.inner.service.update_profile(update).await?;
        self.set_user(user.clone());
        Ok(user)
    }

    /// Request a password-reset email; returns the message to show.
    ///
    /// # Errors
    ///
    /// Returns the service failure.
    pub async fn forgot_password(&self, email: &str) -> Result<String, AuthError> {
        self.inner.service.forgot_password(email).await
    }

    /// Whether a validated, unexpired token is persisted.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.read().validated && self.token().is_some() && !self.token_expired()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.read().user.clone()
    }

    #[must_use]
    pub fn status(&self) -> LoadState<AuthError> {
        self.read().status.clone()
    }

    /// Unix milliseconds at which the token expires.
    #[must_use]
    pub fn token_expires_at(&self) -> Option<i64> {
        self.inner.storage.get_json(keys::AUTH_TOKEN_EXPIRES_AT)
    }

    async fn start_session(&self, token: Result<AuthToken, AuthError>) -> Result<(), AuthError> {
        let token = match token {
            Ok(token) => token,
            Err(e) => {
                self.write().status = LoadState::Failed(e.clone());
                return Err(e);
            }
        };
        self.persist_token(&token);
        self.write().validated = true;

        match self.inner.service.me().await {
            Ok(user) => {
                info!(user_id = %user.id, "Session started");
                self.set_user(user);
            }
            Err(e) => {
                warn!(error = %e, "Profile fetch after login failed, keeping token");
                self.write().status = LoadState::Failed(e);
            }
        }
        Ok(())
    }

    fn persist_token(&self, token: &AuthToken) {
        let expires_at = self.inner.clock.now_millis() + duration_millis(token.expires_in);
        let storage = &self.inner.storage;
        if let Err(e) = storage.set(keys::AUTH_TOKEN, token.token.expose_secret()) {
            warn!(error = %e, "Failed to persist token");
        }
        if let Err(e) = storage.set_json(keys::AUTH_TOKEN_EXPIRES_AT, &expires_at) {
            warn!(error = %e, "Failed to persist token expiry");
        }
    }

    fn set_user(&self, user: User) {
        if let Err(e) = self.inner.storage.set_json(keys::AUTH_USER, &user) {
            warn!(error = %e, "Failed to persist user");
        }
        let mut state = self.write();
        state.user = Some(user);
        state.status = LoadState::Ready;
        state.validated = true;
    }

    fn token(&self) -> Option<String> {
        self.inner
            .storage
            .get(keys::AUTH_TOKEN)
            .ok()
            .flatten()
            .filter(|t| !t.trim().is_empty())
    }

    fn token_expired(&self) -> bool {
        self.token_expires_at()
            .is_some_and(|at| self.inner.clock.now_millis() >= at)
    }

    fn clear_session(&self) {
        for key in keys::AUTH_KEYS {
            self.inner.storage.remove_logged(key);
        }
        self.clear_local();
    }

    fn clear_local(&self) {
        *self.write() = AuthSnapshot::default();
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, AuthSnapshot> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, AuthSnapshot> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use jdp_core::ErrorCode;

    use super::*;
    use crate::clock::ManualClock;
    use crate::source::{MockSource, SharedSource};
    use crate::storage::MemoryStore;
    use crate::stores::testing::ScriptedSource;

    fn store_with(source: SharedSource, storage: Arc<MemoryStore>, clock: &ManualClock) -> AuthStore {
        AuthStore::new(AuthService::new(source), storage, Arc::new(clock.clone()))
    }

    fn password(p: &str) -> SecretString {
        SecretString::from(p.to_string())
    }

    #[tokio::test]
    async fn test_login_persists_session() {
        let storage = Arc::new(MemoryStore::new());
        let clock = ManualClock::at(1_000);
        let store = store_with(Arc::new(MockSource::new()), storage.clone(), &clock);

        store.login("camille@example.fr", &password("motdepasse")).await.unwrap();
        assert!(store.is_authenticated());
        assert_eq!(store.token_expires_at(), Some(1_000 + 3_600_000));
        assert_eq!(storage.get(keys::AUTH_TOKEN).unwrap().as_deref(), Some("mock.camille_example_fr"));
        assert_eq!(store.status(), LoadState::Ready);

        let persisted = storage.get(keys::AUTH_USER).unwrap().unwrap();
        assert!(persisted.contains("Camille"));
        assert!(!persisted.contains("remember_token"));
        assert!(!persisted.contains("password"));
    }

    #[tokio::test]
    async fn test_bad_credentials_leave_session_empty() {
        let storage = Arc::new(MemoryStore::new());
        let store = store_with(Arc::new(MockSource::new()), storage.clone(), &ManualClock::at(0));
        let err = store.login("camille@example.fr", &password("abc")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidCredentials);
        assert!(!store.is_authenticated());
        assert!(!storage.contains(keys::AUTH_TOKEN));
    }

    #[tokio::test]
    async fn test_failed_profile_fetch_after_login_keeps_token() {
        let storage = Arc::new(MemoryStore::new());
        let source = Arc::new(ScriptedSource::new().failing("/auth/me", 500));
        let store = store_with(source, storage.clone(), &ManualClock::at(0));

        store.login("camille@example.fr", &password("motdepasse")).await.unwrap();
        assert!(store.is_authenticated());
        assert!(store.user().is_none());
        assert!(matches!(store.status(), LoadState::Failed(e) if e.code == ErrorCode::HttpStatus));
    }

    #[tokio::test]
    async fn test_initialize_validation_failure_clears_session() {
        let storage = Arc::new(MemoryStore::new());
        storage.set(keys::AUTH_TOKEN, "stale-token").unwrap();
        storage.set_json(keys::AUTH_TOKEN_EXPIRES_AT, &i64::MAX).unwrap();
        storage.set(keys::AUTH_USER, r#"{"id":"1"}"#).unwrap();
        let source = Arc::new(ScriptedSource::new().failing("/auth/me", 401));
        let store = store_with(source, storage.clone(), &ManualClock::at(0));

        let err = store.initialize().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthRequired);
        for key in keys::AUTH_KEYS {
            assert!(!storage.contains(key), "{key} should be cleared");
        }
        assert!(!store.is_authenticated());
        assert!(store.user().is_none());
    }

    #[tokio::test]
    async fn test_persisted_token_counts_only_after_validation() {
        let storage = Arc::new(MemoryStore::new());
        storage.set(keys::AUTH_TOKEN, "mock.camille").unwrap();
        storage.set_json(keys::AUTH_TOKEN_EXPIRES_AT, &i64::MAX).unwrap();
        storage.set(keys::AUTH_USER, r#"{"id":"1"}"#).unwrap();
        let store = store_with(Arc::new(MockSource::new()), storage, &ManualClock::at(0));

        assert!(!store.is_authenticated());

        store.initialize().await.unwrap();
        assert!(store.is_authenticated());
    }

    #[tokio::test]
    async fn test_initialize_expired_token_clears_without_call() {
        let storage = Arc::new(MemoryStore::new());
        storage.set(keys::AUTH_TOKEN, "old").unwrap();
        storage.set_json(keys::AUTH_TOKEN_EXPIRES_AT, &500_i64).unwrap();
        let source = Arc::new(ScriptedSource::new());
        let store = store_with(source.clone(), storage.clone(), &ManualClock::at(1_000));

        store.initialize().await.unwrap();
        assert_eq!(source.calls(), 0);
        assert!(!storage.contains(keys::AUTH_TOKEN));
    }

    #[tokio::test]
    async fn test_initialize_valid_token_loads_user() {
        let storage = Arc::new(MemoryStore::new());
        storage.set(keys::AUTH_TOKEN, "mock.camille").unwrap();
        let clock = ManualClock::at(0);
        let store = store_with(Arc::new(MockSource::new()), storage, &clock);
        store.initialize().await.unwrap();
        assert_eq!(store.user().unwrap().jdp_star, 12);

        clock.advance(Duration::from_secs(1));
        assert!(store.is_authenticated());
    }

    #[tokio::test]
    async fn test_refresh_failure_clears_session() {
        let storage = Arc::new(MemoryStore::new());
        storage.set(keys::AUTH_TOKEN, "t").unwrap();
        let source = Arc::new(ScriptedSource::new().failing("/auth/me", 503));
        let store = store_with(source, storage.clone(), &ManualClock::at(0));
        assert!(store.refresh_profile().await.is_err());
        assert!(!storage.contains(keys::AUTH_TOKEN));
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_backend_fails() {
        let storage = Arc::new(MemoryStore::new());
        let source = Arc::new(ScriptedSource::new().failing("/auth/logout", 500));
        let store = store_with(source, storage.clone(), &ManualClock::at(0));
        store.login("camille@example.fr", &password("motdepasse")).await.unwrap();

        store.logout().await;
        assert!(!store.is_authenticated());
        assert!(store.user().is_none());
        for key in keys::AUTH_KEYS {
            assert!(!storage.contains(key));
        }
    }

    #[tokio::test]
    async fn test_update_profile_persists_user() {
        let storage = Arc::new(MemoryStore::new());
        let store = store_with(Arc::new(MockSource::new()), storage.clone(), &ManualClock::at(0));
        store.login("camille@example.fr", &password("motdepasse")).await.unwrap();
        let update = ProfileUpdate {
            phone: Some("0612345678".into()),
            ..ProfileUpdate::default()
        };
        let user = store.update_profile(&update).await.unwrap();
        assert_eq!(user.phone.as_deref(), Some("0612345678"));
        assert!(storage.get(keys::AUTH_USER).unwrap().unwrap().contains("0612345678"));
    }
}
