//! Application state container.
//!
//! Built once from a [`ClientConfig`]: storage, the API client, one data
//! source per feature area, every service and every store. Nothing in the
//! crate reaches for a global; whatever needs a service or a store gets it
//! from here.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::checkout::{
    Checkout, CheckoutKind, CheckoutStores, MockProvider, PaymentProvider, StripeProvider,
};
use crate::clock::{SharedClock, SystemClock};
use crate::config::{ClientConfig, ConfigError, FeatureArea};
use crate::http::ApiClient;
use crate::services::{
    AddressService, AuthService, BookmarkService, CartService, ChartLibrary, ChartService,
    ConsultationService, LegacyService, NewsService, OrderService, PaymentService, ShopService,
    SubscriptionService, UserSubscriptionService,
};
use crate::source::{HttpSource, MockSource, SharedSource};
use crate::storage::{FileStore, KeyValueStore, StorageError};
use crate::stores::{
    AddressStore, AuthStore, BookmarkStore, CartStore, ConsultationsStore, NewsStore, Notifications,
    OneClickStore, OrderStore, ShopStore, SubscriptionCatalogStore, UserSubscriptionStore,
};

/// Error building the application state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to open storage: {0}")]
    Storage(#[from] StorageError),
}

/// Every domain service, built once.
#[derive(Debug, Clone)]
pub struct Services {
    pub auth: Arc<AuthService>,
    pub cart: Arc<CartService>,
    pub shop: Arc<ShopService>,
    pub subscriptions: Arc<SubscriptionService>,
    pub user_subscription: Arc<UserSubscriptionService>,
    pub payments: Arc<PaymentService>,
    pub orders: Arc<OrderService>,
    pub addresses: Arc<AddressService>,
    pub consultations: Arc<ConsultationService>,
    pub news: Arc<NewsService>,
    pub bookmarks: Arc<BookmarkService>,
    pub legacy: Arc<LegacyService>,
    pub charts: Arc<ChartService>,
}

#[derive(Debug)]
struct Stores {
    auth: AuthStore,
    cart: CartStore,
    oneclick: OneClickStore,
    shop: ShopStore,
    subscription_catalog: SubscriptionCatalogStore,
    user_subscription: UserSubscriptionStore,
    consultations: ConsultationsStore,
    news: NewsStore,
    bookmarks: BookmarkStore,
    addresses: AddressStore,
    orders: OrderStore,
}

/// Application state shared by every consumer.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ClientConfig,
    storage: Arc<dyn KeyValueStore>,
    api: Option<ApiClient>,
    services: Services,
    stores: Stores,
    notifications: Notifications,
    provider: Arc<dyn PaymentProvider>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("environment", &self.inner.config.environment)
            .field("api", &self.inner.api.as_ref().map(ApiClient::base_url))
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Build the state on the system clock with file-backed storage.
    ///
    /// # Errors
    ///
    /// Returns `StateError` if the configuration is invalid or the storage
    /// directory cannot be opened.
    pub fn new(config: ClientConfig) -> Result<Self, StateError> {
        let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.storage_dir)?);
        Self::with_parts(config, storage, Arc::new(SystemClock))
    }

    /// Build the state on explicit storage and clock.
    ///
    /// # Errors
    ///
    /// Returns `StateError::Config` if the configuration is invalid.
    pub fn with_parts(
        config: ClientConfig,
        storage: Arc<dyn KeyValueStore>,
        clock: SharedClock,
    ) -> Result<Self, StateError> {
        config.validate()?;

        let api = config.api_base_url.clone().map(|base| {
            ApiClient::new(base, storage.clone(), config.request_timeout).with_clock(clock.clone())
        });
        let source_for = |area: FeatureArea| -> SharedSource {
            match &api {
                Some(client) if !config.mock.is_mocked(area) => Arc::new(HttpSource::new(client.clone())),
                _ => Arc::new(MockSource::with_delay(config.mock.delay)),
            }
        };

        let timeout = config.request_timeout;
        let account = source_for(FeatureArea::Account);
        let services = Services {
            auth: Arc::new(AuthService::new(source_for(FeatureArea::Auth))),
            cart: Arc::new(CartService::new(source_for(FeatureArea::Cart))),
            shop: Arc::new(ShopService::new(source_for(FeatureArea::Shop), timeout)),
            subscriptions: Arc::new(SubscriptionService::new(source_for(FeatureArea::Subscriptions))),
            user_subscription: Arc::new(UserSubscriptionService::new(account.clone())),
            payments: Arc::new(PaymentService::new(source_for(FeatureArea::Payments))),
            orders: Arc::new(OrderService::new(account.clone())),
            addresses: Arc::new(AddressService::new(account.clone())),
            consultations: Arc::new(ConsultationService::new(source_for(FeatureArea::Consultations), timeout)),
            news: Arc::new(NewsService::new(source_for(FeatureArea::News), timeout)),
            bookmarks: Arc::new(BookmarkService::new(source_for(FeatureArea::Bookmarks))),
            legacy: Arc::new(LegacyService::new(account)),
            charts: Arc::new(ChartService::new(Arc::new(ChartLibrary::new(chart_source(
                &config,
                &storage,
            ))))),
        };

        let provider: Arc<dyn PaymentProvider> = if config.mock.is_mocked(FeatureArea::Payments) {
            Arc::new(MockProvider::default())
        } else {
            Arc::new(StripeProvider::new(config.stripe_api_base.clone()))
        };

        let notifications = Notifications::new();
        let stores = Stores {
            auth: AuthStore::new((*services.auth).clone(), storage.clone(), clock.clone()),
            cart: CartStore::new(storage.clone(), clock.clone(), (*services.cart).clone()),
            oneclick: OneClickStore::new(
                (*services.subscriptions).clone(),
                notifications.clone(),
                clock.clone(),
            ),
            shop: ShopStore::new(storage.clone(), clock.clone(), (*services.shop).clone()),
            subscription_catalog: SubscriptionCatalogStore::new(
                storage.clone(),
                clock.clone(),
                (*services.subscriptions).clone(),
            ),
            user_subscription: UserSubscriptionStore::new((*services.user_subscription).clone(), clock.clone()),
            consultations: ConsultationsStore::new(storage.clone(), clock.clone(), (*services.consultations).clone()),
            news: NewsStore::new((*services.news).clone(), clock.clone()),
            bookmarks: BookmarkStore::new((*services.bookmarks).clone(), storage.clone(), notifications.clone()),
            addresses: AddressStore::new((*services.addresses).clone(), clock.clone()),
            orders: OrderStore::new((*services.orders).clone(), clock),
        };

        info!(
            environment = ?config.environment,
            mocked = ?FeatureArea::ALL.iter().filter(|a| config.mock.is_mocked(**a)).collect::<Vec<_>>(),
            "Application state ready"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                storage,
                api,
                services,
                stores,
                notifications,
                provider,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn storage(&self) -> &Arc<dyn KeyValueStore> {
        &self.inner.storage
    }

    /// The backend client, when any area talks to the backend.
    #[must_use]
    pub fn api(&self) -> Option<&ApiClient> {
        self.inner.api.as_ref()
    }

    #[must_use]
    pub fn services(&self) -> &Services {
        &self.inner.services
    }

    #[must_use]
    pub fn notifications(&self) -> Notifications {
        self.inner.notifications.clone()
    }

    /// Card confirmation provider matching the payments data source.
    #[must_use]
    pub fn payment_provider(&self) -> Arc<dyn PaymentProvider> {
        self.inner.provider.clone()
    }

    #[must_use]
    pub fn auth_store(&self) -> AuthStore {
        self.inner.stores.auth.clone()
    }

    #[must_use]
    pub fn cart_store(&self) -> CartStore {
        self.inner.stores.cart.clone()
    }

    #[must_use]
    pub fn oneclick_store(&self) -> OneClickStore {
        self.inner.stores.oneclick.clone()
    }

    #[must_use]
    pub fn shop_store(&self) -> ShopStore {
        self.inner.stores.shop.clone()
    }

    #[must_use]
    pub fn subscription_catalog_store(&self) -> SubscriptionCatalogStore {
        self.inner.stores.subscription_catalog.clone()
    }

    #[must_use]
    pub fn user_subscription_store(&self) -> UserSubscriptionStore {
        self.inner.stores.user_subscription.clone()
    }

    #[must_use]
    pub fn consultations_store(&self) -> ConsultationsStore {
        self.inner.stores.consultations.clone()
    }

    #[must_use]
    pub fn news_store(&self) -> NewsStore {
        self.inner.stores.news.clone()
    }

    #[must_use]
    pub fn bookmark_store(&self) -> BookmarkStore {
        self.inner.stores.bookmarks.clone()
    }

    #[must_use]
    pub fn address_store(&self) -> AddressStore {
        self.inner.stores.addresses.clone()
    }

    #[must_use]
    pub fn order_store(&self) -> OrderStore {
        self.inner.stores.orders.clone()
    }

    /// Checkout over the shared cart or one-click basket.
    #[must_use]
    pub fn checkout(&self, kind: CheckoutKind) -> Checkout {
        let stores = CheckoutStores {
            cart: self.cart_store(),
            oneclick: self.oneclick_store(),
        };
        Checkout::new(kind, &stores, (*self.inner.services.payments).clone())
    }

    /// Drop every piece of user-scoped state after logout.
    pub async fn logout(&self) {
        self.inner.stores.auth.logout().await;
        self.inner.stores.bookmarks.clear();
        self.inner.stores.addresses.reset();
        self.inner.stores.orders.reset();
        self.inner.stores.user_subscription.reset();
        self.inner.stores.oneclick.reset();
    }
}

// Charts live on their own endpoint and never carry the bearer token.
// Without a dedicated URL they are served by the backend under `/charts`.
fn chart_source(config: &ClientConfig, storage: &Arc<dyn KeyValueStore>) -> SharedSource {
    if config.mock.is_mocked(FeatureArea::Charts) {
        return Arc::new(MockSource::with_delay(config.mock.delay));
    }
    let base = config.chart_data_url.clone().or_else(|| {
        config
            .api_base_url
            .as_ref()
            .and_then(|api| Url::parse(&format!("{}/charts", api.as_str().trim_end_matches('/'))).ok())
    });
    match base {
        Some(base) => Arc::new(HttpSource::new(ApiClient::external(
            base,
            storage.clone(),
            config.request_timeout,
        ))),
        None => Arc::new(MockSource::with_delay(config.mock.delay)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::checkout::CheckoutFlow;
    use crate::clock::ManualClock;
    use crate::config::Environment;
    use crate::storage::MemoryStore;

    fn mocked_state() -> AppState {
        AppState::with_parts(
            ClientConfig::mocked("unused"),
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::at(0)),
        )
        .unwrap()
    }

    #[test]
    fn test_chart_source_falls_back_to_backend() {
        let config = ClientConfig::for_backend(Url::parse("https://api.example.fr/v1/").unwrap(), "unused");
        let source = chart_source(&config, &(Arc::new(MemoryStore::new()) as Arc<dyn KeyValueStore>));
        assert_eq!(source.label(), "http");
        assert_eq!(chart_source(&ClientConfig::mocked("unused"), &(Arc::new(MemoryStore::new()) as Arc<dyn KeyValueStore>)).label(), "mock");
    }

    #[test]
    fn test_mocked_state_has_no_api_client() {
        let state = mocked_state();
        assert!(state.api().is_none());
        assert!(format!("{state:?}").contains("AppState"));
    }

    #[test]
    fn test_production_with_mocks_is_rejected() {
        let mut config = ClientConfig::mocked("unused");
        config.environment = Environment::Production;
        let err = AppState::with_parts(config, Arc::new(MemoryStore::new()), Arc::new(ManualClock::at(0))).unwrap_err();
        assert!(matches!(err, StateError::Config(ConfigError::MockInProduction(_))));
    }

    #[tokio::test]
    async fn test_stores_are_shared() {
        let state = mocked_state();
        state.shop_store().fetch(false).await.unwrap();
        assert_eq!(state.shop_store().references().len(), 4);

        state
            .oneclick_store()
            .add_plan(&jdp_core::PlanId::new("premium"))
            .await
            .unwrap();
        let checkout = state.checkout(CheckoutKind::OneClick);
        assert!(!checkout.is_empty());
        assert_eq!(state.notifications().drain().len(), 1);
    }

    #[tokio::test]
    async fn test_logout_clears_user_state() {
        let state = mocked_state();
        let auth = state.auth_store();
        auth.login("camille@example.fr", &secrecy::SecretString::from("motdepasse"))
            .await
            .unwrap();
        state.bookmark_store().toggle("argent-industriel").await.unwrap();

        state.logout().await;
        assert!(!auth.is_authenticated());
        assert!(state.bookmark_store().slugs().is_empty());
    }
}
