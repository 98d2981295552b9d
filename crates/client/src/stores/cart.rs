//! Local cart.
//!
//! The cart lives on the device as a set of [`CartItem`] (quantity is
//! implicitly one, at most one entry per reference) persisted under
//! [`keys::CART`] together with an absolute expiry, fixed at seven days
//! when the cart is first written and moved only by [`CartStore::renew`].
//! A cart found past its expiry on load is discarded. At checkout the items are pushed into a backend basket and
//! the returned basket code is remembered.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use jdp_core::{BasketCode, CartItem, CartTotals, ReferenceId, ShopReference};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::clock::{SharedClock, duration_millis};
use crate::services::{CartError, CartService, wire};
use crate::storage::{KeyValueStore, KeyValueStoreExt, keys};

/// Lifetime of a cart from its creation or last renewal.
pub const CART_LIFETIME: Duration = Duration::from_secs(7 * 24 * 3600);

#[derive(Debug, Error)]
pub enum CartStoreError {
    #[error("reference {0} is already in the cart")]
    AlreadyInCart(ReferenceId),

    #[error("invalid cart item: {0}")]
    InvalidItem(&'static str),

    #[error(transparent)]
    Sync(#[from] CartError),
}

/// Persisted shape of the cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct PersistedCart {
    #[serde(default)]
    items: Vec<CartItem>,
    /// Unix milliseconds.
    expires_at: i64,
    #[serde(default)]
    basket_code: Option<BasketCode>,
}

/// The device cart. Clones share state.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    storage: Arc<dyn KeyValueStore>,
    clock: SharedClock,
    service: CartService,
    state: Mutex<PersistedCart>,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("CartStore")
            .field("count", &state.items.len())
            .field("basket_code", &state.basket_code)
            .finish_non_exhaustive()
    }
}

impl CartStore {
    /// Create the store and load the persisted cart.
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>, clock: SharedClock, service: CartService) -> Self {
        let store = Self {
            inner: Arc::new(CartStoreInner {
                storage,
                clock,
                service,
                state: Mutex::new(PersistedCart::default()),
            }),
        };
        store.load();
        store
    }

    /// Reload from storage, discarding an expired cart.
    pub fn load(&self) {
        let now = self.inner.clock.now_millis();
        let loaded = match self.inner.storage.get_json::<PersistedCart>(keys::CART) {
            Some(cart) if cart.expires_at < now => {
                info!(expired_at = cart.expires_at, "Discarding expired cart");
                self.inner.storage.remove_logged(keys::CART);
                PersistedCart::default()
            }
            Some(mut cart) => {
                cart.items = normalize_all(cart.items);
                cart
            }
            None => PersistedCart::default(),
        };
        debug!(count = loaded.items.len(), "Cart loaded");
        *self.lock() = loaded;
    }

    /// Add an item.
    ///
    /// # Errors
    ///
    /// `AlreadyInCart` when the reference is present (the cart is left
    /// unchanged), `InvalidItem` for an item without id or name.
    #[instrument(skip(self, item), fields(reference = %item.id))]
    pub fn add(&self, item: CartItem) -> Result<(), CartStoreError> {
        let item = normalize(item)?;
        let mut state = self.lock();
        if state.items.iter().any(|i| i.id == item.id) {
            return Err(CartStoreError::AlreadyInCart(item.id));
        }
        state.items.push(item);
        self.persist(&mut state);
        Ok(())
    }

    /// Remove an item. Returns whether it was present.
    pub fn remove(&self, id: &ReferenceId) -> bool {
        let mut state = self.lock();
        let before = state.items.len();
        state.items.retain(|i| &i.id != id);
        let removed = state.items.len() != before;
        if removed {
            self.persist(&mut state);
        }
        removed
    }

    /// Empty the cart, keeping the remembered basket code.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.items.clear();
        self.persist(&mut state);
    }

    /// Push the expiry to seven days from now.
    pub fn renew(&self) {
        let mut state = self.lock();
        state.expires_at = self.fresh_expiry();
        self.persist(&mut state);
    }

    #[must_use]
    pub fn contains(&self, id: &ReferenceId) -> bool {
        self.lock().items.iter().any(|i| &i.id == id)
    }

    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.lock().items.clone()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.lock().items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Subtotal, tax-exclusive subtotal and VAT of the items.
    #[must_use]
    pub fn totals(&self) -> CartTotals {
        CartTotals::from_ttc(self.lock().items.iter().map(|i| i.price))
    }

    /// Basket code remembered from the last sync.
    #[must_use]
    pub fn basket_code(&self) -> Option<BasketCode> {
        self.lock().basket_code.clone()
    }

    /// Unix milliseconds after which the cart is discarded, when it has been written.
    #[must_use]
    pub fn expires_at(&self) -> Option<i64> {
        let state = self.lock();
        (state.expires_at > 0).then_some(state.expires_at)
    }

    /// Push the items into a backend basket and remember its code.
    ///
    /// # Errors
    ///
    /// The first failing backend call; `Validation` for an empty cart.
    #[instrument(skip(self))]
    pub async fn sync(&self) -> Result<BasketCode, CartStoreError> {
        let (items, existing) = {
            let state = self.lock();
            (state.items.clone(), state.basket_code.clone())
        };
        let code = self
            .inner
            .service
            .sync_local_cart(existing.as_ref(), &items)
            .await?;
        let mut state = self.lock();
        state.basket_code = Some(code.clone());
        self.persist(&mut state);
        Ok(code)
    }

    /// Forget items and basket code after a confirmed purchase.
    pub fn reset(&self) {
        info!("Resetting cart after purchase");
        *self.lock() = PersistedCart::default();
        self.inner.storage.remove_logged(keys::CART);
    }

    fn fresh_expiry(&self) -> i64 {
        self.inner.clock.now_millis() + duration_millis(CART_LIFETIME)
    }

    /// Write the cart, stamping the expiry only on a cart that has none yet.
    fn persist(&self, state: &mut PersistedCart) {
        if state.expires_at <= 0 {
            state.expires_at = self.fresh_expiry();
        }
        if let Err(e) = self.inner.storage.set_json(keys::CART, &*state) {
            warn!(error = %e, "Failed to persist cart");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PersistedCart> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cart entry for a catalog reference at its cheapest product price.
#[must_use]
pub fn cart_item_for(reference: &ShopReference) -> Option<CartItem> {
    let product = reference
        .products
        .iter()
        .filter(|p| p.min_price().is_some())
        .min_by_key(|p| p.min_price())?;
    Some(CartItem {
        id: reference.id.clone(),
        name: reference.name.clone(),
        price: product.min_price()?,
        slug: Some(reference.slug.clone()),
        image_url: reference.image_url.clone(),
        kind: product.kind,
    })
}

fn normalize(mut item: CartItem) -> Result<CartItem, CartStoreError> {
    if item.id.is_empty() {
        return Err(CartStoreError::InvalidItem("missing reference id"));
    }
    item.name = wire::decode_entities(item.name.trim());
    if item.name.is_empty() {
        return Err(CartStoreError::InvalidItem("missing name"));
    }
    item.price = item.price.round_dp(2).max(rust_decimal::Decimal::ZERO);
    item.slug = item.slug.filter(|s| !s.trim().is_empty());
    Ok(item)
}

fn normalize_all(items: Vec<CartItem>) -> Vec<CartItem> {
    let mut kept: Vec<CartItem> = Vec::with_capacity(items.len());
    for item in items {
        match normalize(item) {
            Ok(item) if !kept.iter().any(|k| k.id == item.id) => kept.push(item),
            Ok(item) => debug!(reference = %item.id, "Dropping duplicate persisted cart entry"),
            Err(e) => warn!(error = %e, "Dropping unusable persisted cart entry"),
        }
    }
    kept
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use jdp_core::ProductKind;
    use rust_decimal::Decimal;

    use super::*;
    use crate::clock::ManualClock;
    use crate::source::MockSource;
    use crate::storage::MemoryStore;

    fn item(id: &str, price: &str) -> CartItem {
        CartItem {
            id: ReferenceId::new(id),
            name: format!("Pi&egrave;ce {id}"),
            price: Decimal::from_str(price).unwrap(),
            slug: None,
            image_url: None,
            kind: ProductKind::Physical,
        }
    }

    fn store(storage: Arc<MemoryStore>, clock: &ManualClock) -> CartStore {
        CartStore::new(
            storage,
            Arc::new(clock.clone()),
            CartService::new(Arc::new(MockSource::new())),
        )
    }

    #[test]
    fn test_duplicate_add_fails_and_leaves_cart_unchanged() {
        let clock = ManualClock::at(0);
        let cart = store(Arc::new(MemoryStore::new()), &clock);
        cart.add(item("napoleon", "389.90")).unwrap();
        let before = cart.items();

        let err = cart.add(item("napoleon", "1.00")).unwrap_err();
        assert!(matches!(err, CartStoreError::AlreadyInCart(id) if id.as_str() == "napoleon"));
        assert_eq!(cart.items(), before);
        assert_eq!(cart.count(), 1);
    }

    #[test]
    fn test_add_decodes_entities() {
        let clock = ManualClock::at(0);
        let cart = store(Arc::new(MemoryStore::new()), &clock);
        cart.add(item("a", "1")).unwrap();
        assert_eq!(cart.items()[0].name, "Pièce a");
    }

    #[test]
    fn test_totals() {
        let clock = ManualClock::at(0);
        let cart = store(Arc::new(MemoryStore::new()), &clock);
        cart.add(item("a", "120.00")).unwrap();
        cart.add(item("b", "29.00")).unwrap();
        let totals = cart.totals();
        assert_eq!(totals.subtotal, Decimal::from_str("149.00").unwrap());
        assert_eq!(totals.subtotal_excl_vat, Decimal::from_str("124.17").unwrap());
        assert_eq!(totals.vat_amount, Decimal::from_str("24.83").unwrap());
    }

    #[test]
    fn test_cart_survives_reload_within_lifetime() {
        let storage = Arc::new(MemoryStore::new());
        let clock = ManualClock::at(0);
        store(storage.clone(), &clock).add(item("a", "1")).unwrap();

        clock.advance(Duration::from_secs(6 * 24 * 3600));
        assert_eq!(store(storage, &clock).count(), 1);
    }

    #[test]
    fn test_expired_cart_loads_empty() {
        let storage = Arc::new(MemoryStore::new());
        let clock = ManualClock::at(0);
        store(storage.clone(), &clock).add(item("a", "1")).unwrap();

        clock.advance(CART_LIFETIME + Duration::from_secs(1));
        let reloaded = store(storage.clone(), &clock);
        assert!(reloaded.is_empty());
        assert!(!storage.contains(keys::CART));
    }

    #[test]
    fn test_renew_moves_expiry() {
        let clock = ManualClock::at(1_000);
        let cart = store(Arc::new(MemoryStore::new()), &clock);
        cart.add(item("a", "1")).unwrap();
        clock.advance(Duration::from_secs(60));
        cart.renew();
        assert_eq!(cart.expires_at(), Some(61_000 + duration_millis(CART_LIFETIME)));
    }

    #[test]
    fn test_writes_keep_creation_expiry() {
        let storage = Arc::new(MemoryStore::new());
        let clock = ManualClock::at(0);
        let cart = store(storage.clone(), &clock);
        cart.add(item("a", "1")).unwrap();
        let created = cart.expires_at();
        assert_eq!(created, Some(duration_millis(CART_LIFETIME)));

        clock.advance(Duration::from_secs(6 * 24 * 3600));
        cart.add(item("b", "2")).unwrap();
        cart.remove(&ReferenceId::new("a"));
        assert_eq!(cart.expires_at(), created);

        clock.advance(Duration::from_secs(2 * 24 * 3600));
        let reloaded = store(storage.clone(), &clock);
        assert!(reloaded.is_empty());
        assert!(!storage.contains(keys::CART));
    }

    #[test]
    fn test_load_accepts_string_prices_and_drops_duplicates() {
        let storage = Arc::new(MemoryStore::new());
        storage
            .set(
                keys::CART,
                r#"{"items":[
                    {"id":"a","name":"Lingot 1 kg","price":"7 420,00"},
                    {"id":"a","name":"Doublon","price":1}
                ],"expires_at":9999999999999}"#,
            )
            .unwrap();
        let cart = store(storage, &ManualClock::at(0));
        assert_eq!(cart.count(), 1);
        assert_eq!(cart.items()[0].price, Decimal::from(7420));
    }

    #[tokio::test]
    async fn test_sync_remembers_basket_code_and_reset_forgets() {
        let storage = Arc::new(MemoryStore::new());
        let clock = ManualClock::at(0);
        let cart = store(storage.clone(), &clock);
        cart.add(item("ref-napoleon-20f", "389.90")).unwrap();
        cart.add(item("ref-rapport-2024", "29.00")).unwrap();

        let code = cart.sync().await.unwrap();
        assert_eq!(cart.basket_code(), Some(code));

        cart.reset();
        assert!(cart.is_empty());
        assert_eq!(cart.basket_code(), None);
        assert!(!storage.contains(keys::CART));
    }

    #[tokio::test]
    async fn test_sync_empty_cart_is_validation() {
        let cart = store(Arc::new(MemoryStore::new()), &ManualClock::at(0));
        let err = cart.sync().await.unwrap_err();
        assert!(matches!(err, CartStoreError::Sync(e) if e.code == jdp_core::ErrorCode::Validation));
    }
}
