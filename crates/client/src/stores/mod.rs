//! Application state stores.
//!
//! Each store owns one snapshot of backend data plus its load state, and
//! is the only writer of that snapshot. Stores are cheap to clone; clones
//! share state.

mod addresses;
mod auth;
mod bookmarks;
mod cart;
mod consultations;
mod news;
mod notifications;
mod oneclick;
pub mod optimistic;
mod orders;
mod resource;
mod shop;
mod subscription_catalog;
mod user_subscription;

#[cfg(test)]
pub(crate) mod testing;

pub use addresses::AddressStore;
pub use auth::AuthStore;
pub use bookmarks::BookmarkStore;
pub use cart::{CART_LIFETIME, CartStore, CartStoreError, cart_item_for};
pub use consultations::{ConsultationsStore, WEBINARS_TTL};
pub use news::{NEWS_TTL, NewsFeed, NewsStore};
pub use notifications::{Notification, NotificationLevel, Notifications};
pub use oneclick::OneClickStore;
pub use orders::OrderStore;
pub use resource::{FetchOutcome, LoadState, Resource};
pub use shop::{CATALOG_TTL, CATALOG_VERSION, ShopStore};
pub use subscription_catalog::{PLAN_CATALOG_TTL, PLAN_CATALOG_VERSION, SubscriptionCatalogStore};
pub use user_subscription::UserSubscriptionStore;
