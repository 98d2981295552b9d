//! JDP client SDK.
//!
//! Client-side orchestration for the JDP shop, one-click subscriptions,
//! editorial news and webinars: typed services over the backend (or its
//! mock), persisted stores with cache and expiry rules, checkout
//! orchestration and navigation guards.
//!
//! Everything hangs off [`state::AppState`], built once from a
//! [`config::ClientConfig`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod checkout;
pub mod clock;
pub mod config;
pub mod guards;
pub mod http;
pub mod services;
pub mod source;
pub mod state;
pub mod storage;
pub mod stores;

pub use config::{ClientConfig, ConfigError, FeatureArea};
pub use state::AppState;
