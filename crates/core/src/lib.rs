//! JDP Core - Shared domain types.
//!
//! This crate provides the domain model used by the JDP client crates:
//! - `client` - HTTP services, state stores and checkout orchestration
//! - `cli` - Command-line front end
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no persisted storage. Backend wire shapes are mapped into these
//! types at the service boundary in `jdp-client`.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, emails, money/VAT, catalog, cart, subscriptions,
//!   news, webinars, invoices and error codes

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
