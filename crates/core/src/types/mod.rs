//! Core types for the JDP client.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod catalog;
pub mod email;
pub mod error_code;
pub mod id;
pub mod invoice;
pub mod news;
pub mod price;
pub mod status;
pub mod subscription;
pub mod user;
pub mod webinar;

pub use cart::{BasketLine, CartItem, CartTotals, RemoteBasket};
pub use catalog::{CatalogSort, ProductKind, ShopPrice, ShopProduct, ShopReference};
pub use email::{Email, EmailError};
pub use error_code::ErrorCode;
pub use id::*;
pub use invoice::Invoice;
pub use news::{Encadre, NewsBody, NewsItem, NewsKind, NewsPage};
pub use price::{
    PRICE_TOLERANCE, VAT_RATE, coerce_amount, deserialize_amount, excl_vat, format_eur, vat_amount,
};
pub use status::*;
pub use subscription::{OneClickBasket, OneClickBasketItem, SubscriptionPlan, UserSubscription};
pub use user::{Address, AddressInput, ProfileUpdate, User};
pub use webinar::{Webinar, WebinarList, WebinarSlot};
