//! Domain services.
//!
//! Each service is a stateless translator over one backend resource. It
//! holds a [`DataSource`](crate::source::DataSource) chosen once at
//! construction, maps the backend's wire shapes into `jdp-core` types, and
//! reports every failure as its own typed error carrying an
//! [`ErrorCode`](jdp_core::ErrorCode). Raw transport errors never escape a
//! service.

pub mod addresses;
pub mod auth;
pub mod bookmarks;
pub mod cart;
pub mod charts;
pub mod consultations;
mod error;
pub mod legacy;
pub mod news;
pub mod orders;
pub mod payments;
pub mod shop;
pub mod subscriptions;
pub mod user_subscription;
pub mod wire;

pub use addresses::{AddressError, AddressService};
pub use auth::{AuthError, AuthService, AuthToken, Registration};
pub use bookmarks::{BookmarkError, BookmarkService};
pub use cart::{CartError, CartService};
pub use charts::{ChartConfig, ChartError, ChartLibrary, ChartManifest, ChartRange, ChartService};
pub use consultations::{ConsultationError, ConsultationService};
pub use error::{Rejection, ServiceError, check_rejection};
pub use legacy::{LegacyError, LegacyLink, LegacyLookup, LegacyService};
pub use news::{NewsError, NewsService};
pub use orders::{OrderError, OrderService};
pub use payments::{PaymentError, PaymentIntentKind, PaymentService, PaymentSession};
pub use shop::{ShopError, ShopService};
pub use subscriptions::{OneClickReceipt, SubscriptionError, SubscriptionService};
pub use user_subscription::{UserSubscriptionError, UserSubscriptionService};
