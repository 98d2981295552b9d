//! CLI commands.
//!
//! Each command drives one store of the shared [`jdp_client::AppState`]
//! and reports through `tracing`.

pub mod account;
pub mod checkout;
pub mod content;
pub mod shop;

use jdp_client::stores::Notifications;

/// Log notifications raised by the stores while a command ran.
fn flush_notifications(notifications: &Notifications) {
    for notification in notifications.drain() {
        tracing::warn!(level = ?notification.level, "{}", notification.message);
    }
}
