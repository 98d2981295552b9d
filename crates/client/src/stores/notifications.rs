//! Transient user-facing notifications.
//!
//! Raised by user-initiated actions (adding a plan, toggling a bookmark)
//! when something worth telling the user happens. Pending notifications
//! queue up until drained; live subscribers also get each one as it is
//! pushed.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

/// Oldest notifications are dropped beyond this many pending.
const MAX_PENDING: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

/// Shared notification queue. Clones share the same queue.
#[derive(Debug, Clone)]
pub struct Notifications {
    inner: Arc<NotificationsInner>,
}

#[derive(Debug)]
struct NotificationsInner {
    pending: Mutex<VecDeque<Notification>>,
    sender: broadcast::Sender<Notification>,
}

impl Notifications {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(NotificationsInner {
                pending: Mutex::new(VecDeque::new()),
                sender: broadcast::channel(CHANNEL_CAPACITY).0,
            }),
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(NotificationLevel::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.push(NotificationLevel::Success, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(NotificationLevel::Error, message);
    }

    /// Queue a notification and broadcast it to live subscribers.
    pub fn push(&self, level: NotificationLevel, message: impl Into<String>) {
        let notification = Notification {
            level,
            message: message.into(),
        };
        {
            let mut pending = self.lock();
            if pending.len() >= MAX_PENDING {
                pending.pop_front();
            }
            pending.push_back(notification.clone());
        }
        // No receivers is fine.
        let _ = self.inner.sender.send(notification);
    }

    /// Take every pending notification, oldest first.
    #[must_use]
    pub fn drain(&self) -> Vec<Notification> {
        self.lock().drain(..).collect()
    }

    /// Pending notifications without removing them.
    #[must_use]
    pub fn pending(&self) -> Vec<Notification> {
        self.lock().iter().cloned().collect()
    }

    /// Receive notifications as they are pushed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.inner.sender.subscribe()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Notification>> {
        self.inner.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Notifications {
    fn default() -> Self {
        Self::new()
    }
}
