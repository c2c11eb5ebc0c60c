//! Transient user-facing notifications ("toasts").

use std::sync::{Mutex, MutexGuard};

use tokio::sync::broadcast;

pub const ERROR_TOAST_TTL_MS: u64 = 4_000;
pub const INFO_TOAST_TTL_MS: u64 = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    /// How long the toast stays visible.
    pub ttl_ms: u64,
}

impl Notification {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
            ttl_ms: ERROR_TOAST_TTL_MS,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
            ttl_ms: INFO_TOAST_TTL_MS,
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);

    fn error(&self, message: &str) {
        self.notify(Notification::error(message));
    }
}

/// Fans notifications out to every live subscriber. Sends with no subscriber
/// are dropped.
#[derive(Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, notification: Notification) {
        let _ = self.tx.send(notification);
    }
}

/// Collects toasts raised while rendering a page so they can be emitted with it.
#[derive(Default)]
pub struct ToastBuffer {
    toasts: Mutex<Vec<Notification>>,
}

impl ToastBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Notification>> {
        self.toasts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Notifier for ToastBuffer {
    fn notify(&self, notification: Notification) {
        self.lock().push(notification);
    }
}
