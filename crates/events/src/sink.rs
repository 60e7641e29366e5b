//! The [`NotificationSink`] seam and its logging implementation.

use std::sync::Arc;

use crate::bus::{Notification, NotificationLevel};

/// Receives operator-facing messages.
///
/// Implementations must not block: components call `notify` from inside
/// their async loops.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

impl<T: NotificationSink + ?Sized> NotificationSink for Arc<T> {
    fn notify(&self, notification: Notification) {
        (**self).notify(notification)
    }
}

/// Writes notifications to the `tracing` log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, n: Notification) {
        let subject = n.subject.as_deref().unwrap_or("-");
        match n.level {
            NotificationLevel::Success | NotificationLevel::Info => {
                tracing::info!(subject, "{}", n.message)
            }
            NotificationLevel::Warning => tracing::warn!(subject, "{}", n.message),
            NotificationLevel::Error => tracing::error!(subject, "{}", n.message),
        }
    }
}
