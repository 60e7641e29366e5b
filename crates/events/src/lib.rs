//! Portfina operator notifications.
//!
//! - [`Notification`] -- a human-readable success/info/warning/error
//!   message, optionally tied to a job key.
//! - [`NotificationSink`] -- the seam every component reports through.
//! - [`NotificationBus`] -- in-process fan-out backed by
//!   `tokio::sync::broadcast`.
//! - [`TracingSink`] -- writes notifications to the `tracing` log.

pub mod bus;
pub mod sink;

pub use bus::{Notification, NotificationBus, NotificationLevel};
pub use sink::{NotificationSink, TracingSink};
