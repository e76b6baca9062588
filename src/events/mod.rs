//! Notification event system
//!
//! This module provides:
//! - `NotificationPayload` / `Notification`: what publishers send and what stores hold
//! - `NotificationBus`: synchronous fan-out to registered listeners
//! - `NotificationEmitter`: the seam the call wrapper publishes through

mod bus;
mod types;

pub use bus::{ListenerFn, NotificationBus, Subscription};
pub use types::{
    Notification, NotificationEmitter, NotificationId, NotificationKind, NotificationPayload,
};
