//! Subscriber-side notification state: visible toasts and their expiry timers

mod store;
mod timers;

pub use store::NotificationStore;
pub use timers::TimerRegistry;
