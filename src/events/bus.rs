//! Event bus fanning notification payloads out to registered listeners

use super::{NotificationEmitter, NotificationPayload};
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Closure type for bus listeners
pub type ListenerFn = dyn Fn(&NotificationPayload) + Send + Sync;

struct Listener {
    id: u64,
    active: Arc<AtomicBool>,
    callback: Arc<ListenerFn>,
}

#[derive(Default)]
struct BusInner {
    listeners: Mutex<Vec<Listener>>,
    next_id: AtomicU64,
}

/// Publish/subscribe channel for notification payloads.
///
/// Delivery is synchronous and in subscription order. No buffering, no
/// replay: a listener only sees payloads published while it is registered.
/// Clones share the same listener set, so one bus is created at startup and
/// handed to whoever needs it.
#[derive(Clone, Default)]
pub struct NotificationBus {
    inner: Arc<BusInner>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for every payload published from now on.
    ///
    /// The returned [`Subscription`] removes exactly this listener when
    /// `unsubscribe()` is called or when it is dropped.
    pub fn subscribe(
        &self,
        listener: impl Fn(&NotificationPayload) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        self.inner.listeners.lock().push(Listener {
            id,
            active: active.clone(),
            callback: Arc::new(listener),
        });
        debug!(listener = id, "Notification listener subscribed");

        Subscription {
            bus: Arc::downgrade(&self.inner),
            id,
            active,
        }
    }

    /// Subscribe with a channel instead of a callback, for async consumers.
    pub fn subscribe_channel(
        &self,
    ) -> (Subscription, mpsc::UnboundedReceiver<NotificationPayload>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |payload| {
            // Receiver gone: nothing left to deliver to
            let _ = tx.send(payload.clone());
        });
        (subscription, rx)
    }

    /// Deliver `payload` to every listener registered at the time of the call.
    ///
    /// Listeners added during delivery wait for the next publish. A panicking
    /// listener is logged and skipped; the remaining listeners still run.
    pub fn publish(&self, payload: &NotificationPayload) {
        // Lock is released before any callback runs, so listeners may
        // subscribe or unsubscribe from inside a delivery.
        let snapshot: Vec<(u64, Arc<AtomicBool>, Arc<ListenerFn>)> = {
            let guard = self.inner.listeners.lock();
            guard
                .iter()
                .map(|l| (l.id, l.active.clone(), l.callback.clone()))
                .collect()
        };

        debug!(
            kind = %payload.kind,
            listeners = snapshot.len(),
            "Publishing notification"
        );

        for (id, active, callback) in snapshot {
            if !active.load(Ordering::Acquire) {
                continue;
            }
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| callback(payload))) {
                error!(
                    listener = id,
                    kind = %payload.kind,
                    "Notification listener panicked: {}",
                    panic_message(panic.as_ref())
                );
            }
        }
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }
}

impl NotificationEmitter for NotificationBus {
    fn emit(&self, payload: NotificationPayload) {
        self.publish(&payload);
    }
}

impl fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Handle to one registered listener.
///
/// `unsubscribe()` is idempotent; dropping the handle unsubscribes too.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    bus: Weak<BusInner>,
    id: u64,
    active: Arc<AtomicBool>,
}

impl Subscription {
    /// Remove the listener. Later calls are no-ops.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(bus) = self.bus.upgrade() {
            bus.listeners.lock().retain(|l| l.id != self.id);
            debug!(listener = self.id, "Notification listener unsubscribed");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(bus: &NotificationBus) -> (Subscription, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = bus.subscribe(move |p| sink.lock().push(p.message.clone()));
        (sub, seen)
    }

    #[test]
    fn test_publish_without_listener_no_panic() {
        let bus = NotificationBus::new();
        bus.publish(&NotificationPayload::info("nobody listening"));
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_listener_receives_only_while_subscribed() {
        let bus = NotificationBus::new();
        let (sub, seen) = capture(&bus);

        bus.publish(&NotificationPayload::success("one"));
        bus.publish(&NotificationPayload::success("two"));
        sub.unsubscribe();
        bus.publish(&NotificationPayload::success("three"));

        assert_eq!(*seen.lock(), vec!["one", "two"]);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let bus = NotificationBus::new();
        let (sub, _seen) = capture(&bus);
        let (_other, other_seen) = capture(&bus);

        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!sub.is_active());
        assert_eq!(bus.listener_count(), 1);

        bus.publish(&NotificationPayload::info("still delivered"));
        assert_eq!(*other_seen.lock(), vec!["still delivered"]);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let bus = NotificationBus::new();
        let (sub, seen) = capture(&bus);
        drop(sub);

        bus.publish(&NotificationPayload::info("after drop"));
        assert!(seen.lock().is_empty());
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_delivery_in_subscription_order() {
        let bus = NotificationBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let subs: Vec<Subscription> = (0..3)
            .map(|i| {
                let order = order.clone();
                bus.subscribe(move |_| order.lock().push(i))
            })
            .collect();

        bus.publish(&NotificationPayload::info("x"));
        assert_eq!(*order.lock(), vec![0, 1, 2]);
        drop(subs);
    }

    #[test]
    fn test_listener_added_during_delivery_waits_for_next_publish() {
        let bus = NotificationBus::new();
        let late_hits = Arc::new(AtomicU64::new(0));
        let late_subs = Arc::new(Mutex::new(Vec::new()));

        let _first = {
            let inner_bus = bus.clone();
            let late_hits = late_hits.clone();
            let late_subs = late_subs.clone();
            bus.subscribe(move |_| {
                let hits = late_hits.clone();
                let sub = inner_bus.subscribe(move |_| {
                    hits.fetch_add(1, Ordering::SeqCst);
                });
                late_subs.lock().push(sub);
            })
        };

        bus.publish(&NotificationPayload::info("first"));
        assert_eq!(late_hits.load(Ordering::SeqCst), 0);

        bus.publish(&NotificationPayload::info("second"));
        assert_eq!(late_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_unsubscribed_mid_delivery_is_skipped() {
        let bus = NotificationBus::new();
        let target: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let killer_target = target.clone();
        let _killer = bus.subscribe(move |_| {
            if let Some(sub) = killer_target.lock().as_ref() {
                sub.unsubscribe();
            }
        });
        let (victim, victim_seen) = capture(&bus);
        *target.lock() = Some(victim);

        bus.publish(&NotificationPayload::info("kill"));
        assert!(victim_seen.lock().is_empty());
        assert_eq!(bus.listener_count(), 1);
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let bus = NotificationBus::new();
        let _bad = bus.subscribe(|_| panic!("listener exploded"));
        let (_good, seen) = capture(&bus);

        bus.publish(&NotificationPayload::error("boom"));
        assert_eq!(*seen.lock(), vec!["boom"]);
    }

    #[test]
    fn test_clone_shares_listeners() {
        let bus = NotificationBus::new();
        let bus2 = bus.clone();
        let (_sub, seen) = capture(&bus);

        bus2.emit_success("from clone", 3000);
        assert_eq!(*seen.lock(), vec!["from clone"]);
        assert_eq!(bus2.listener_count(), 1);
    }

    #[test]
    fn test_subscribe_channel_forwards_payloads() {
        let bus = NotificationBus::new();
        let (sub, mut rx) = bus.subscribe_channel();

        bus.emit_error("Network down", 5000);
        let payload = rx.try_recv().unwrap();
        assert_eq!(payload.message, "Network down");
        assert_eq!(payload.duration_ms, Some(5000));

        sub.unsubscribe();
        bus.emit_error("unseen", 5000);
        assert!(rx.try_recv().is_err());
    }
}
