//! Ordered, auto-expiring collection of visible notifications.
//!
//! One store per UI surface. A store assigns ids and timestamps to the
//! payloads it accepts, schedules their expiry on its own [`TimerRegistry`],
//! and on teardown cancels every timer and leaves the bus.
//!
//! Timer callbacks and bus listeners only hold a `Weak` reference to the
//! store state, so nothing they do can touch a store that is gone.

use super::timers::TimerRegistry;
use crate::events::{
    Notification, NotificationBus, NotificationId, NotificationKind, NotificationPayload,
    Subscription,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

#[derive(Default)]
struct StoreState {
    visible: Vec<Notification>,
    last_id: u64,
    torn_down: bool,
}

struct StoreInner {
    state: Mutex<StoreState>,
    timers: TimerRegistry,
    max_visible: Option<usize>,
    changes: watch::Sender<Vec<Notification>>,
}

impl StoreInner {
    fn add(self: &Arc<Self>, payload: NotificationPayload) -> Option<NotificationId> {
        let (notification, evicted) = {
            let mut state = self.state.lock();
            if state.torn_down {
                debug!(kind = %payload.kind, "Store torn down, dropping notification");
                return None;
            }
            state.last_id += 1;
            let notification = Notification::from_payload(NotificationId(state.last_id), payload);
            state.visible.push(notification.clone());

            let evicted: Vec<NotificationId> = match self.max_visible {
                Some(max) if state.visible.len() > max => {
                    let excess = state.visible.len() - max;
                    state.visible.drain(..excess).map(|n| n.id).collect()
                }
                _ => Vec::new(),
            };
            self.changes.send_replace(state.visible.clone());
            (notification, evicted)
        };

        for id in &evicted {
            self.timers.cancel(*id);
        }

        let id = notification.id;
        if notification.expires() && !evicted.contains(&id) {
            let weak = Arc::downgrade(self);
            let scheduled = self.timers.schedule(
                id,
                Duration::from_millis(notification.duration_ms),
                move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.remove(id);
                    }
                },
            );
            if !scheduled {
                debug!(notification_id = %id, "Notification kept without auto-expiry");
            }
        }

        debug!(
            notification_id = %id,
            kind = %notification.kind,
            duration_ms = notification.duration_ms,
            evicted = evicted.len(),
            "Notification added"
        );
        Some(id)
    }

    fn remove(&self, id: NotificationId) -> bool {
        let removed = {
            let mut state = self.state.lock();
            match state.visible.iter().position(|n| n.id == id) {
                Some(pos) => {
                    state.visible.remove(pos);
                    self.changes.send_replace(state.visible.clone());
                    true
                }
                None => false,
            }
        };
        // Also covers the race where the entry is gone but its timer is not.
        self.timers.cancel(id);

        if removed {
            debug!(notification_id = %id, "Notification removed");
        }
        removed
    }

    fn clear(&self) -> usize {
        let cleared = {
            let mut state = self.state.lock();
            let cleared = std::mem::take(&mut state.visible).len();
            self.changes.send_replace(Vec::new());
            cleared
        };
        let cancelled = self.timers.cancel_all();
        debug!(cleared, cancelled, "Notifications cleared");
        cleared
    }
}

/// Visible notifications for one UI surface.
///
/// Dropping the store tears it down (see [`NotificationStore::teardown`]).
pub struct NotificationStore {
    inner: Arc<StoreInner>,
    subscription: Mutex<Option<Subscription>>,
}

impl NotificationStore {
    /// Create an unbounded store that is not yet attached to any bus
    pub fn new() -> Self {
        Self::with_max_visible(None)
    }

    /// Create a store that keeps at most `max_visible` entries, evicting the
    /// oldest first. `None` or `Some(0)` means unbounded.
    pub fn with_max_visible(max_visible: Option<usize>) -> Self {
        let (changes, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(StoreState::default()),
                timers: TimerRegistry::new(),
                max_visible: max_visible.filter(|&max| max > 0),
                changes,
            }),
            subscription: Mutex::new(None),
        }
    }

    /// Accept every payload published on `bus`.
    ///
    /// Replaces any previous subscription of this store.
    pub fn attach(&self, bus: &NotificationBus) {
        self.attach_inner(bus, None);
    }

    /// Accept only payloads of the given kinds.
    pub fn attach_filtered(&self, bus: &NotificationBus, kinds: &[NotificationKind]) {
        self.attach_inner(bus, Some(kinds.to_vec()));
    }

    fn attach_inner(&self, bus: &NotificationBus, kinds: Option<Vec<NotificationKind>>) {
        if self.is_torn_down() {
            debug!("Store torn down, not attaching");
            return;
        }
        let weak = Arc::downgrade(&self.inner);
        let subscription = bus.subscribe(move |payload| {
            if let Some(kinds) = &kinds {
                if !kinds.contains(&payload.kind) {
                    return;
                }
            }
            if let Some(inner) = weak.upgrade() {
                inner.add(payload.clone());
            }
        });

        if let Some(previous) = self.subscription.lock().replace(subscription) {
            previous.unsubscribe();
        }
    }

    /// Stop receiving bus payloads. Visible entries and timers are kept.
    pub fn detach(&self) {
        if let Some(subscription) = self.subscription.lock().take() {
            subscription.unsubscribe();
        }
    }

    pub fn is_attached(&self) -> bool {
        self.subscription
            .lock()
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    /// Append a notification and schedule its expiry.
    ///
    /// Returns the assigned id, or `None` once the store is torn down.
    pub fn add(&self, payload: NotificationPayload) -> Option<NotificationId> {
        self.inner.add(payload)
    }

    /// Dismiss a notification and cancel its timer. No-op if already gone.
    pub fn remove(&self, id: NotificationId) -> bool {
        self.inner.remove(id)
    }

    /// Dismiss everything and cancel every pending timer.
    pub fn clear(&self) -> usize {
        self.inner.clear()
    }

    /// Snapshot of the visible notifications in arrival order
    pub fn visible(&self) -> Vec<Notification> {
        self.inner.state.lock().visible.clone()
    }

    pub fn get(&self, id: NotificationId) -> Option<Notification> {
        self.inner
            .state
            .lock()
            .visible
            .iter()
            .find(|n| n.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of expiry timers still waiting to fire
    pub fn pending_timers(&self) -> usize {
        self.inner.timers.pending()
    }

    /// Receiver updated with the full visible list after every change
    pub fn watch(&self) -> watch::Receiver<Vec<Notification>> {
        self.inner.changes.subscribe()
    }

    /// Unsubscribe from the bus and cancel every outstanding timer.
    ///
    /// Idempotent. Later `add` calls are ignored.
    pub fn teardown(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.torn_down {
                return;
            }
            state.torn_down = true;
        }
        self.detach();
        self.inner.timers.shutdown();
        debug!("Notification store torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.state.lock().torn_down
    }
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NotificationStore {
    fn drop(&mut self) {
        self.teardown();
    }
}
