//! Cancellable delayed callbacks keyed by notification id.
//!
//! Each scheduled callback is a tokio task racing `sleep_until(deadline)`
//! against a child of the registry's root [`CancellationToken`]. The token
//! table is the arena: cancelling an id removes its entry and fires its
//! token, and `shutdown()` fires the root so no child can outlive the owner.
//!
//! The deadline is fixed when `schedule()` is called, not when the task is
//! first polled, so virtual time in tests behaves exactly.

use crate::events::NotificationId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

type TokenTable = HashMap<NotificationId, CancellationToken>;

pub struct TimerRegistry {
    root: CancellationToken,
    tokens: Arc<Mutex<TokenTable>>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            tokens: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Run `on_fire` once `delay` has elapsed, unless `id` is cancelled first.
    ///
    /// Scheduling an id that is already pending replaces the old timer.
    /// Returns `false` when nothing was scheduled: the registry is shut down
    /// or there is no tokio runtime to run the timer on.
    pub fn schedule(
        &self,
        id: NotificationId,
        delay: Duration,
        on_fire: impl FnOnce() + Send + 'static,
    ) -> bool {
        if self.root.is_cancelled() {
            debug!(notification_id = %id, "Timer registry shut down, not scheduling");
            return false;
        }
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(notification_id = %id, "No tokio runtime, timer not scheduled");
                return false;
            }
        };

        let deadline = Instant::now() + delay;
        let token = self.root.child_token();
        if let Some(previous) = self.tokens.lock().insert(id, token.clone()) {
            previous.cancel();
        }

        let tokens = self.tokens.clone();
        handle.spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = tokio::time::sleep_until(deadline) => {
                    // Cancellation always happens under the table lock, so
                    // checking it here settles a cancel/fire race.
                    let fire = {
                        let mut table = tokens.lock();
                        if token.is_cancelled() {
                            false
                        } else {
                            table.remove(&id);
                            true
                        }
                    };
                    if fire {
                        debug!(notification_id = %id, "Timer fired");
                        on_fire();
                    }
                }
            }
        });
        true
    }

    /// Cancel the pending timer for `id`. Returns whether one was pending.
    pub fn cancel(&self, id: NotificationId) -> bool {
        match self.tokens.lock().remove(&id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every pending timer in one pass. Returns how many were pending.
    pub fn cancel_all(&self) -> usize {
        let mut table = self.tokens.lock();
        let count = table.len();
        for (_, token) in table.drain() {
            token.cancel();
        }
        count
    }

    /// Cancel everything and refuse further scheduling.
    pub fn shutdown(&self) {
        let cancelled = self.cancel_all();
        self.root.cancel();
        debug!(cancelled, "Timer registry shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }

    pub fn is_pending(&self, id: NotificationId) -> bool {
        self.tokens.lock().contains_key(&id)
    }

    /// Number of timers that have neither fired nor been cancelled
    pub fn pending(&self) -> usize {
        self.tokens.lock().len()
    }
}

impl Default for TimerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TimerRegistry {
    fn drop(&mut self) {
        self.root.cancel();
    }
}
