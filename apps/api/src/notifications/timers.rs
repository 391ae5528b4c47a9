use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

/// Auto-dismiss timers keyed by notification id.
///
/// A timer does not touch the store itself: when it fires it posts the id back
/// on the store's expiry channel, and the store's own loop applies the removal.
/// Cancelling an id that already fired, or was never armed, is a no-op.
#[derive(Default)]
pub struct TimerRegistry {
    handles: HashMap<Uuid, JoinHandle<()>>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms (or re-arms) the timer for `id`.
    pub fn arm(&mut self, id: Uuid, after: Duration, expiries: mpsc::UnboundedSender<Uuid>) {
        self.cancel(id);
        let deadline = Instant::now() + after;
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = expiries.send(id);
        });
        self.handles.insert(id, handle);
    }

    /// Returns whether a timer was registered for `id`.
    pub fn cancel(&mut self, id: Uuid) -> bool {
        match self.handles.remove(&id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) -> usize {
        let count = self.handles.len();
        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
        count
    }

    pub fn is_armed(&self, id: Uuid) -> bool {
        self.handles
            .get(&id)
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Drop for TimerRegistry {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
