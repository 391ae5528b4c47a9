//! Notification Store: the single source of truth for what is on screen.
//!
//! Holds the active set (bounded by `max_visible`) and a FIFO overflow queue.
//! Every mutation goes through the methods below; all of them tolerate ids
//! that are no longer tracked.

use std::collections::VecDeque;

use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::activity::ActivityReporter;
use super::model::{Notification, NotificationSnapshot, NotificationSpec, ToastPosition};
use super::timers::TimerRegistry;

pub const DEFAULT_MAX_VISIBLE: usize = 5;
pub const DEFAULT_DURATION_MS: u64 = 5000;

/// Receives ids whose auto-dismiss timer fired. Feed them to
/// [`NotificationStore::expire`] on the store's own loop.
pub type ExpiryReceiver = mpsc::UnboundedReceiver<Uuid>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    pub max_visible: usize,
    pub default_duration_ms: u64,
    /// When set, no auto-dismiss timer is ever armed.
    pub persist: bool,
    pub position: ToastPosition,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_visible: DEFAULT_MAX_VISIBLE,
            default_duration_ms: DEFAULT_DURATION_MS,
            persist: false,
            position: ToastPosition::default(),
        }
    }
}

impl StoreOptions {
    /// Capacity is at least one; a zero capacity would queue forever.
    pub fn with_max_visible(mut self, max_visible: usize) -> Self {
        self.max_visible = max_visible.max(1);
        self
    }

    pub fn with_default_duration_ms(mut self, default_duration_ms: u64) -> Self {
        self.default_duration_ms = default_duration_ms;
        self
    }

    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    pub fn with_position(mut self, position: ToastPosition) -> Self {
        self.position = position;
        self
    }
}

pub struct NotificationStore {
    options: StoreOptions,
    active: Vec<Notification>,
    queued: VecDeque<Notification>,
    timers: TimerRegistry,
    expiries: mpsc::UnboundedSender<Uuid>,
    activity: ActivityReporter,
}

impl NotificationStore {
    pub fn new(options: StoreOptions, activity: ActivityReporter) -> (Self, ExpiryReceiver) {
        let (expiries, expiry_rx) = mpsc::unbounded_channel();
        let options = StoreOptions {
            max_visible: options.max_visible.max(1),
            ..options
        };
        let store = Self {
            options,
            active: Vec::new(),
            queued: VecDeque::new(),
            timers: TimerRegistry::new(),
            expiries,
            activity,
        };
        (store, expiry_rx)
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Shows a notification under a fresh id.
    pub fn show(&mut self, spec: NotificationSpec) -> Uuid {
        self.show_with_id(Uuid::new_v4(), spec)
    }

    /// Shows a notification under an id chosen by the caller, which lets a
    /// handle return the id before the store has processed the request.
    pub fn show_with_id(&mut self, id: Uuid, spec: NotificationSpec) -> Uuid {
        if self.contains(id) {
            warn!(%id, "Ignoring show for an id that is already tracked");
            return id;
        }

        let notification = spec.into_notification(id, self.options.default_duration_ms);
        self.activity.report_shown(&notification);

        if self.active.len() < self.options.max_visible {
            debug!(%id, kind = %notification.kind, "Notification admitted");
            self.admit(notification);
        } else {
            debug!(%id, queued = self.queued.len() + 1, "Notification queued");
            self.queued.push_back(notification);
        }
        id
    }

    /// Dismisses `id` wherever it is, then promotes from the overflow queue.
    /// Returns whether anything was removed.
    pub fn remove(&mut self, id: Uuid) -> bool {
        self.timers.cancel(id);

        let removed = if let Some(pos) = self.active.iter().position(|n| n.id == id) {
            self.active.remove(pos);
            true
        } else if let Some(pos) = self.queued.iter().position(|n| n.id == id) {
            self.queued.remove(pos);
            true
        } else {
            false
        };

        self.promote();
        removed
    }

    /// Applies a fired auto-dismiss timer.
    pub fn expire(&mut self, id: Uuid) {
        if self.remove(id) {
            debug!(%id, "Notification auto-dismissed");
        }
    }

    pub fn mark_read(&mut self, id: Uuid) -> bool {
        match self.active.iter_mut().find(|n| n.id == id) {
            Some(notification) if !notification.is_read => {
                notification.is_read = true;
                true
            }
            _ => false,
        }
    }

    /// Returns how many notifications flipped to read.
    pub fn mark_all_read(&mut self) -> usize {
        let mut changed = 0;
        for notification in self.active.iter_mut().filter(|n| !n.is_read) {
            notification.is_read = true;
            changed += 1;
        }
        changed
    }

    pub fn clear_all(&mut self) {
        let cancelled = self.timers.cancel_all();
        self.active.clear();
        self.queued.clear();
        debug!(cancelled_timers = cancelled, "Cleared all notifications");
    }

    pub fn active(&self) -> &[Notification] {
        &self.active
    }

    pub fn queued(&self) -> impl Iterator<Item = &Notification> {
        self.queued.iter()
    }

    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    pub fn unread_count(&self) -> usize {
        self.active.iter().filter(|n| !n.is_read).count()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.active.iter().any(|n| n.id == id) || self.queued.iter().any(|n| n.id == id)
    }

    pub fn snapshot(&self) -> NotificationSnapshot {
        NotificationSnapshot {
            notifications: self.active.clone(),
            unread_count: self.unread_count(),
            queued_count: self.queued.len(),
            position: self.options.position,
        }
    }

    fn admit(&mut self, notification: Notification) {
        if !self.options.persist {
            if let Some(after) = notification.dismiss_after() {
                self.timers
                    .arm(notification.id, after, self.expiries.clone());
            }
        }
        self.active.push(notification);
    }

    fn promote(&mut self) {
        while self.active.len() < self.options.max_visible {
            let Some(next) = self.queued.pop_front() else {
                break;
            };
            debug!(id = %next.id, "Promoting queued notification");
            self.admit(next);
        }
    }
}
