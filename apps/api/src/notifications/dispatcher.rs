//! Dispatcher: the single entry point that turns triggers into store
//! operations.
//!
//! Local callers and the live-update channel both go through here. The
//! dispatcher holds no state of its own; it enqueues commands for the store's
//! loop, which applies them in the order they were sent.

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use super::envelope::PushNotification;
use super::model::NotificationSpec;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreCommand {
    Show { id: Uuid, spec: NotificationSpec },
    Remove(Uuid),
    MarkRead(Uuid),
    MarkAllRead,
    ClearAll,
}

#[derive(Clone)]
pub struct Dispatcher {
    commands: mpsc::UnboundedSender<StoreCommand>,
}

impl Dispatcher {
    pub fn new(commands: mpsc::UnboundedSender<StoreCommand>) -> Self {
        Self { commands }
    }

    /// Queues a notification and returns its id immediately, whether or not
    /// it ends up visible.
    pub fn show(&self, spec: NotificationSpec) -> Uuid {
        let id = Uuid::new_v4();
        self.send(StoreCommand::Show { id, spec });
        id
    }

    pub fn success(&self, title: impl Into<String>, message: impl Into<String>) -> Uuid {
        self.show(NotificationSpec::success(title, message))
    }

    pub fn error(&self, title: impl Into<String>, message: impl Into<String>) -> Uuid {
        self.show(NotificationSpec::error(title, message))
    }

    pub fn warning(&self, title: impl Into<String>, message: impl Into<String>) -> Uuid {
        self.show(NotificationSpec::warning(title, message))
    }

    pub fn info(&self, title: impl Into<String>, message: impl Into<String>) -> Uuid {
        self.show(NotificationSpec::info(title, message))
    }

    pub fn remove(&self, id: Uuid) {
        self.send(StoreCommand::Remove(id));
    }

    pub fn mark_read(&self, id: Uuid) {
        self.send(StoreCommand::MarkRead(id));
    }

    pub fn mark_all_read(&self) {
        self.send(StoreCommand::MarkAllRead);
    }

    pub fn clear_all(&self) {
        self.send(StoreCommand::ClearAll);
    }

    /// Exactly one `show` per inbound notification push.
    pub fn dispatch_push(&self, push: PushNotification) -> Uuid {
        self.show(push.into_spec())
    }

    fn send(&self, command: StoreCommand) {
        if let Err(e) = self.commands.send(command) {
            debug!(command = ?e.0, "Notification store is unmounted, dropping command");
        }
    }
}
