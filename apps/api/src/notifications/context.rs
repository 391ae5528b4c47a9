//! Notification Context: the explicitly mounted owner of the store loop and
//! the live-update channel.
//!
//! The store lives on exactly one task. Dispatcher commands and timer
//! expiries are posted to that task and applied one at a time, so store state
//! needs no lock. Renderers observe it through a `watch` snapshot.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::activity::ActivityReporter;
use super::channel::{ChannelHandle, LiveUpdateChannel};
use super::dispatcher::{Dispatcher, StoreCommand};
use super::model::NotificationSnapshot;
use super::store::{ExpiryReceiver, NotificationStore, StoreOptions};

pub struct NotificationContext {
    dispatcher: Dispatcher,
    snapshots: watch::Receiver<NotificationSnapshot>,
    shutdown: CancellationToken,
    store_task: JoinHandle<()>,
    channel: Option<ChannelHandle>,
}

impl NotificationContext {
    /// Starts the store loop and, when given, opens the live-update channel.
    pub fn mount(
        options: StoreOptions,
        activity: ActivityReporter,
        live_updates: Option<LiveUpdateChannel>,
    ) -> Self {
        let (store, expiries) = NotificationStore::new(options, activity);
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshots) = watch::channel(store.snapshot());
        let shutdown = CancellationToken::new();

        let store_task = tokio::spawn(run_store(
            store,
            commands,
            expiries,
            snapshot_tx,
            shutdown.clone(),
        ));

        let dispatcher = Dispatcher::new(command_tx);
        let channel = live_updates.map(|channel| {
            info!(url = channel.url(), "Opening live-update channel");
            channel.open(dispatcher.clone())
        });

        Self {
            dispatcher,
            snapshots,
            shutdown,
            store_task,
            channel,
        }
    }

    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<NotificationSnapshot> {
        self.snapshots.clone()
    }

    pub fn snapshot(&self) -> NotificationSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn channel(&self) -> Option<&ChannelHandle> {
        self.channel.as_ref()
    }

    /// Closes the channel without reconnecting, then stops the store loop and
    /// cancels every outstanding auto-dismiss timer.
    pub async fn unmount(self) {
        if let Some(channel) = self.channel {
            channel.close().await;
        }
        self.shutdown.cancel();
        if let Err(e) = self.store_task.await {
            warn!(error = %e, "Notification store task ended abnormally");
        }
    }
}

async fn run_store(
    mut store: NotificationStore,
    mut commands: mpsc::UnboundedReceiver<StoreCommand>,
    mut expiries: ExpiryReceiver,
    snapshots: watch::Sender<NotificationSnapshot>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            Some(command) = commands.recv() => apply(&mut store, command),
            Some(id) = expiries.recv() => store.expire(id),
            else => break,
        }
        snapshots.send_replace(store.snapshot());
    }

    store.clear_all();
    snapshots.send_replace(store.snapshot());
    debug!("Notification store loop stopped");
}

fn apply(store: &mut NotificationStore, command: StoreCommand) {
    match command {
        StoreCommand::Show { id, spec } => {
            store.show_with_id(id, spec);
        }
        StoreCommand::Remove(id) => {
            store.remove(id);
        }
        StoreCommand::MarkRead(id) => {
            store.mark_read(id);
        }
        StoreCommand::MarkAllRead => {
            store.mark_all_read();
        }
        StoreCommand::ClearAll => store.clear_all(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::notifications::channel::{ChannelError, Connection, Connector};
    use crate::notifications::model::{NotificationKind, NotificationSpec};

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    fn mount(max_visible: usize) -> NotificationContext {
        NotificationContext::mount(
            StoreOptions::default().with_max_visible(max_visible),
            ActivityReporter::noop(),
            None,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_show_is_visible_in_snapshot() {
        let context = mount(5);
        let dispatcher = context.dispatcher();
        let id = dispatcher.success("Saved", "Resume saved");
        settle().await;

        let snapshot = context.snapshot();
        assert_eq!(snapshot.notifications.len(), 1);
        assert_eq!(snapshot.notifications[0].id, id);
        assert_eq!(snapshot.notifications[0].kind, NotificationKind::Success);
        assert_eq!(snapshot.unread_count, 1);

        context.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_apply_in_order() {
        let context = mount(2);
        let dispatcher = context.dispatcher();
        let a = dispatcher.show(NotificationSpec::info("A", "").persistent());
        dispatcher.show(NotificationSpec::info("B", "").persistent());
        dispatcher.show(NotificationSpec::info("C", "").persistent());
        dispatcher.remove(a);
        dispatcher.mark_all_read();
        settle().await;

        let snapshot = context.snapshot();
        let titles: Vec<_> = snapshot.notifications.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "C"]);
        assert_eq!(snapshot.unread_count, 0);
        assert_eq!(snapshot.queued_count, 0);

        context.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_dismiss_runs_through_loop() {
        let context = mount(5);
        let mut snapshots = context.subscribe();
        context
            .dispatcher()
            .show(NotificationSpec::warning("Heads up", "").with_duration_ms(1500));
        settle().await;
        snapshots.borrow_and_update();
        assert_eq!(context.snapshot().notifications.len(), 1);

        tokio::time::advance(Duration::from_millis(1500)).await;
        settle().await;
        assert!(snapshots.has_changed().unwrap());
        assert!(context.snapshot().notifications.is_empty());

        context.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_clears_store() {
        let context = mount(5);
        let snapshots = context.subscribe();
        context.dispatcher().info("A", "");
        settle().await;

        context.unmount().await;
        assert!(snapshots.borrow().notifications.is_empty());
    }

    #[derive(Default)]
    struct RefusingConnector {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl Connector for RefusingConnector {
        async fn connect(&self, _url: &str) -> Result<Box<dyn Connection>, ChannelError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(ChannelError::Connect("refused".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_stops_channel_reconnects() {
        let connector = Arc::new(RefusingConnector::default());
        let channel = LiveUpdateChannel::new("ws://test", connector.clone());
        let context = NotificationContext::mount(
            StoreOptions::default(),
            ActivityReporter::noop(),
            Some(channel),
        );
        settle().await;
        assert!(context.channel().is_some_and(|c| !c.is_connected()));

        context.unmount().await;
        tokio::time::advance(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
    }
}
