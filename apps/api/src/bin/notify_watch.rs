//! Mounts a notification context against a live-update endpoint and logs every
//! store snapshot, standing in for a toast renderer. Ctrl-C unmounts.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use resume_api::config::NotifyConfig;
use resume_api::notifications::{
    ActivityReporter, ActivitySink, HttpActivitySink, LiveUpdateChannel, NoopActivitySink,
    NotificationContext, NotificationSnapshot,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = NotifyConfig::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "resume_api={0},notify_watch={0}",
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let sink: Arc<dyn ActivitySink> = match &config.activity_log_url {
        Some(url) => Arc::new(HttpActivitySink::new(url.as_str())?),
        None => Arc::new(NoopActivitySink),
    };
    let reporter = ActivityReporter::new(sink, config.created_by.clone());

    let channel = LiveUpdateChannel::websocket(config.ws_url.clone())
        .with_reconnect_interval(Duration::from_millis(config.reconnect_ms));

    let context = NotificationContext::mount(config.store_options(), reporter, Some(channel));
    info!(url = %config.ws_url, max_visible = config.max_visible, "Notification watcher mounted");

    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
        }
    };
    log_snapshots(context.subscribe(), ctrl_c).await;

    info!("Unmounting notification watcher");
    context.unmount().await;
    Ok(())
}

/// Logs each snapshot change until `shutdown` resolves or the store goes away.
/// Returns `true` when `shutdown` ended the watch.
async fn log_snapshots(
    mut snapshots: watch::Receiver<NotificationSnapshot>,
    shutdown: impl Future<Output = ()>,
) -> bool {
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => return true,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    warn!("Notification store stopped unexpectedly");
                    return false;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                info!(
                    visible = snapshot.notifications.len(),
                    queued = snapshot.queued_count,
                    unread = snapshot.unread_count,
                    "Notifications updated"
                );
                for n in &snapshot.notifications {
                    info!(id = %n.id, kind = %n.kind, read = n.is_read, "  {}: {}", n.title, n.message);
                }
            }
        }
    }
}
