//! Activity-log reporting for shown notifications.
//!
//! Reporting is fire-and-forget: the entry is appended on a spawned task and
//! any failure is logged and dropped. Store state never depends on it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use super::model::Notification;

pub const NOTIFICATION_SHOW: &str = "NOTIFICATION_SHOW";

#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("activity log rejected entry (status {status}): {body}")]
    Rejected { status: u16, body: String },
}

/// One activity-log record, in the wire shape the activity endpoint accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    #[serde(rename = "type")]
    pub activity_type: String,
    pub description: String,
    #[serde(default)]
    pub metadata: Value,
    pub created_by: String,
    pub timestamp: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn notification_shown(notification: &Notification, created_by: &str) -> Self {
        Self {
            activity_type: NOTIFICATION_SHOW.to_string(),
            description: format!(
                "Showed {} notification: {}",
                notification.kind, notification.title
            ),
            metadata: json!({
                "notificationId": notification.id,
                "kind": notification.kind,
                "metadata": notification.metadata,
            }),
            created_by: created_by.to_string(),
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
pub trait ActivitySink: Send + Sync {
    async fn append(&self, entry: &ActivityEntry) -> Result<(), ActivityError>;
}

/// Posts entries as JSON to the activity-log endpoint.
pub struct HttpActivitySink {
    client: Client,
    endpoint: String,
}

impl HttpActivitySink {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ActivityError> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(10)).build()?,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl ActivitySink for HttpActivitySink {
    async fn append(&self, entry: &ActivityEntry) -> Result<(), ActivityError> {
        let response = self.client.post(&self.endpoint).json(entry).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ActivityError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Used when no activity-log endpoint is configured.
pub struct NoopActivitySink;

#[async_trait]
impl ActivitySink for NoopActivitySink {
    async fn append(&self, _entry: &ActivityEntry) -> Result<(), ActivityError> {
        Ok(())
    }
}

/// Stamps entries with the reporting principal and ships them off the
/// caller's task.
#[derive(Clone)]
pub struct ActivityReporter {
    sink: Arc<dyn ActivitySink>,
    created_by: String,
}

impl ActivityReporter {
    pub fn new(sink: Arc<dyn ActivitySink>, created_by: impl Into<String>) -> Self {
        Self {
            sink,
            created_by: created_by.into(),
        }
    }

    pub fn noop() -> Self {
        Self::new(Arc::new(NoopActivitySink), "system")
    }

    pub fn report_shown(&self, notification: &Notification) {
        let entry = ActivityEntry::notification_shown(notification, &self.created_by);
        let sink = Arc::clone(&self.sink);
        let notification_id = notification.id;
        tokio::spawn(async move {
            match sink.append(&entry).await {
                Ok(()) => debug!(%notification_id, "Logged notification activity"),
                Err(e) => warn!(%notification_id, error = %e, "Failed to log notification activity"),
            }
        });
    }
}
