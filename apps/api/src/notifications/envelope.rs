//! Push envelopes exchanged over the live-update socket.
//!
//! Wire shape: `{type, notificationType?, title?, message?, metadata?}`.
//! The server side builds these with [`PushEnvelope::notification`]; the
//! client side decodes raw frames with [`decode`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::metadata::Metadata;
use super::model::{NotificationKind, NotificationSpec};

pub const NOTIFICATION_EVENT: &str = "notification";

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("notification envelope is missing `{0}`")]
    MissingField(&'static str),

    #[error("unknown notification type `{0}`")]
    UnknownKind(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl PushEnvelope {
    pub fn notification(
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        metadata: Option<Value>,
    ) -> Self {
        Self {
            event_type: NOTIFICATION_EVENT.to_string(),
            notification_type: Some(kind.as_str().to_string()),
            title: Some(title.into()),
            message: Some(message.into()),
            metadata,
        }
    }
}

/// A validated `notification` push, ready to become a `show()` call.
#[derive(Debug, Clone, PartialEq)]
pub struct PushNotification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub metadata: Metadata,
}

impl PushNotification {
    /// Pushes carry no duration, so the store default applies.
    pub fn into_spec(self) -> NotificationSpec {
        NotificationSpec::new(self.kind, self.title, self.message).with_metadata(self.metadata)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Notification(PushNotification),
    /// Any other event type; carries the type for logging.
    Ignored(String),
}

pub fn decode(text: &str) -> Result<Inbound, EnvelopeError> {
    let envelope: PushEnvelope = serde_json::from_str(text)?;
    if envelope.event_type != NOTIFICATION_EVENT {
        return Ok(Inbound::Ignored(envelope.event_type));
    }

    let kind = envelope
        .notification_type
        .ok_or(EnvelopeError::MissingField("notificationType"))?;
    let kind = kind.parse::<NotificationKind>().map_err(EnvelopeError::UnknownKind)?;
    let title = envelope.title.ok_or(EnvelopeError::MissingField("title"))?;
    let message = envelope.message.ok_or(EnvelopeError::MissingField("message"))?;

    Ok(Inbound::Notification(PushNotification {
        kind,
        title,
        message,
        metadata: envelope.metadata.map(Metadata::from_json).unwrap_or_default(),
    }))
}
