use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::metadata::Metadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Success => "success",
            NotificationKind::Error => "error",
            NotificationKind::Warning => "warning",
            NotificationKind::Info => "info",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(NotificationKind::Success),
            "error" => Ok(NotificationKind::Error),
            "warning" => Ok(NotificationKind::Warning),
            "info" => Ok(NotificationKind::Info),
            other => Err(other.to_string()),
        }
    }
}

/// Follow-up offered on a notification. `effect` is an action key the
/// renderer resolves (a route, a command name); the store never reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub label: String,
    pub effect: String,
}

impl NotificationAction {
    pub fn new(label: impl Into<String>, effect: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            effect: effect.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    /// `None` means the notification stays until dismissed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<NotificationAction>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Notification {
    /// Auto-dismiss delay, if the notification has one.
    pub fn dismiss_after(&self) -> Option<Duration> {
        self.duration_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

/// What a caller asks for; the store turns it into a [`Notification`].
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationSpec {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// `None` falls back to the store's default duration, `Some(0)` persists.
    pub duration_ms: Option<u64>,
    pub action: Option<NotificationAction>,
    pub metadata: Metadata,
}

impl NotificationSpec {
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            duration_ms: None,
            action: None,
            metadata: Metadata::default(),
        }
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, title, message)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, title, message)
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Warning, title, message)
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Info, title, message)
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn persistent(self) -> Self {
        self.with_duration_ms(0)
    }

    pub fn with_action(mut self, action: NotificationAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Materializes the spec. A resolved duration of zero is stored as `None`.
    pub(crate) fn into_notification(self, id: Uuid, default_duration_ms: u64) -> Notification {
        let duration_ms = self.duration_ms.unwrap_or(default_duration_ms);
        Notification {
            id,
            kind: self.kind,
            title: self.title,
            message: self.message,
            created_at: Utc::now(),
            duration_ms: (duration_ms > 0).then_some(duration_ms),
            is_read: false,
            action: self.action,
            metadata: self.metadata,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToastPosition {
    #[default]
    TopRight,
    TopLeft,
    BottomRight,
    BottomLeft,
}

impl FromStr for ToastPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top-right" => Ok(ToastPosition::TopRight),
            "top-left" => Ok(ToastPosition::TopLeft),
            "bottom-right" => Ok(ToastPosition::BottomRight),
            "bottom-left" => Ok(ToastPosition::BottomLeft),
            other => Err(other.to_string()),
        }
    }
}

/// Read model handed to the renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSnapshot {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
    pub queued_count: usize,
    pub position: ToastPosition,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_lowercase() {
        assert_eq!(serde_json::to_string(&NotificationKind::Warning).unwrap(), "\"warning\"");
        assert_eq!("error".parse::<NotificationKind>(), Ok(NotificationKind::Error));
        assert!("fatal".parse::<NotificationKind>().is_err());
    }

    #[test]
    fn test_missing_duration_uses_default() {
        let n = NotificationSpec::info("Tip", "Try the modern template")
            .into_notification(Uuid::new_v4(), 5000);
        assert_eq!(n.duration_ms, Some(5000));
        assert_eq!(n.dismiss_after(), Some(Duration::from_millis(5000)));
        assert!(!n.is_read);
    }

    #[test]
    fn test_zero_duration_persists() {
        let n = NotificationSpec::error("T", "M")
            .persistent()
            .into_notification(Uuid::new_v4(), 5000);
        assert_eq!(n.duration_ms, None);
        assert_eq!(n.dismiss_after(), None);
    }

    #[test]
    fn test_zero_default_duration_persists() {
        let n = NotificationSpec::success("Saved", "Resume saved").into_notification(Uuid::new_v4(), 0);
        assert_eq!(n.duration_ms, None);
    }

    #[test]
    fn test_notification_serializes_camel_case() {
        let n = NotificationSpec::success("Saved", "OK")
            .with_action(NotificationAction::new("Undo", "resume.undo"))
            .into_notification(Uuid::new_v4(), 3000);
        let value = serde_json::to_value(&n).unwrap();
        assert_eq!(value["kind"], "success");
        assert_eq!(value["durationMs"], 3000);
        assert_eq!(value["isRead"], false);
        assert_eq!(value["action"]["effect"], "resume.undo");
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn test_position_parses_kebab_case() {
        assert_eq!("bottom-left".parse::<ToastPosition>(), Ok(ToastPosition::BottomLeft));
        assert_eq!(ToastPosition::default(), ToastPosition::TopRight);
    }
}
