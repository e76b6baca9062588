//! Notification event types carried by the bus and held by stores

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        };
        f.write_str(s)
    }
}

/// What a publisher hands to the bus.
///
/// Carries no id or timestamp: those are assigned by the store that
/// accepts the payload, so the bus stays a pure pass-through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub kind: NotificationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub message: String,
    /// Milliseconds until auto-expiry. `None` or `Some(0)` never expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl NotificationPayload {
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: None,
            message: message.into(),
            duration_ms: None,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Warning, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Info, message)
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the auto-expiry in milliseconds
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Effective expiry; zero means the notification stays until dismissed
    pub fn expiry_ms(&self) -> u64 {
        self.duration_ms.unwrap_or(0)
    }
}

/// Store-assigned notification identifier. Monotonic per store, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub u64);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A notification as held by a store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub message: String,
    /// Zero means no auto-expiry
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Materialize a payload with the given id and the current time
    pub fn from_payload(id: NotificationId, payload: NotificationPayload) -> Self {
        let duration_ms = payload.expiry_ms();
        Self {
            id,
            kind: payload.kind,
            title: payload.title,
            message: payload.message,
            duration_ms,
            timestamp: Utc::now(),
        }
    }

    pub fn expires(&self) -> bool {
        self.duration_ms > 0
    }
}

/// Anything that can announce a notification payload.
///
/// Implemented by [`NotificationBus`](super::NotificationBus); injected as
/// `Arc<dyn NotificationEmitter>` into the call wrapper so tests can swap in
/// a capturing emitter.
pub trait NotificationEmitter: Send + Sync {
    /// Deliver a payload. Must never fail or panic.
    fn emit(&self, payload: NotificationPayload);

    fn emit_success(&self, message: &str, duration_ms: u64) {
        self.emit(NotificationPayload::success(message).with_duration_ms(duration_ms));
    }

    fn emit_error(&self, message: &str, duration_ms: u64) {
        self.emit(NotificationPayload::error(message).with_duration_ms(duration_ms));
    }

    fn emit_warning(&self, message: &str, duration_ms: u64) {
        self.emit(NotificationPayload::warning(message).with_duration_ms(duration_ms));
    }

    fn emit_info(&self, message: &str, duration_ms: u64) {
        self.emit(NotificationPayload::info(message).with_duration_ms(duration_ms));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&NotificationKind::Warning).unwrap(),
            "\"warning\""
        );
        let kind: NotificationKind = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(kind, NotificationKind::Error);
        assert_eq!(NotificationKind::Success.to_string(), "success");
    }

    #[test]
    fn test_payload_absent_duration_never_expires() {
        let payload = NotificationPayload::info("Heads up");
        assert_eq!(payload.expiry_ms(), 0);

        let notification = Notification::from_payload(NotificationId(1), payload);
        assert!(!notification.expires());
    }

    #[test]
    fn test_payload_builder() {
        let payload = NotificationPayload::error("Duplicate name")
            .with_title("Products")
            .with_duration_ms(5000);

        assert_eq!(payload.kind, NotificationKind::Error);
        assert_eq!(payload.title.as_deref(), Some("Products"));
        assert_eq!(payload.expiry_ms(), 5000);
    }

    #[test]
    fn test_payload_optional_fields_omitted() {
        let json = serde_json::to_string(&NotificationPayload::success("Saved")).unwrap();
        assert!(!json.contains("\"title\""));
        assert!(!json.contains("\"duration_ms\""));

        let parsed: NotificationPayload =
            serde_json::from_str(r#"{"kind":"success","message":"Saved"}"#).unwrap();
        assert_eq!(parsed, NotificationPayload::success("Saved"));
    }

    #[test]
    fn test_notification_copies_payload_fields() {
        let payload = NotificationPayload::warning("Low stock")
            .with_title("Inventory")
            .with_duration_ms(4000);
        let n = Notification::from_payload(NotificationId(42), payload);

        assert_eq!(n.id, NotificationId(42));
        assert_eq!(n.kind, NotificationKind::Warning);
        assert_eq!(n.title.as_deref(), Some("Inventory"));
        assert_eq!(n.message, "Low stock");
        assert_eq!(n.duration_ms, 4000);
        assert!(n.expires());
    }
}
