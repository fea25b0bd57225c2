//! Progress events for a running task
//!
//! The orchestrator publishes through an [`EventEmitter`]; clients follow a
//! session through an [`EventSubscriber`], which survives dropped
//! connections without losing or duplicating events.

mod hub;
mod subscriber;

pub use hub::{EventConfig, EventEmitter, EventHub};
pub use subscriber::{EventSource, EventStream, EventSubscriber};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Info,
    Success,
    Error,
    Screenshot,
    Connected,
    /// Keep-alive; never shown, never stored
    Heartbeat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationEvent {
    pub session_id: String,
    /// Monotonic per session, starting at 1
    #[serde(rename = "id")]
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl AutomationEvent {
    /// Wire frame; heartbeats carry nothing beyond their type
    pub fn to_frame(&self) -> String {
        if self.kind == EventKind::Heartbeat {
            return json!({ "type": "heartbeat" }).to_string();
        }
        serde_json::to_string(self).unwrap_or_else(|_| {
            json!({ "type": self.kind, "message": self.message }).to_string()
        })
    }

    /// Parse a wire frame received for `session_id`
    pub fn from_frame(session_id: &str, frame: &str) -> Result<Self, TransportError> {
        let value: Value =
            serde_json::from_str(frame).map_err(|e| TransportError::Malformed(e.to_string()))?;
        if value.get("type").and_then(Value::as_str) == Some("heartbeat") {
            return Ok(Self {
                session_id: session_id.to_string(),
                seq: 0,
                timestamp: Utc::now(),
                kind: EventKind::Heartbeat,
                message: String::new(),
                data: None,
            });
        }

        let mut value = value;
        if let Some(obj) = value.as_object_mut() {
            obj.entry("sessionId")
                .or_insert_with(|| Value::String(session_id.to_string()));
        }
        serde_json::from_value(value).map_err(|e| TransportError::Malformed(e.to_string()))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("No event channel for session {0}")]
    UnknownSession(String),

    #[error("Subscriber fell behind, {0} events skipped")]
    Lagged(u64),

    #[error("Connection lost: {0}")]
    Disconnected(String),

    #[error("Malformed event frame: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: EventKind) -> AutomationEvent {
        AutomationEvent {
            session_id: "s".into(),
            seq: 7,
            timestamp: Utc::now(),
            kind,
            message: "Navigated".into(),
            data: Some(json!({"url": "https://example.com"})),
        }
    }

    #[test]
    fn test_heartbeat_frame_is_type_only() {
        let frame: Value = serde_json::from_str(&event(EventKind::Heartbeat).to_frame()).unwrap();
        assert_eq!(frame, json!({"type": "heartbeat"}));
    }

    #[test]
    fn test_frame_shape_and_parse() {
        let original = event(EventKind::Success);
        let frame: Value = serde_json::from_str(&original.to_frame()).unwrap();
        assert_eq!(frame["type"], "success");
        assert_eq!(frame["id"], 7);
        assert!(frame["timestamp"].is_string());

        let mut without_session = frame.clone();
        without_session.as_object_mut().unwrap().remove("sessionId");
        let parsed = AutomationEvent::from_frame("s", &without_session.to_string()).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_malformed_frame() {
        assert!(matches!(
            AutomationEvent::from_frame("s", "not json"),
            Err(TransportError::Malformed(_))
        ));
        let heartbeat = AutomationEvent::from_frame("s", r#"{"type":"heartbeat"}"#).unwrap();
        assert_eq!(heartbeat.kind, EventKind::Heartbeat);
    }
}
