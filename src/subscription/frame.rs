//! Subscription wire format: inbound event frames and outbound control frames.
//!
//! Inbound frames are JSON objects naming their event in `event` or `type`
//! and carrying the body in `data` or `payload`:
//!
//! ```json
//! {"type": "task.updated", "payload": {"id": 7}}
//! ```
//!
//! Outbound control frames ask the server to start or stop routing an event
//! to this physical connection:
//!
//! ```json
//! {"action": "subscribe", "event": "task.updated"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::connection::Payload;

/// A decoded inbound JSON frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame(Value);

impl Frame {
    /// Decodes a text frame.
    ///
    /// # Errors
    ///
    /// Returns the [`serde_json::Error`] if `text` is not valid JSON.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text).map(Self)
    }

    /// The `event` field, if it is a string.
    #[must_use]
    pub fn event(&self) -> Option<&str> {
        self.0.get("event").and_then(Value::as_str)
    }

    /// The `type` field, if it is a string.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    /// Returns `true` if the frame names an event at all.
    #[must_use]
    pub fn is_routable(&self) -> bool {
        self.event().is_some() || self.kind().is_some()
    }

    /// Returns `true` if either `event` or `type` equals `name`.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.event() == Some(name) || self.kind() == Some(name)
    }

    /// Extracts the body handed to event handlers: the first non-null of
    /// `data` and `payload`, otherwise the whole frame.
    #[must_use]
    pub fn into_body(self) -> Value {
        let key = ["data", "payload"]
            .into_iter()
            .find(|key| self.0.get(key).is_some_and(|body| !body.is_null()));
        match (key, self.0) {
            (Some(key), Value::Object(mut map)) => map.remove(key).unwrap_or(Value::Null),
            (_, value) => value,
        }
    }
}

/// Requested subscription change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    /// Start routing the event to this connection.
    Subscribe,
    /// Stop routing the event to this connection.
    Unsubscribe,
}

/// Outbound subscribe/unsubscribe request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFrame {
    /// What to do.
    pub action: ControlAction,
    /// Event name the action applies to.
    pub event: String,
}

impl ControlFrame {
    /// Builds a subscribe frame for `event`.
    #[must_use]
    pub fn subscribe(event: impl Into<String>) -> Self {
        Self {
            action: ControlAction::Subscribe,
            event: event.into(),
        }
    }

    /// Builds an unsubscribe frame for `event`.
    #[must_use]
    pub fn unsubscribe(event: impl Into<String>) -> Self {
        Self {
            action: ControlAction::Unsubscribe,
            event: event.into(),
        }
    }
}

impl From<ControlFrame> for Payload {
    fn from(frame: ControlFrame) -> Self {
        Self::Json(serde_json::to_value(&frame).unwrap_or_default())
    }
}
