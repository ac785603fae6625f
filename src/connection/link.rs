//! Outbound payloads and the in-driver send capability.

use std::sync::atomic::{AtomicU64, Ordering};

use super::ConnectionState;
use crate::transport::TransportHandle;

/// Outbound frame body: raw text, or a JSON value serialized on send.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Sent as-is.
    Text(String),
    /// Serialized to compact JSON text.
    Json(serde_json::Value),
}

impl Payload {
    /// Returns the text that goes on the wire.
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Json(value) => value.to_string(),
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

/// Counters shared between a connection handle and its driver.
#[derive(Debug, Default)]
pub(crate) struct SendStats {
    dropped: AtomicU64,
}

impl SendStats {
    pub(crate) fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Writes `text` to the live handle if the connection is open, otherwise
/// drops it with a warning. Frames are never buffered.
pub(crate) fn transmit(
    state: ConnectionState,
    handle: &mut Option<Box<dyn TransportHandle>>,
    stats: &SendStats,
    text: String,
) -> bool {
    match handle {
        Some(handle) if state.is_connected() => match handle.send(text) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, "transport rejected outbound frame");
                stats.record_drop();
                false
            }
        },
        _ => {
            tracing::warn!(state = %state, bytes = text.len(), "connection not open, frame dropped");
            stats.record_drop();
            false
        }
    }
}

/// Access to a connection from inside its driver.
///
/// Handed to state observers and [`super::Connection::with_link`] closures.
/// Decisions made through a `Link` see the exact state the driver is in, and
/// frames sent through it go out before any later transport event is
/// processed.
pub struct Link<'a> {
    pub(crate) state: ConnectionState,
    pub(crate) handle: &'a mut Option<Box<dyn TransportHandle>>,
    pub(crate) stats: &'a SendStats,
}

impl Link<'_> {
    /// Current connection state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns `true` if frames sent now would reach the transport.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Sends a frame, or drops it with a warning when not connected.
    ///
    /// Returns `true` if the transport accepted the frame.
    pub fn send(&mut self, payload: impl Into<Payload>) -> bool {
        transmit(self.state, self.handle, self.stats, payload.into().into_text())
    }
}

impl std::fmt::Debug for Link<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("state", &self.state)
            .field("has_handle", &self.handle.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_payload_serializes_compactly() {
        let payload = Payload::from(serde_json::json!({"a": 1}));
        assert_eq!(payload.into_text(), r#"{"a":1}"#);
    }

    #[test]
    fn text_payload_passes_through() {
        assert_eq!(Payload::from("hello").into_text(), "hello");
    }

    #[test]
    fn transmit_without_handle_counts_drop() {
        let stats = SendStats::default();
        let mut handle = None;
        let sent = transmit(
            ConnectionState::Connected,
            &mut handle,
            &stats,
            "x".to_string(),
        );
        assert!(!sent);
        assert_eq!(stats.dropped(), 1);
    }
}
