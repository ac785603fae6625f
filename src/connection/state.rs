//! Connection lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`super::Connection`].
///
/// ```text
/// Connecting ──open──▶ Connected ──close──▶ Disconnected ──backoff──▶ Connecting
///      │                   │                     │
///      └──────error────────┴─────────────────────┴──▶ Error ──close──▶ Disconnected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// A transport handle has been opened and the handshake is in flight.
    Connecting,
    /// The transport reported open; frames can be sent.
    Connected,
    /// No live transport. Either waiting for a reconnect or stopped for good.
    Disconnected,
    /// The transport reported a failure. A close normally follows.
    Error,
}

impl ConnectionState {
    /// Returns the lowercase wire name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        }
    }

    /// Returns `true` if outbound frames are accepted in this state.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transition between two distinct [`ConnectionState`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    /// State before the transition.
    pub from: ConnectionState,
    /// State after the transition.
    pub to: ConnectionState,
}

impl StateChange {
    /// Returns `true` if this transition enters `Connected`.
    #[must_use]
    pub const fn is_connect(&self) -> bool {
        self.to.is_connected() && !self.from.is_connected()
    }
}
