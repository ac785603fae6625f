//! Error types for the connection, transport, and configuration layers.
//!
//! None of these are fatal to the host process. Transport failures surface
//! as [`crate::connection::ConnectionState::Error`] plus the `on_error`
//! callback; the variants here are what those callbacks and the few
//! fallible public calls carry.

use tokio_tungstenite::tungstenite;

/// Failures reported by a [`crate::transport::Transport`] or one of its handles.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The URL could not be turned into a connection request.
    #[error("invalid url {url}: {reason}")]
    InvalidUrl {
        /// URL as supplied by the caller.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Error raised by the underlying WebSocket implementation.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// The handle's I/O task is gone and can no longer carry frames.
    #[error("transport is closed")]
    Closed,

    /// Any other transport-specific failure.
    #[error("transport failure: {0}")]
    Other(String),
}

/// Errors returned by the public [`crate::connection::Connection`] API.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The outbound value could not be encoded as JSON text.
    #[error("failed to serialize outbound frame: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors raised while loading [`crate::config::ClientConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
}
