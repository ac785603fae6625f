//! Transport abstraction: anything that can open a duplex text connection
//! to a URL and report open/message/close/error events.
//!
//! A [`Transport`] hands out one [`TransportHandle`] per physical connection.
//! Events for that handle flow back through the [`EventSink`] passed to
//! [`Transport::open`], tagged so the connection driver can discard events
//! from handles it has already replaced.
//!
//! Contract: a transport that reports [`TransportEvent::Error`] for a live
//! handle must follow it with [`TransportEvent::Closed`]. Reconnects are
//! driven by close events only.

pub mod websocket;

#[cfg(test)]
pub(crate) mod mock;

use tokio::sync::mpsc;

use crate::error::TransportError;

pub use websocket::WebSocketTransport;

/// Close code used when the peer sent a close frame without a status.
pub const CLOSE_NO_STATUS: u16 = 1005;

/// Close code used when the connection ended without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Close code for a normal, locally initiated close.
pub const CLOSE_NORMAL: u16 = 1000;

/// Opens physical connections.
pub trait Transport: Send + Sync {
    /// Starts opening a connection to `url`.
    ///
    /// Must return without waiting for the handshake. Progress is reported
    /// asynchronously through `events`, never re-entrantly from this call.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the connection cannot even be
    /// attempted (for example, a malformed URL). No events follow an error
    /// returned here.
    fn open(&self, url: &str, events: EventSink) -> Result<Box<dyn TransportHandle>, TransportError>;
}

/// One live physical connection.
pub trait TransportHandle: Send {
    /// Queues a text frame for delivery.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the handle can no longer carry
    /// frames.
    fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Starts closing the connection. Idempotent.
    fn close(&mut self);
}

/// Close status reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// WebSocket close code.
    pub code: u16,
    /// Close reason, possibly empty.
    pub reason: String,
}

impl CloseInfo {
    /// Creates a close status from a code and reason.
    #[must_use]
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

/// Event emitted by a transport handle.
#[derive(Debug)]
pub enum TransportEvent {
    /// The handshake completed.
    Opened,
    /// A text frame arrived.
    Message(String),
    /// The connection is closed; the handle is dead.
    Closed(CloseInfo),
    /// The connection failed. A [`TransportEvent::Closed`] is expected next.
    Error(TransportError),
}

/// Generation-tagged event as delivered to the connection driver.
pub(crate) type TaggedEvent = (u64, TransportEvent);

/// Sending half through which a transport reports events for one handle.
///
/// Cheap to clone. Sends after the connection has been dropped are ignored.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<TaggedEvent>,
}

impl EventSink {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<TaggedEvent>) -> Self {
        Self { generation, tx }
    }

    /// Reports an arbitrary event.
    pub fn emit(&self, event: TransportEvent) {
        let _ = self.tx.send((self.generation, event));
    }

    /// Reports a completed handshake.
    pub fn opened(&self) {
        self.emit(TransportEvent::Opened);
    }

    /// Reports an inbound text frame.
    pub fn message(&self, text: impl Into<String>) {
        self.emit(TransportEvent::Message(text.into()));
    }

    /// Reports that the connection closed.
    pub fn closed(&self, code: u16, reason: impl Into<String>) {
        self.emit(TransportEvent::Closed(CloseInfo::new(code, reason)));
    }

    /// Reports a transport failure.
    pub fn error(&self, error: TransportError) {
        self.emit(TransportEvent::Error(error));
    }
}
