//! WebSocket transport on top of `tokio-tungstenite`.
//!
//! Each handle owns a spawned I/O task. The task performs the handshake,
//! then multiplexes the outbound queue and the inbound stream until either
//! side closes.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;

use super::{CLOSE_ABNORMAL, CLOSE_NO_STATUS, CLOSE_NORMAL, EventSink, Transport, TransportHandle};
use crate::error::TransportError;

/// [`Transport`] that opens `ws://` connections with `tokio-tungstenite`.
///
/// Requires a running tokio runtime when [`Transport::open`] is called.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    /// Creates the transport.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Transport for WebSocketTransport {
    fn open(&self, url: &str, events: EventSink) -> Result<Box<dyn TransportHandle>, TransportError> {
        let request = url
            .into_client_request()
            .map_err(|err| TransportError::InvalidUrl {
                url: url.to_string(),
                reason: err.to_string(),
            })?;
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_socket(request, rx, events));
        Ok(Box::new(WebSocketHandle { outbound: tx }))
    }
}

/// Instruction for the I/O task.
#[derive(Debug)]
enum Outbound {
    Text(String),
    Close,
}

/// Handle to one socket's I/O task. Dropping it closes the socket.
#[derive(Debug)]
struct WebSocketHandle {
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl TransportHandle for WebSocketHandle {
    fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.outbound
            .send(Outbound::Text(text))
            .map_err(|_| TransportError::Closed)
    }

    fn close(&mut self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}

/// Drives one socket from handshake to close, reporting through `events`.
async fn run_socket(request: Request, mut outbound: mpsc::UnboundedReceiver<Outbound>, events: EventSink) {
    let uri = request.uri().to_string();

    // Nothing is queued before open, so any outbound item here is a close
    // (or the handle was dropped) and the handshake is abandoned.
    let connected = tokio::select! {
        result = tokio_tungstenite::connect_async(request) => result,
        _ = outbound.recv() => {
            tracing::debug!(url = %uri, "handshake abandoned by caller");
            events.closed(CLOSE_NORMAL, "closed before open");
            return;
        }
    };

    let stream = match connected {
        Ok((stream, _response)) => stream,
        Err(err) => {
            tracing::debug!(url = %uri, error = %err, "websocket handshake failed");
            events.error(TransportError::from(err));
            events.closed(CLOSE_ABNORMAL, "");
            return;
        }
    };

    events.opened();
    let (mut ws_tx, mut ws_rx) = stream.split();

    loop {
        tokio::select! {
            // Outgoing frame or close request from the connection driver
            item = outbound.recv() => {
                match item {
                    Some(Outbound::Text(text)) => {
                        if let Err(err) = ws_tx.send(Message::text(text)).await {
                            events.error(TransportError::from(err));
                            events.closed(CLOSE_ABNORMAL, "");
                            return;
                        }
                    }
                    Some(Outbound::Close) | None => {
                        if let Err(err) = ws_tx.close().await {
                            tracing::debug!(url = %uri, error = %err, "close handshake failed");
                        }
                        events.closed(CLOSE_NORMAL, "");
                        return;
                    }
                }
            }
            // Incoming frame from the server
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => events.message(text.as_str()),
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => events.message(text),
                        Err(_) => {
                            tracing::debug!(url = %uri, len = bytes.len(), "ignoring non-utf8 binary frame");
                        }
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.as_str().to_string()))
                            .unwrap_or((CLOSE_NO_STATUS, String::new()));
                        events.closed(code, reason);
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        events.error(TransportError::from(err));
                        events.closed(CLOSE_ABNORMAL, "");
                        return;
                    }
                    None => {
                        events.closed(CLOSE_ABNORMAL, "");
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn malformed_url_fails_synchronously() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(1, tx);
        let result = WebSocketTransport::new().open("not a url", sink);
        let Err(TransportError::InvalidUrl { url, .. }) = result else {
            panic!("expected invalid url error");
        };
        assert_eq!(url, "not a url");
    }

    #[tokio::test]
    async fn refused_connection_reports_error_then_close() {
        use crate::transport::TransportEvent;

        // Bind and immediately drop to get a port with nothing listening.
        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind failed");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("no local addr");
        };
        drop(listener);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(7, tx);
        let Ok(_handle) = WebSocketTransport::new().open(&format!("ws://{addr}/ws"), sink) else {
            panic!("open should defer failures to events");
        };

        let Some((generation, first)) = rx.recv().await else {
            panic!("expected an event");
        };
        assert_eq!(generation, 7);
        assert!(matches!(first, TransportEvent::Error(_)));

        let Some((_, second)) = rx.recv().await else {
            panic!("expected a close event");
        };
        let TransportEvent::Closed(info) = second else {
            panic!("expected close after error");
        };
        assert_eq!(info.code, CLOSE_ABNORMAL);
    }
}
