//! Connection handle and the driver task behind it.
//!
//! [`Connection::open`] spawns one driver task per connection. The driver
//! owns the transport handle, the lifecycle state, the reconnect counter
//! and the pending reconnect deadline; nothing else touches them. The
//! handle talks to the driver over an unbounded command channel, and reads
//! state through `watch` channels.
//!
//! Transport events are tagged with the generation of the handle that
//! produced them. Every `connect()` bumps the generation, so events from a
//! replaced handle are discarded instead of corrupting the new connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use super::link::{SendStats, transmit};
use super::options::{
    CloseCallback, ErrorCallback, MessageCallback, OpenCallback, StateObserver,
};
use super::{ConnectionId, ConnectionOptions, ConnectionState, Link, Payload, ReconnectPolicy, StateChange};
use crate::error::{ConnectionError, TransportError};
use crate::transport::{EventSink, TaggedEvent, Transport, TransportEvent, TransportHandle};

/// Longest delay the driver will actually arm a timer for (~100 years).
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// Most recent inbound frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboundMessage {
    /// Raw frame text.
    pub data: String,
    /// When the driver received it.
    pub received_at: DateTime<Utc>,
}

type LinkFn = Box<dyn FnOnce(&mut Link<'_>) + Send>;

/// Requests from the handle to the driver.
enum Command {
    Send(Payload),
    Disconnect,
    Reconnect,
    WithLink(LinkFn),
}

/// State shared between handle and driver.
#[derive(Debug)]
struct Shared {
    /// Current intent to stay connected. Cleared synchronously by
    /// `disconnect()` so an already-due timer cannot reconnect.
    should_reconnect: AtomicBool,
    /// Read-only mirror of the driver's reconnect counter.
    attempts: AtomicU32,
    stats: SendStats,
}

/// Handle to one resilient connection.
///
/// Dropping the handle tears the connection down: pending reconnects are
/// cancelled and the live transport is closed.
pub struct Connection {
    id: ConnectionId,
    url: Arc<str>,
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionState>,
    last_message: watch::Receiver<Option<InboundMessage>>,
    shared: Arc<Shared>,
}

impl Connection {
    /// Opens a connection and starts its driver on the current tokio runtime.
    ///
    /// Returns immediately in `Connecting` state. A transport that refuses
    /// to even start leaves the connection in `Error`; nothing is thrown to
    /// the caller.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn open(options: ConnectionOptions) -> Self {
        let id = ConnectionId::new();
        let url: Arc<str> = Arc::from(options.url.as_str());
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionState::Connecting);
        let (last_message_tx, last_message_rx) = watch::channel(None);
        let shared = Arc::new(Shared {
            should_reconnect: AtomicBool::new(true),
            attempts: AtomicU32::new(0),
            stats: SendStats::default(),
        });

        let driver = Driver {
            id,
            url: Arc::clone(&url),
            policy: options.policy,
            transport: options.transport,
            handle: None,
            generation: 0,
            state: ConnectionState::Connecting,
            reconnect_count: 0,
            pending_reconnect: None,
            on_message: options.on_message,
            on_open: options.on_open,
            on_close: options.on_close,
            on_error: options.on_error,
            observers: options.observers,
            status_tx,
            last_message_tx,
            events_tx,
            shared: Arc::clone(&shared),
        };
        tokio::spawn(driver.run(commands_rx, events_rx));

        Self {
            id,
            url,
            commands: commands_tx,
            status: status_rx,
            last_message: last_message_rx,
            shared,
        }
    }

    /// Identifier shared by every physical socket of this connection.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Target URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> ConnectionState {
        *self.status.borrow()
    }

    /// Receiver that observes every published state.
    ///
    /// Intermediate states can be coalesced; use
    /// [`ConnectionOptions::on_state_change`] to see every transition.
    #[must_use]
    pub fn status_changes(&self) -> watch::Receiver<ConnectionState> {
        self.status.clone()
    }

    /// Most recent inbound frame, if any has arrived.
    #[must_use]
    pub fn last_message(&self) -> Option<InboundMessage> {
        self.last_message.borrow().clone()
    }

    /// Reconnect attempts made since the last successful open.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::Relaxed)
    }

    /// Frames dropped because the connection was not open.
    #[must_use]
    pub fn dropped_sends(&self) -> u64 {
        self.shared.stats.dropped()
    }

    /// Sends a frame if connected; otherwise drops it with a warning.
    ///
    /// Frames are never queued for a later connection.
    pub fn send(&self, payload: impl Into<Payload>) {
        self.command(Command::Send(payload.into()));
    }

    /// Serializes `value` to JSON and sends it like [`Connection::send`].
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Serialize`] if `value` cannot be encoded.
    pub fn send_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), ConnectionError> {
        let text = serde_json::to_string(value)?;
        self.send(text);
        Ok(())
    }

    /// Closes the connection and stops automatic reconnects.
    ///
    /// A reconnect that is already scheduled will not fire, even if its
    /// deadline has passed by the time the driver sees this request.
    pub fn disconnect(&self) {
        self.shared.should_reconnect.store(false, Ordering::SeqCst);
        self.command(Command::Disconnect);
    }

    /// Drops the current connection and opens a fresh one with a full
    /// attempt budget, even after the budget was exhausted.
    pub fn reconnect(&self) {
        self.shared.should_reconnect.store(false, Ordering::SeqCst);
        self.command(Command::Reconnect);
    }

    /// Runs `f` on the driver with access to the live connection.
    ///
    /// The closure observes the exact driver state and cannot interleave
    /// with transport events or state observers.
    pub fn with_link(&self, f: impl FnOnce(&mut Link<'_>) + Send + 'static) {
        self.command(Command::WithLink(Box::new(f)));
    }

    fn command(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!(connection_id = %self.id, "connection driver has stopped");
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // The driver tears down once the command channel closes.
        self.shared.should_reconnect.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// A scheduled reconnect. Dropping it cancels the attempt.
#[derive(Debug, Clone, Copy)]
struct PendingReconnect {
    deadline: Instant,
}

/// Owns everything mutable about one connection.
struct Driver {
    id: ConnectionId,
    url: Arc<str>,
    policy: ReconnectPolicy,
    transport: Arc<dyn Transport>,
    handle: Option<Box<dyn TransportHandle>>,
    generation: u64,
    state: ConnectionState,
    reconnect_count: u32,
    pending_reconnect: Option<PendingReconnect>,
    on_message: Option<MessageCallback>,
    on_open: Option<OpenCallback>,
    on_close: Option<CloseCallback>,
    on_error: Option<ErrorCallback>,
    observers: Vec<StateObserver>,
    status_tx: watch::Sender<ConnectionState>,
    last_message_tx: watch::Sender<Option<InboundMessage>>,
    events_tx: mpsc::UnboundedSender<TaggedEvent>,
    shared: Arc<Shared>,
}

/// Resolves at `deadline`, or never when nothing is scheduled.
async fn reconnect_due(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl Driver {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<TaggedEvent>,
    ) {
        tracing::debug!(connection_id = %self.id, url = %self.url, "connection driver started");
        self.connect();

        loop {
            let due = self.pending_reconnect.map(|p| p.deadline);
            tokio::select! {
                biased;
                // Caller requests take priority so a disconnect beats a due timer
                command = commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command),
                        None => break,
                    }
                }
                // Event from the transport handle
                Some((generation, event)) = events.recv() => {
                    self.handle_event(generation, event);
                }
                // Scheduled reconnect
                () = reconnect_due(due) => {
                    self.fire_reconnect();
                }
            }
        }

        self.teardown();
        tracing::debug!(connection_id = %self.id, "connection driver stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Send(payload) => {
                transmit(self.state, &mut self.handle, &self.shared.stats, payload.into_text());
            }
            Command::Disconnect => self.disconnect(),
            Command::Reconnect => {
                self.disconnect();
                self.shared.should_reconnect.store(true, Ordering::SeqCst);
                self.set_reconnect_count(0);
                tracing::info!(connection_id = %self.id, url = %self.url, "manual reconnect");
                self.connect();
            }
            Command::WithLink(f) => {
                let mut link = Link {
                    state: self.state,
                    handle: &mut self.handle,
                    stats: &self.shared.stats,
                };
                f(&mut link);
            }
        }
    }

    fn handle_event(&mut self, generation: u64, event: TransportEvent) {
        if generation != self.generation {
            tracing::trace!(
                connection_id = %self.id,
                generation,
                current = self.generation,
                "ignoring event from replaced transport"
            );
            return;
        }
        // Once the handle is gone (closed by the caller, or already reported
        // closed), only its close notification is still delivered.
        if self.handle.is_none() && !matches!(event, TransportEvent::Closed(_)) {
            tracing::trace!(connection_id = %self.id, "ignoring event from closed transport");
            return;
        }

        match event {
            TransportEvent::Opened => {
                tracing::info!(connection_id = %self.id, url = %self.url, "connected");
                self.set_state(ConnectionState::Connected);
                self.set_reconnect_count(0);
                if let Some(on_open) = self.on_open.as_mut() {
                    on_open();
                }
            }
            TransportEvent::Message(text) => {
                self.last_message_tx.send_replace(Some(InboundMessage {
                    data: text.clone(),
                    received_at: Utc::now(),
                }));
                // A message implies connectivity; deliver whatever the state.
                if let Some(on_message) = self.on_message.as_mut() {
                    on_message(&text);
                }
            }
            TransportEvent::Closed(info) => {
                tracing::info!(
                    connection_id = %self.id,
                    code = info.code,
                    reason = %info.reason,
                    "connection closed"
                );
                self.handle = None;
                self.set_state(ConnectionState::Disconnected);
                if let Some(on_close) = self.on_close.as_mut() {
                    on_close(&info);
                }
                self.schedule_reconnect();
            }
            TransportEvent::Error(err) => {
                tracing::error!(connection_id = %self.id, error = %err, "connection error");
                self.set_state(ConnectionState::Error);
                self.report_error(&err);
            }
        }
    }

    /// Retires any previous handle and opens a new one.
    fn connect(&mut self) {
        self.close_handle();
        self.generation = self.generation.wrapping_add(1);
        self.set_state(ConnectionState::Connecting);

        let sink = EventSink::new(self.generation, self.events_tx.clone());
        match self.transport.open(&self.url, sink) {
            Ok(handle) => self.handle = Some(handle),
            Err(err) => {
                tracing::error!(connection_id = %self.id, url = %self.url, error = %err, "failed to open connection");
                self.set_state(ConnectionState::Error);
                self.report_error(&err);
            }
        }
    }

    fn schedule_reconnect(&mut self) {
        if !self.shared.should_reconnect.load(Ordering::SeqCst) {
            tracing::debug!(connection_id = %self.id, "reconnect suppressed after disconnect");
            return;
        }
        if !self.policy.enabled {
            return;
        }
        if !self.policy.allows(self.reconnect_count) {
            tracing::warn!(
                connection_id = %self.id,
                max_attempts = self.policy.max_attempts,
                "reconnect attempts exhausted, staying disconnected"
            );
            return;
        }

        let delay = self.policy.delay_for(self.reconnect_count);
        tracing::info!(
            connection_id = %self.id,
            attempt = self.reconnect_count + 1,
            max_attempts = self.policy.max_attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "scheduling reconnect"
        );
        self.pending_reconnect = Some(PendingReconnect {
            deadline: Instant::now() + delay.min(FAR_FUTURE),
        });
    }

    fn fire_reconnect(&mut self) {
        self.pending_reconnect = None;
        if !self.shared.should_reconnect.load(Ordering::SeqCst) {
            return;
        }
        self.set_reconnect_count(self.reconnect_count.saturating_add(1));
        self.connect();
    }

    fn disconnect(&mut self) {
        self.shared.should_reconnect.store(false, Ordering::SeqCst);
        self.pending_reconnect = None;
        self.close_handle();
        self.set_state(ConnectionState::Disconnected);
    }

    fn teardown(&mut self) {
        self.disconnect();
        // Late events from the closed handle have nowhere to go.
        self.generation = self.generation.wrapping_add(1);
    }

    fn close_handle(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.close();
        }
    }

    fn set_reconnect_count(&mut self, count: u32) {
        self.reconnect_count = count;
        self.shared.attempts.store(count, Ordering::Relaxed);
    }

    fn report_error(&mut self, err: &TransportError) {
        if let Some(on_error) = self.on_error.as_mut() {
            on_error(err);
        }
    }

    /// Moves to `to`, publishing and notifying observers if it differs.
    fn set_state(&mut self, to: ConnectionState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        self.status_tx.send_replace(to);
        tracing::debug!(connection_id = %self.id, %from, %to, "state changed");

        let change = StateChange { from, to };
        for observer in &mut self.observers {
            let mut link = Link {
                state: to,
                handle: &mut self.handle,
                stats: &self.shared.stats,
            };
            observer(change, &mut link);
        }
    }
}
