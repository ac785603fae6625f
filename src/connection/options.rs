//! Construction parameters for a [`super::Connection`].

use std::fmt;
use std::sync::Arc;

use super::{Link, ReconnectPolicy, StateChange};
use crate::error::TransportError;
use crate::transport::{CloseInfo, Transport, WebSocketTransport};

pub(crate) type MessageCallback = Box<dyn FnMut(&str) + Send>;
pub(crate) type OpenCallback = Box<dyn FnMut() + Send>;
pub(crate) type CloseCallback = Box<dyn FnMut(&CloseInfo) + Send>;
pub(crate) type ErrorCallback = Box<dyn FnMut(&TransportError) + Send>;
pub(crate) type StateObserver = Box<dyn FnMut(StateChange, &mut Link<'_>) + Send>;

/// Builder-style options for [`super::Connection::open`].
///
/// Only the URL is required. Reconnects default to 5 attempts starting at
/// 1000 ms, and the transport defaults to [`WebSocketTransport`].
///
/// ```no_run
/// use ws_link::connection::{Connection, ConnectionOptions};
///
/// # async fn demo() {
/// let conn = Connection::open(
///     ConnectionOptions::new("ws://localhost:8000/ws/notifications")
///         .on_message(|text| println!("message: {text}")),
/// );
/// conn.send("hello");
/// # }
/// ```
pub struct ConnectionOptions {
    pub(crate) url: String,
    pub(crate) policy: ReconnectPolicy,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) on_message: Option<MessageCallback>,
    pub(crate) on_open: Option<OpenCallback>,
    pub(crate) on_close: Option<CloseCallback>,
    pub(crate) on_error: Option<ErrorCallback>,
    pub(crate) observers: Vec<StateObserver>,
}

impl ConnectionOptions {
    /// Starts options for `url` with default policy and transport.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            policy: ReconnectPolicy::default(),
            transport: Arc::new(WebSocketTransport::new()),
            on_message: None,
            on_open: None,
            on_close: None,
            on_error: None,
            observers: Vec::new(),
        }
    }

    /// Replaces the whole reconnect policy.
    #[must_use]
    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Turns automatic reconnects on or off.
    #[must_use]
    pub fn reconnect(mut self, enabled: bool) -> Self {
        self.policy.enabled = enabled;
        self
    }

    /// Sets the number of reconnect attempts after a drop.
    #[must_use]
    pub fn reconnect_attempts(mut self, attempts: u32) -> Self {
        self.policy.max_attempts = attempts;
        self
    }

    /// Sets the base reconnect interval.
    #[must_use]
    pub fn reconnect_interval(mut self, interval: std::time::Duration) -> Self {
        self.policy.base_interval = interval;
        self
    }

    /// Uses a custom transport instead of [`WebSocketTransport`].
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Called with every inbound text frame, whatever the current state.
    #[must_use]
    pub fn on_message(mut self, callback: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_message = Some(Box::new(callback));
        self
    }

    /// Called after each successful open.
    #[must_use]
    pub fn on_open(mut self, callback: impl FnMut() + Send + 'static) -> Self {
        self.on_open = Some(Box::new(callback));
        self
    }

    /// Called when a physical connection closes, before any reconnect is
    /// scheduled.
    #[must_use]
    pub fn on_close(mut self, callback: impl FnMut(&CloseInfo) + Send + 'static) -> Self {
        self.on_close = Some(Box::new(callback));
        self
    }

    /// Called on transport failures, including failures to open.
    #[must_use]
    pub fn on_error(mut self, callback: impl FnMut(&TransportError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    /// Registers an observer for state transitions.
    ///
    /// Observers run on the connection driver, in registration order, right
    /// after the state changes and before the matching open/close/error
    /// callback. The [`Link`] lets them send frames that are ordered with
    /// respect to the transition.
    #[must_use]
    pub fn on_state_change(
        mut self,
        observer: impl FnMut(StateChange, &mut Link<'_>) + Send + 'static,
    ) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    /// Returns the target URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the reconnect policy.
    #[must_use]
    pub const fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }
}

impl fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("url", &self.url)
            .field("policy", &self.policy)
            .field("on_message", &self.on_message.is_some())
            .field("on_open", &self.on_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}
