//! Event subscription on top of one [`Connection`].
//!
//! A [`Subscription`] opens its own connection, filters inbound frames down
//! to one event name, and keeps the server-side subscription in step with
//! the connection: every transition into `Connected` while enabled sends a
//! subscribe frame, and disabling or dropping a connected subscription sends
//! an unsubscribe frame. The server only remembers subscriptions per
//! physical socket, so every reconnect subscribes again.
//!
//! All subscribe/unsubscribe decisions run on the connection driver, so a
//! control frame is never duplicated or lost to a race with a state change.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;

use super::frame::{ControlFrame, Frame};
use crate::connection::{Connection, ConnectionOptions, ConnectionState, ReconnectPolicy};
use crate::transport::{CloseInfo, Transport};

type EventHandler = Box<dyn FnMut(Value) + Send>;
type RawHandler = Box<dyn FnMut(&str) + Send>;
type CloseHandler = Box<dyn FnMut(&CloseInfo) + Send>;

/// Options for [`Subscription::open`].
pub struct SubscriptionOptions {
    url: String,
    event: String,
    handler: EventHandler,
    on_unrouted: Option<RawHandler>,
    on_close: Option<CloseHandler>,
    enabled: bool,
    policy: ReconnectPolicy,
    transport: Option<Arc<dyn Transport>>,
}

impl SubscriptionOptions {
    /// Subscribes `handler` to `event` on `url`. Enabled by default.
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        event: impl Into<String>,
        handler: impl FnMut(Value) + Send + 'static,
    ) -> Self {
        Self {
            url: url.into(),
            event: event.into(),
            handler: Box::new(handler),
            on_unrouted: None,
            on_close: None,
            enabled: true,
            policy: ReconnectPolicy::default(),
            transport: None,
        }
    }

    /// Starts enabled or disabled.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Receives valid JSON frames that name no event, as raw text.
    #[must_use]
    pub fn on_unrouted(mut self, handler: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_unrouted = Some(Box::new(handler));
        self
    }

    /// Called whenever a socket of the underlying connection closes,
    /// including after [`Connection::disconnect`].
    #[must_use]
    pub fn on_close(mut self, handler: impl FnMut(&CloseInfo) + Send + 'static) -> Self {
        self.on_close = Some(Box::new(handler));
        self
    }

    /// Overrides the reconnect policy of the underlying connection.
    #[must_use]
    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Uses a custom transport for the underlying connection.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }
}

impl std::fmt::Debug for SubscriptionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionOptions")
            .field("url", &self.url)
            .field("event", &self.event)
            .field("enabled", &self.enabled)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// A live subscription to one event name.
///
/// Dropping it unsubscribes (if connected and enabled) and then tears the
/// connection down.
///
/// ```no_run
/// use ws_link::subscription::{Subscription, SubscriptionOptions};
///
/// # async fn demo() {
/// let sub = Subscription::open(SubscriptionOptions::new(
///     "ws://localhost:8000/ws",
///     "task.updated",
///     |data| println!("task updated: {data}"),
/// ));
/// sub.set_enabled(false);
/// # }
/// ```
pub struct Subscription {
    event: Arc<str>,
    enabled: Arc<AtomicBool>,
    connection: Connection,
}

impl Subscription {
    /// Opens the connection and starts routing `options.event`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn open(options: SubscriptionOptions) -> Self {
        let SubscriptionOptions {
            url,
            event,
            mut handler,
            mut on_unrouted,
            on_close,
            enabled,
            policy,
            transport,
        } = options;
        let event: Arc<str> = Arc::from(event);
        let enabled = Arc::new(AtomicBool::new(enabled));

        let filter_event = Arc::clone(&event);
        let observer_event = Arc::clone(&event);
        let observer_enabled = Arc::clone(&enabled);

        let mut connection_options = ConnectionOptions::new(url)
            .reconnect_policy(policy)
            .on_message(move |text| match Frame::parse(text) {
                Ok(frame) if frame.matches(&filter_event) => handler(frame.into_body()),
                Ok(frame) if !frame.is_routable() => {
                    if let Some(on_unrouted) = on_unrouted.as_mut() {
                        on_unrouted(text);
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(event = %filter_event, error = %err, "discarding malformed frame");
                }
            })
            .on_state_change(move |change, link| {
                if change.is_connect() && observer_enabled.load(Ordering::SeqCst) {
                    tracing::debug!(event = %observer_event, "subscribing");
                    link.send(ControlFrame::subscribe(observer_event.as_ref()));
                }
            });
        if let Some(on_close) = on_close {
            connection_options = connection_options.on_close(on_close);
        }
        if let Some(transport) = transport {
            connection_options = connection_options.transport(transport);
        }

        Self {
            event,
            enabled,
            connection: Connection::open(connection_options),
        }
    }

    /// The subscribed event name.
    #[must_use]
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Current state of the underlying connection.
    #[must_use]
    pub fn status(&self) -> ConnectionState {
        self.connection.status()
    }

    /// The underlying connection, for sending application frames.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Whether the subscription is enabled.
    ///
    /// Reflects [`Subscription::set_enabled`] once the driver has applied it.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Enables or disables the subscription.
    ///
    /// While connected, enabling sends a subscribe frame and disabling sends
    /// an unsubscribe frame. Setting the current value again sends nothing.
    pub fn set_enabled(&self, enabled: bool) {
        let flag = Arc::clone(&self.enabled);
        let event = Arc::clone(&self.event);
        self.connection.with_link(move |link| {
            let was_enabled = flag.swap(enabled, Ordering::SeqCst);
            if was_enabled == enabled || !link.is_connected() {
                return;
            }
            if enabled {
                tracing::debug!(event = %event, "subscribing");
                link.send(ControlFrame::subscribe(event.as_ref()));
            } else {
                tracing::debug!(event = %event, "unsubscribing");
                link.send(ControlFrame::unsubscribe(event.as_ref()));
            }
        });
    }

    /// Unsubscribes and tears the connection down. Same as dropping.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Queued ahead of the connection's own teardown, which follows when
        // the `connection` field drops.
        let flag = Arc::clone(&self.enabled);
        let event = Arc::clone(&self.event);
        self.connection.with_link(move |link| {
            if flag.swap(false, Ordering::SeqCst) && link.is_connected() {
                tracing::debug!(event = %event, "unsubscribing on teardown");
                link.send(ControlFrame::unsubscribe(event.as_ref()));
            }
        });
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event)
            .field("enabled", &self.is_enabled())
            .field("connection", &self.connection)
            .finish()
    }
}
