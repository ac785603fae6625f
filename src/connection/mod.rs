//! Connection layer: lifecycle state machine, reconnect policy, and the
//! [`Connection`] handle.
//!
//! One [`Connection`] owns one logical connection. It opens the transport
//! on construction, follows drops with exponential-backoff reconnects, and
//! exposes `status`, `send`, `disconnect`, `reconnect` and the last inbound
//! frame.

pub mod id;
pub mod link;
pub mod manager;
pub mod options;
pub mod policy;
pub mod state;

pub use id::ConnectionId;
pub use link::{Link, Payload};
pub use manager::{Connection, InboundMessage};
pub use options::ConnectionOptions;
pub use policy::ReconnectPolicy;
pub use state::{ConnectionState, StateChange};
