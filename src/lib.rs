//! # ws-link
//!
//! Resilient real-time client: one persistent WebSocket connection that
//! recovers from drops with bounded exponential backoff, plus a lightweight
//! subscribe/unsubscribe/event-dispatch protocol on top of raw text frames.
//!
//! ## Architecture
//!
//! ```text
//! Caller
//!     │
//!     ├── Subscription (subscription/)   event filter + control frames
//!     │
//!     ├── Connection (connection/)       state machine + reconnect timer
//!     │
//!     └── Transport (transport/)         tokio-tungstenite socket task
//! ```
//!
//! Delivery is best-effort and at-most-once. Frames sent while the
//! connection is down are dropped, not queued.

pub mod config;
pub mod connection;
pub mod error;
pub mod subscription;
pub mod transport;
