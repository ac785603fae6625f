//! Subscription layer: event routing and subscribe/unsubscribe control
//! frames over one [`crate::connection::Connection`].

pub mod frame;
pub mod router;

pub use frame::{ControlAction, ControlFrame, Frame};
pub use router::{Subscription, SubscriptionOptions};
