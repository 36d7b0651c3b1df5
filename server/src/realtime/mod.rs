//! Realtime change delivery over WebSocket.
//!
//! Every committed mutation is fanned out here as a change event.
//! Clients subscribe per table, optionally filtered to a scope such as
//! one conversation, and reconcile the events into their local feeds.

mod manager;
mod protocol;

pub use manager::{ConnectionManager, MessageSender, SubscriptionSpec};
pub use protocol::*;
