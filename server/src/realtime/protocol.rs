//! Wire protocol for the realtime WebSocket channel.
//!
//! Clients subscribe to tables (optionally narrowed by a column filter)
//! and receive every committed change as a [`ChangeNotification`], the
//! same envelope the engine's reconciler consumes. Channel names are
//! chosen by the client and echoed back on every event so one socket
//! can multiplex many subscriptions.

use serde::{Deserialize, Serialize};
use tidepool_engine::{ChangeNotification, ScopeFilter, Table};

/// Messages sent from client to server.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start streaming change events for one table. A filter narrows
    /// delivery to rows whose column matches the given value.
    Subscribe {
        channel: String,
        table: Table,
        #[serde(default)]
        filter: Option<ScopeFilter>,
    },
    /// Stop streaming events for a previously subscribed channel.
    Unsubscribe { channel: String },
    /// Keepalive probe.
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Acknowledges a subscribe request.
    Subscribed { channel: String },
    /// Acknowledges an unsubscribe request.
    Unsubscribed { channel: String },
    /// A committed change matching one of the connection's subscriptions.
    Event {
        channel: String,
        change: ChangeNotification,
    },
    /// Keepalive response.
    Pong,
    /// Protocol error. Carries the channel when the failure concerns a
    /// specific subscription.
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        channel: Option<String>,
    },
}

impl ServerMessage {
    /// Creates a subscribe acknowledgement.
    pub fn subscribed(channel: impl Into<String>) -> Self {
        Self::Subscribed {
            channel: channel.into(),
        }
    }

    /// Creates an unsubscribe acknowledgement.
    pub fn unsubscribed(channel: impl Into<String>) -> Self {
        Self::Unsubscribed {
            channel: channel.into(),
        }
    }

    /// Creates an event delivery for a channel.
    pub fn event(channel: impl Into<String>, change: ChangeNotification) -> Self {
        Self::Event {
            channel: channel.into(),
            change,
        }
    }

    /// Creates an error without channel context.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            channel: None,
        }
    }

    /// Creates an error tied to one channel.
    pub fn channel_error(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            channel: Some(channel.into()),
        }
    }
}
