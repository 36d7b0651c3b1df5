//! Connection registry and change fan-out.

use crate::realtime::protocol::ServerMessage;
use dashmap::DashMap;
use std::sync::Arc;
use tidepool_engine::{ChangeNotification, EventKind, ScopeFilter, Table};
use tokio::sync::mpsc;

/// Sender half of a connection's outbound message channel.
pub type MessageSender = mpsc::UnboundedSender<ServerMessage>;

/// One active subscription on a connection.
#[derive(Debug, Clone)]
pub struct SubscriptionSpec {
    pub channel: String,
    pub table: Table,
    pub filter: Option<ScopeFilter>,
}

impl SubscriptionSpec {
    pub fn new(channel: impl Into<String>, table: Table, filter: Option<ScopeFilter>) -> Self {
        Self {
            channel: channel.into(),
            table,
            filter,
        }
    }

    /// Whether a committed change should be delivered on this
    /// subscription. DELETE events carry only the old row, which is not
    /// guaranteed to include filter columns, so they go to every
    /// subscription on the table.
    fn wants(&self, change: &ChangeNotification) -> bool {
        if change.table != self.table {
            return false;
        }
        if change.event_type == EventKind::Delete {
            return true;
        }
        match (&self.filter, change.scope_row()) {
            (Some(filter), Some(row)) => filter.matches(row),
            (Some(_), None) => false,
            (None, _) => true,
        }
    }
}

/// A registered WebSocket connection.
#[derive(Debug)]
struct Connection {
    user_id: Option<String>,
    sender: MessageSender,
    subscriptions: Vec<SubscriptionSpec>,
}

/// Tracks live connections and routes committed changes to the
/// subscriptions that want them.
///
/// Fan-out deliberately includes the connection that issued the write:
/// the echo is what settles the originator's optimistic state.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    connections: DashMap<String, Connection>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Registers a connection and returns its id.
    pub fn register(&self, user_id: Option<String>, sender: MessageSender) -> String {
        let conn_id = uuid::Uuid::new_v4().to_string();

        self.connections.insert(
            conn_id.clone(),
            Connection {
                user_id: user_id.clone(),
                sender,
                subscriptions: Vec::new(),
            },
        );

        tracing::info!(
            conn_id = %conn_id,
            user_id = ?user_id,
            total = self.connections.len(),
            "realtime connection registered"
        );

        conn_id
    }

    /// Removes a connection and all of its subscriptions.
    pub fn unregister(&self, conn_id: &str) {
        if self.connections.remove(conn_id).is_some() {
            tracing::info!(
                conn_id = %conn_id,
                total = self.connections.len(),
                "realtime connection unregistered"
            );
        }
    }

    /// Adds a subscription to a connection. Subscribing again with the
    /// same channel name replaces the old subscription.
    pub fn subscribe(&self, conn_id: &str, spec: SubscriptionSpec) -> bool {
        match self.connections.get_mut(conn_id) {
            Some(mut conn) => {
                conn.subscriptions.retain(|s| s.channel != spec.channel);
                tracing::debug!(
                    conn_id = %conn_id,
                    channel = %spec.channel,
                    table = %spec.table,
                    "subscribed"
                );
                conn.subscriptions.push(spec);
                true
            }
            None => false,
        }
    }

    /// Drops the subscription using this channel name. Returns false if
    /// the connection or channel is unknown.
    pub fn unsubscribe(&self, conn_id: &str, channel: &str) -> bool {
        match self.connections.get_mut(conn_id) {
            Some(mut conn) => {
                let before = conn.subscriptions.len();
                conn.subscriptions.retain(|s| s.channel != channel);
                conn.subscriptions.len() < before
            }
            None => false,
        }
    }

    /// Sends a committed change to every matching subscription across
    /// all connections. Returns the number of deliveries.
    pub fn broadcast_change(&self, change: &ChangeNotification) -> usize {
        let mut delivered = 0;

        for conn in self.connections.iter() {
            for spec in &conn.subscriptions {
                if !spec.wants(change) {
                    continue;
                }
                let message = ServerMessage::event(spec.channel.as_str(), change.clone());
                if conn.sender.send(message).is_ok() {
                    delivered += 1;
                } else {
                    tracing::debug!(channel = %spec.channel, "send failed, connection closing");
                }
            }
        }

        tracing::debug!(
            table = %change.table,
            event = ?change.event_type,
            delivered = delivered,
            "change broadcast"
        );

        delivered
    }

    /// Sends a message to one connection.
    pub fn send_to(&self, conn_id: &str, message: ServerMessage) -> bool {
        match self.connections.get(conn_id) {
            Some(conn) => conn.sender.send(message).is_ok(),
            None => false,
        }
    }

    /// The user a connection authenticated as, if any.
    pub fn user_of(&self, conn_id: &str) -> Option<String> {
        self.connections
            .get(conn_id)
            .and_then(|conn| conn.user_id.clone())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn subscription_count(&self) -> usize {
        self.connections
            .iter()
            .map(|conn| conn.subscriptions.len())
            .sum()
    }
}
