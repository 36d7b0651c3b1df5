//! WebSocket handler for realtime change delivery.
//!
//! Subscriptions live on the connection: the socket registers with the
//! manager, the manager routes matching change events into the
//! connection's channel, and one select loop pumps both directions
//! until the peer goes away.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::realtime::{ClientMessage, ConnectionManager, ServerMessage, SubscriptionSpec};

/// Drive one realtime connection from upgrade to disconnect.
///
/// Outbound events arrive through the manager's channel; inbound frames
/// carry subscribe/unsubscribe/ping requests. Whichever side closes
/// first ends the loop, and cleanup drops every subscription the
/// connection held.
pub async fn handle_websocket_connection(
    socket: WebSocket,
    manager: Arc<ConnectionManager>,
    user_id: Option<String>,
) {
    let (mut sink, mut frames) = socket.split();
    let (tx, mut outbound) = mpsc::unbounded_channel::<ServerMessage>();

    let viewer = user_id.clone();
    let conn_id = manager.register(user_id, tx);
    tracing::info!(conn_id = %conn_id, viewer = ?viewer, "realtime client connected");

    loop {
        tokio::select! {
            queued = outbound.recv() => {
                let Some(message) = queued else { break };
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(error) => {
                        tracing::error!(conn_id = %conn_id, %error, "dropping unencodable frame");
                        continue;
                    }
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }

            frame = frames.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let reply = process_message(&manager, &conn_id, &text);
                        manager.send_to(&conn_id, reply);
                    }
                    // Control frames are answered by axum itself.
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Ok(Message::Binary(_))) => {
                        tracing::debug!(conn_id = %conn_id, "ignoring binary frame");
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(error)) => {
                        tracing::debug!(conn_id = %conn_id, %error, "socket read failed");
                        break;
                    }
                }
            }
        }
    }

    manager.unregister(&conn_id);
    tracing::info!(
        conn_id = %conn_id,
        remaining = manager.connection_count(),
        "realtime client disconnected"
    );
}

/// Process a client message and return the server response.
fn process_message(manager: &ConnectionManager, conn_id: &str, text: &str) -> ServerMessage {
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(parse) => {
            return ServerMessage::error(format!("unreadable request: {parse}"));
        }
    };

    match client_msg {
        ClientMessage::Subscribe {
            channel,
            table,
            filter,
        } => {
            let spec = SubscriptionSpec::new(channel.clone(), table, filter);
            if manager.subscribe(conn_id, spec) {
                ServerMessage::subscribed(channel)
            } else {
                ServerMessage::channel_error(channel, "connection not registered")
            }
        }

        ClientMessage::Unsubscribe { channel } => {
            if manager.unsubscribe(conn_id, &channel) {
                ServerMessage::unsubscribed(channel)
            } else {
                ServerMessage::channel_error(channel, "not subscribed")
            }
        }

        ClientMessage::Ping => ServerMessage::Pong,
    }
}
