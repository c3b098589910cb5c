//! Mock server side of one WebSocket connection.
//!
//! Handles the read/write loop for a single client: answers heartbeats,
//! maintains the channel filter, and forwards matching pushes.

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::filter::ChannelFilter;
use super::push_bus::{ObservedControl, Push, PushBus};
use crate::protocol::{ControlMessage, ServerFrame};

type WsSink = SplitSink<WebSocket, Message>;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Sends a `connection` acknowledgment on open.
/// - Reads control messages from the client and applies them.
/// - Forwards pushes from the [`PushBus`] that pass the channel filter.
pub async fn run_connection(socket: WebSocket, user_id: String, bus: PushBus) {
    let connection_id = Uuid::new_v4();
    let mut push_rx = bus.subscribe();
    let _guard = bus.track_connection();
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut filter = ChannelFilter::new();

    tracing::debug!(%connection_id, user_id = %user_id, "ws connection opened");
    if send_frame(&mut ws_tx, &ServerFrame::connection(&user_id))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            // Incoming message from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text_message(text.as_str(), &mut filter, &bus, connection_id, &user_id).await;
                        if let Some(frame) = reply
                            && send_frame(&mut ws_tx, &frame).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    _ => {}
                }
            }
            // Push from the bus
            push = push_rx.recv() => {
                match push {
                    Ok(Push::Frame(frame)) => {
                        if filter.matches(frame.topic())
                            && send_frame(&mut ws_tx, &frame).await.is_err() {
                                break;
                            }
                    }
                    Ok(Push::Raw(text)) => {
                        if ws_tx.send(Message::text(text)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Push::DisconnectAll) => {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind push bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!(%connection_id, "ws connection closed");
}

/// Handles a text message from the client, returning an optional reply.
async fn handle_text_message(
    text: &str,
    filter: &mut ChannelFilter,
    bus: &PushBus,
    connection_id: Uuid,
    user_id: &str,
) -> Option<ServerFrame> {
    let Ok(message) = serde_json::from_str::<ControlMessage>(text) else {
        tracing::debug!(len = text.len(), "ignoring non-control client message");
        return None;
    };

    let reply = match &message {
        ControlMessage::Ping => Some(ServerFrame::pong()),
        ControlMessage::Subscribe { channels } => {
            filter.subscribe(channels);
            None
        }
        ControlMessage::Unsubscribe { channels } => {
            filter.unsubscribe(channels);
            None
        }
        ControlMessage::Refresh { refresh_type } => bus.latest(refresh_type).await,
    };

    bus.report(ObservedControl {
        connection_id,
        user_id: user_id.to_string(),
        message,
    });
    reply
}

async fn send_frame(ws_tx: &mut WsSink, frame: &ServerFrame) -> Result<(), axum::Error> {
    match serde_json::to_string(frame) {
        Ok(json) => ws_tx.send(Message::text(json)).await,
        Err(e) => {
            tracing::error!(kind = %frame.kind, error = %e, "failed to encode frame");
            Ok(())
        }
    }
}
