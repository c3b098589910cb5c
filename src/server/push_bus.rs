//! Broadcast bus feeding every mock server connection.
//!
//! [`PushBus`] wraps two [`tokio::sync::broadcast`] channels: one carrying
//! pushes from publishers to connections, one carrying the control
//! messages connections receive from clients back to observers. It also
//! caches the latest snapshot per topic so `refresh` requests can be
//! answered, and counts live connections for the health endpoint.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use crate::protocol::{ControlMessage, ServerFrame};

/// Something published to every connection.
#[derive(Debug, Clone)]
pub enum Push {
    /// A protocol frame, forwarded when it matches the connection's filter.
    Frame(ServerFrame),
    /// Raw text forwarded unchanged to every connection.
    Raw(String),
    /// Close every connection.
    DisconnectAll,
}

/// A control message received from a client, as seen by observers.
#[derive(Debug, Clone)]
pub struct ObservedControl {
    /// Server-assigned id of the connection it arrived on.
    pub connection_id: Uuid,
    /// Identity from the connection's path.
    pub user_id: String,
    /// The decoded message.
    pub message: ControlMessage,
}

/// Broadcast bus for mock server pushes.
#[derive(Debug, Clone)]
pub struct PushBus {
    sender: broadcast::Sender<Push>,
    observed: broadcast::Sender<ObservedControl>,
    latest: Arc<RwLock<HashMap<String, ServerFrame>>>,
    connections: Arc<AtomicUsize>,
}

/// Decrements the live connection count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    connections: Arc<AtomicUsize>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.connections.fetch_sub(1, Ordering::SeqCst);
    }
}

impl PushBus {
    /// Creates a new `PushBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        let (observed, _) = broadcast::channel(capacity);
        Self {
            sender,
            observed,
            latest: Arc::new(RwLock::new(HashMap::new())),
            connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Publishes a frame to all connections.
    ///
    /// Snapshot frames (`dashboard_update`, `system_status`, `data`) are
    /// also cached under their topic for later `refresh` requests.
    /// Returns the number of connections that received the push.
    pub async fn publish(&self, frame: ServerFrame) -> usize {
        if is_snapshot(&frame)
            && let Some(topic) = frame.topic()
        {
            self.latest
                .write()
                .await
                .insert(topic.to_string(), frame.clone());
        }
        self.sender.send(Push::Frame(frame)).unwrap_or(0)
    }

    /// Publishes raw text, bypassing filters and framing.
    pub fn publish_raw(&self, text: impl Into<String>) -> usize {
        self.sender.send(Push::Raw(text.into())).unwrap_or(0)
    }

    /// Asks every connection to close.
    pub fn disconnect_all(&self) -> usize {
        self.sender.send(Push::DisconnectAll).unwrap_or(0)
    }

    /// Creates a new receiver for all future pushes.
    ///
    /// Each WebSocket connection should call this once on connect.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Push> {
        self.sender.subscribe()
    }

    /// Creates a receiver for control messages clients send.
    #[must_use]
    pub fn observe(&self) -> broadcast::Receiver<ObservedControl> {
        self.observed.subscribe()
    }

    /// Reports a received control message to observers.
    pub fn report(&self, observed: ObservedControl) {
        // Nobody observing is the normal case outside tests.
        let _ = self.observed.send(observed);
    }

    /// Latest cached snapshot for a refresh kind.
    ///
    /// `dashboard` is accepted as an alias of `metrics`, and `status` of
    /// `system`.
    pub async fn latest(&self, kind: &str) -> Option<ServerFrame> {
        let topic = match kind {
            "dashboard" => "metrics",
            "status" => "system",
            other => other,
        };
        self.latest.read().await.get(topic).cloned()
    }

    /// Registers a live connection until the guard is dropped.
    #[must_use]
    pub fn track_connection(&self) -> ConnectionGuard {
        self.connections.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            connections: Arc::clone(&self.connections),
        }
    }

    /// Number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Returns the current number of push receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

fn is_snapshot(frame: &ServerFrame) -> bool {
    matches!(
        frame.kind.as_str(),
        "dashboard_update" | "system_status" | "data"
    )
}
