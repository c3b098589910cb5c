//! Connection lifecycle as seen by consumers.

use std::time::Duration;

use serde::Serialize;

/// Lifecycle phase of the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    /// Not started, or stopped.
    #[default]
    Idle,
    /// Handshake in progress.
    Connecting,
    /// Socket open; frames are being dispatched.
    Open,
    /// Disconnected; a retry may be pending.
    Closed,
}

/// Phase plus retry bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    /// Current phase.
    pub phase: ConnectionPhase,
    /// Consecutive failed attempts since the last successful open.
    pub failed_attempts: u32,
    /// Delay of the scheduled retry, if one is pending.
    pub retry_in: Option<Duration>,
}

impl ConnectionStatus {
    /// Returns `true` once the client has given up reconnecting.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.phase == ConnectionPhase::Closed && self.retry_in.is_none()
    }

    /// Returns `true` while the socket is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.phase == ConnectionPhase::Open
    }
}
