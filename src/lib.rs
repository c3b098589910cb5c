//! # dropship-realtime
//!
//! Reconnecting realtime channel client for the dropshipping operations
//! console, plus a mock push server that speaks the same protocol.
//!
//! The client keeps one WebSocket open per user session, recovers from
//! drops with capped exponential backoff, multiplexes the `metrics`,
//! `alerts` and `system` channels over that socket, and exposes the latest
//! pushed data to consumers through `tokio::sync::watch` receivers.
//!
//! ## Architecture
//!
//! ```text
//! Consumers (UI bridge, CLI)
//!     │
//!     ├── RealtimeClient (client/)
//!     │       └── Supervisor task: handshake, heartbeat, backoff
//!     │
//!     ├── Wire protocol (protocol/)
//!     │
//!     └── Mock push server (server/, feature `mock-server`)
//!             ├── PushBus
//!             └── axum WebSocket endpoint
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
#[cfg(feature = "mock-server")]
pub mod server;
