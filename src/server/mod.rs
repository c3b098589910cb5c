//! Mock dashboard push server.
//!
//! A small axum service that speaks the realtime protocol: it acknowledges
//! connections at `/ws/{user_id}`, answers heartbeats, filters pushes by
//! each connection's subscriptions, and replays cached snapshots on
//! `refresh`. The [`PushBus`] is the single entry point for publishing
//! frames, whether from the [`simulator`] or from tests.

pub mod connection;
pub mod filter;
pub mod handler;
pub mod push_bus;
pub mod routes;
pub mod simulator;

pub use filter::ChannelFilter;
pub use push_bus::{ObservedControl, Push, PushBus};
pub use routes::build_router;

use tokio::net::TcpListener;

/// Serves the mock endpoint on an already bound listener until the process
/// exits or the future is dropped.
///
/// # Errors
///
/// Returns the I/O error reported by the underlying server.
pub async fn serve(listener: TcpListener, bus: PushBus) -> std::io::Result<()> {
    axum::serve(listener, build_router(bus)).await
}
