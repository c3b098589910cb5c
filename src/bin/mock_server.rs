//! Mock push server entry point.
//!
//! Serves the realtime WebSocket endpoint with simulated dashboard data.

use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use dropship_realtime::config::ServerConfig;
use dropship_realtime::server::simulator::run_simulator;
use dropship_realtime::server::{PushBus, serve};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = ServerConfig::from_env().context("loading mock server configuration")?;
    tracing::info!(addr = %config.listen_addr, "starting mock push server");

    let bus = PushBus::new(config.bus_capacity);
    tokio::spawn(run_simulator(
        bus.clone(),
        Duration::from_secs(config.push_interval_secs),
    ));

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    serve(listener, bus).await?;

    Ok(())
}
