//! dropship-realtime watcher entry point.
//!
//! Connects to the dashboard push endpoint as `REALTIME_USER_ID`, subscribes
//! to `REALTIME_CHANNELS`, and logs every change to the observed state until
//! Ctrl-C.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use dropship_realtime::client::RealtimeClient;
use dropship_realtime::config::ClientConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error.code = e.code(), error = %e, "invalid client configuration");
            return Err(e).context("loading client configuration");
        }
    };
    let channels = config.channels.clone();
    tracing::info!(url = %config.ws_base_url, ?channels, "starting dropship-realtime watcher");

    let mut client = RealtimeClient::new(config);
    client.subscribe(channels.as_slice());
    if let Err(e) = client.start_from_config().await {
        tracing::error!(error.code = e.code(), error = %e, "realtime client did not start");
        return Err(e).context("REALTIME_USER_ID must name the user to connect as");
    }

    let mut state_rx = client.watch_state();
    let mut status_rx = client.watch_status();

    loop {
        tokio::select! {
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = state_rx.borrow_and_update().clone();
                tracing::info!(
                    connected = state.connected,
                    alerts = state.alerts.len(),
                    metrics = %state.metrics.as_ref().map(ToString::to_string).unwrap_or_default(),
                    status = %state.status.as_ref().map(ToString::to_string).unwrap_or_default(),
                    last_error = ?state.last_error,
                    "state updated"
                );
            }
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = *status_rx.borrow_and_update();
                tracing::info!(phase = ?status.phase, failed_attempts = status.failed_attempts, retry_in = ?status.retry_in, "connection status");
                if status.is_exhausted() {
                    tracing::warn!("reconnect attempts exhausted; waiting for Ctrl-C");
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("listening for Ctrl-C")?;
                break;
            }
        }
    }

    client.stop().await;
    tracing::info!("watcher stopped");
    Ok(())
}
