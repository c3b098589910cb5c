//! Periodic data generator for running the console without a backend.
//!
//! Every tick publishes a metrics snapshot and a system status. Every third
//! tick raises a low-stock alert, and the alert raised three ticks earlier
//! is resolved.

use std::time::Duration;

use chrono::Utc;
use serde_json::{Value, json};

use super::push_bus::PushBus;
use crate::protocol::ServerFrame;

/// Ticks between an alert and its resolution.
const ALERT_LIFETIME: u64 = 3;

/// Publishes simulated dashboard data forever.
pub async fn run_simulator(bus: PushBus, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    let mut tick: u64 = 0;

    loop {
        ticker.tick().await;
        tick = tick.wrapping_add(1);

        let mut frames = vec![
            ServerFrame::dashboard_update(metrics_snapshot(tick)),
            ServerFrame::system_status(status_snapshot(tick)),
        ];
        if tick % ALERT_LIFETIME == 0 {
            frames.push(ServerFrame::new_alert(low_stock_alert(tick)));
        }
        if tick > ALERT_LIFETIME && (tick - ALERT_LIFETIME) % ALERT_LIFETIME == 0 {
            frames.push(ServerFrame::alert_update(resolved_alert(tick - ALERT_LIFETIME)));
        }

        let mut delivered = 0;
        for frame in frames {
            delivered += bus.publish(frame).await;
        }
        tracing::debug!(tick, delivered, "simulator tick");
    }
}

/// Dashboard metrics for a tick.
#[must_use]
pub fn metrics_snapshot(tick: u64) -> Value {
    json!({
        "orders_today": 40 + tick * 3,
        "revenue_today": format!("{}.{:02}", 1_250 + tick * 87, tick % 100),
        "pending_shipments": 5 + tick % 7,
        "low_stock_products": tick % 4,
        "active_suppliers": 12,
        "generated_at": Utc::now().to_rfc3339(),
    })
}

/// System status for a tick. The supplier sync degrades every tenth tick.
#[must_use]
pub fn status_snapshot(tick: u64) -> Value {
    let sync = if tick % 10 == 0 { "degraded" } else { "ok" };
    json!({
        "api": "ok",
        "database": "ok",
        "supplier_sync": sync,
        "queue_depth": tick % 25,
        "uptime_secs": tick * 5,
    })
}

/// Low-stock alert raised at `tick`.
#[must_use]
pub fn low_stock_alert(tick: u64) -> Value {
    json!({
        "id": alert_id(tick),
        "severity": "warning",
        "message": format!("SKU-{:04} is below its reorder point", tick % 10_000),
        "resolved": false,
    })
}

/// Resolution of the alert raised at `raised_at`.
#[must_use]
pub fn resolved_alert(raised_at: u64) -> Value {
    json!({
        "id": alert_id(raised_at),
        "severity": "info",
        "message": format!("SKU-{:04} restocked", raised_at % 10_000),
        "resolved": true,
    })
}

fn alert_id(tick: u64) -> String {
    format!("alert-{tick}")
}
