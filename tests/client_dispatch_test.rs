//! Inbound frame dispatch and outbound sends against the mock server.
#![cfg(feature = "mock-server")]
#![allow(clippy::panic)]

mod common;

use std::time::Duration;

use serde_json::json;

use dropship_realtime::client::RealtimeClient;
use dropship_realtime::protocol::{ControlMessage, ServerFrame};

use common::{MockServer, assert_quiet, next_observed, quick_config, wait_state, wait_status};

/// Starts a client subscribed to `channels` and waits until the server has
/// applied the subscription.
async fn connected_client(server: &MockServer, channels: &[&str]) -> RealtimeClient {
    let mut observed = server.bus.observe();
    let mut client = RealtimeClient::new(quick_config(&server.ws_base()));
    client.subscribe(channels);
    let Ok(()) = client.start("ops-admin").await else {
        panic!("start failed");
    };
    let first = next_observed(&mut observed).await;
    assert!(matches!(first.message, ControlMessage::Subscribe { .. }));
    client
}

#[tokio::test]
async fn dashboard_and_alert_scenario() {
    let server = MockServer::start().await;
    let mut client = connected_client(&server, &["metrics", "alerts"]).await;

    server
        .bus
        .publish(ServerFrame::dashboard_update(json!({"x": 1})))
        .await;
    let state = wait_state(&client, |s| s.metrics.is_some()).await;
    assert_eq!(state.metrics, Some(json!({"x": 1})));

    server
        .bus
        .publish(ServerFrame::new_alert(json!({"id": "a1", "msg": "low stock"})))
        .await;
    let state = wait_state(&client, |s| !s.alerts.is_empty()).await;
    assert_eq!(state.alerts, vec![json!({"id": "a1", "msg": "low stock"})]);

    server
        .bus
        .publish(ServerFrame::alert_update(json!({"id": "a1", "msg": "resolved"})))
        .await;
    let state = wait_state(&client, |s| {
        s.alerts.first().and_then(|a| a.get("msg")) == Some(&json!("resolved"))
    })
    .await;
    assert_eq!(state.alerts, vec![json!({"id": "a1", "msg": "resolved"})]);

    client.stop().await;
}

#[tokio::test]
async fn malformed_frames_change_nothing() {
    let server = MockServer::start().await;
    let mut client = connected_client(&server, &["metrics", "system"]).await;

    server
        .bus
        .publish(ServerFrame::dashboard_update(json!({"x": 1})))
        .await;
    let before = wait_state(&client, |s| s.metrics.is_some()).await;

    server.bus.publish_raw("{not json");
    server.bus.publish_raw(r#"{"type":"new_alert","data":{}}"#);
    server.bus.publish_raw(r#"{"type":"inventory_sync","data":{}}"#);
    server
        .bus
        .publish(ServerFrame::system_status(json!({"database": "ok"})))
        .await;

    let after = wait_state(&client, |s| s.status.is_some()).await;
    assert_eq!(after.metrics, before.metrics);
    assert!(after.alerts.is_empty());
    assert_eq!(after.last_error, None);
    assert!(after.connected);
    assert!(client.status().is_open());

    client.stop().await;
}

#[tokio::test]
async fn server_error_surfaces_message() {
    let server = MockServer::start().await;
    let mut client = connected_client(&server, &["metrics"]).await;

    server
        .bus
        .publish(ServerFrame::error(Some("inventory sync failed")))
        .await;
    let state = wait_state(&client, |s| s.last_error.is_some()).await;
    assert_eq!(state.last_error.as_deref(), Some("inventory sync failed"));

    client.stop().await;
}

#[tokio::test]
async fn unsubscribed_channels_are_filtered_by_server() {
    let server = MockServer::start().await;
    let mut client = connected_client(&server, &["system"]).await;

    server
        .bus
        .publish(ServerFrame::dashboard_update(json!({"x": 1})))
        .await;
    server
        .bus
        .publish(ServerFrame::system_status(json!({"api": "ok"})))
        .await;

    let state = wait_state(&client, |s| s.status.is_some()).await;
    assert_eq!(state.metrics, None);

    client.stop().await;
}

#[tokio::test]
async fn alerts_channel_replaces_list() {
    let server = MockServer::start().await;
    let mut client = connected_client(&server, &["alerts"]).await;

    server
        .bus
        .publish(ServerFrame::new_alert(json!({"id": "a1"})))
        .await;
    wait_state(&client, |s| s.alerts.len() == 1).await;

    server
        .bus
        .publish(ServerFrame::channel_data(
            "alerts",
            json!([{"id": "b1"}, {"id": "b2"}]),
        ))
        .await;
    let state = wait_state(&client, |s| s.alerts.len() == 2).await;
    assert_eq!(state.alerts, vec![json!({"id": "b1"}), json!({"id": "b2"})]);

    client.stop().await;
}

#[tokio::test]
async fn refresh_replays_cached_snapshot() {
    let server = MockServer::start().await;
    server
        .bus
        .publish(ServerFrame::dashboard_update(json!({"v": 7})))
        .await;

    let mut client = connected_client(&server, &["metrics"]).await;
    assert_eq!(client.state().metrics, None);

    let Ok(()) = client.refresh("metrics") else {
        panic!("refresh failed");
    };
    let state = wait_state(&client, |s| s.metrics.is_some()).await;
    assert_eq!(state.metrics, Some(json!({"v": 7})));

    client.stop().await;
}

#[tokio::test]
async fn heartbeat_pings_while_open() {
    let server = MockServer::start().await;
    let mut observed = server.bus.observe();

    let config = quick_config(&server.ws_base()).with_heartbeat(Duration::from_millis(50));
    let mut client = RealtimeClient::new(config);
    let Ok(()) = client.start("ops-admin").await else {
        panic!("start failed");
    };

    let first = next_observed(&mut observed).await;
    assert_eq!(first.message, ControlMessage::Ping);
    let second = next_observed(&mut observed).await;
    assert_eq!(second.message, ControlMessage::Ping);
    assert_eq!(client.state().last_error, None);

    client.stop().await;
}

#[tokio::test]
async fn send_while_idle_is_dropped_by_default() {
    let server = MockServer::start().await;
    let mut observed = server.bus.observe();

    let mut client = RealtimeClient::new(quick_config(&server.ws_base()));
    let Ok(()) = client.refresh("metrics") else {
        panic!("refresh failed");
    };
    client.subscribe(&["metrics"]);
    let Ok(()) = client.start("ops-admin").await else {
        panic!("start failed");
    };

    let first = next_observed(&mut observed).await;
    assert!(matches!(first.message, ControlMessage::Subscribe { .. }));
    assert_quiet(&mut observed, Duration::from_millis(200)).await;

    client.stop().await;
}

#[tokio::test]
async fn replay_buffer_flushes_after_subscribe() {
    let server = MockServer::start().await;
    let mut observed = server.bus.observe();

    let config = quick_config(&server.ws_base()).with_replay_buffer(2);
    let mut client = RealtimeClient::new(config);
    client.subscribe(&["metrics"]);
    for kind in ["a", "b", "c"] {
        let Ok(()) = client.refresh(kind) else {
            panic!("refresh failed");
        };
    }
    let Ok(()) = client.start("ops-admin").await else {
        panic!("start failed");
    };

    let kinds: Vec<ControlMessage> = vec![
        next_observed(&mut observed).await.message,
        next_observed(&mut observed).await.message,
        next_observed(&mut observed).await.message,
    ];
    assert_eq!(
        kinds,
        vec![
            ControlMessage::Subscribe {
                channels: vec!["metrics".to_string()]
            },
            ControlMessage::Refresh {
                refresh_type: "b".to_string()
            },
            ControlMessage::Refresh {
                refresh_type: "c".to_string()
            },
        ]
    );
    wait_status(&client, |s| s.is_open()).await;

    client.stop().await;
}
