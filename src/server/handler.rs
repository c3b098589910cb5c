//! Axum WebSocket upgrade handler.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::IntoResponse;

use super::connection::run_connection;
use super::push_bus::PushBus;

/// `GET /ws/{user_id}`: upgrades the request to a push socket for that user.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(user_id): Path<String>,
    State(bus): State<PushBus>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_connection(socket, user_id, bus))
}
