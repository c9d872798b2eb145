//! Axum WebSocket upgrade handler.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use super::connection::run_connection;
use super::scope::ChannelScope;
use crate::app_state::AppState;

/// Query string accepted by `GET /ws`.
#[derive(Debug, Deserialize)]
pub struct BridgeQuery {
    /// Restricts the stream to one channel. Absent means every channel.
    pub channel: Option<String>,
}

/// `GET /ws`: Upgrade to the UI bridge stream.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<BridgeQuery>,
) -> impl IntoResponse {
    let scope = ChannelScope::from_query(query.channel.as_deref());
    ws.on_upgrade(move |socket| run_connection(socket, state, scope))
}
