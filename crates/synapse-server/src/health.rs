use std::sync::atomic::Ordering;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

/// Structured health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Open WebSocket connections.
    pub connections: usize,
    pub rooms: RoomInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub live: usize,
    pub participants: usize,
    pub active_calls: usize,
}

/// Returns server status, connection count and live room counters as JSON.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.ws_connection_count.load(Ordering::Relaxed);
    let stats = state.hub.read().await.stats();

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        connections,
        rooms: RoomInfo {
            live: stats.live_rooms,
            participants: stats.participants,
            active_calls: stats.active_calls,
        },
    })
}
