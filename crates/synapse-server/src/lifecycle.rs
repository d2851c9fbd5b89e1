//! Glue between transports and the [`Hub`](crate::hub::Hub): takes the hub
//! lock for each event and runs store lookups with the lock released.

use synapse_core::analysis::RoomAnalysis;
use synapse_core::net::messages::{ClientEvent, ConnectionId, ServerEvent};

use crate::hub::{ConnectionSender, FollowUp};
use crate::state::AppState;

pub async fn connect(state: &AppState, sender: ConnectionSender) -> ConnectionId {
    state.hub.write().await.connect(sender)
}

/// Handle one inbound event to completion, including any catch-up delivery.
pub async fn handle_event(state: &AppState, connection_id: ConnectionId, event: ClientEvent) {
    let follow_up = state.hub.write().await.dispatch(connection_id, event);
    if let Some(FollowUp::CatchUp {
        connection_id,
        room_code,
    }) = follow_up
    {
        send_catch_up(state, connection_id, &room_code).await;
    }
}

pub async fn disconnect(state: &AppState, connection_id: ConnectionId) {
    state.hub.write().await.disconnect(connection_id);
    tracing::info!(connection_id, "Connection closed");
}

/// Send the room's latest analysis to a connection that just joined.
/// A store failure only costs the joiner the catch-up.
async fn send_catch_up(state: &AppState, connection_id: ConnectionId, room_code: &str) {
    match state.store.latest_analysis(room_code).await {
        Ok(Some(snapshot)) => {
            let hub = state.hub.read().await;
            hub.send_to_connection(connection_id, &ServerEvent::AnalysisUpdated(snapshot.into()));
        },
        Ok(None) => {},
        Err(e) => {
            tracing::warn!(connection_id, room = room_code, error = %e, "Analysis catch-up failed");
        },
    }
}

/// Push a freshly stored analysis snapshot to everyone in its room.
pub async fn publish_analysis(state: &AppState, snapshot: RoomAnalysis) {
    let room_code = snapshot.room_code.clone();
    let hub = state.hub.read().await;
    hub.broadcast_to_room(&room_code, &ServerEvent::AnalysisUpdated(snapshot.into()));
}
