use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use synapse_core::analysis::RoomAnalysis;
use synapse_core::roadmap::Roadmap;
use synapse_core::room::normalize_room_code;
use synapse_core::time::unix_millis;

use crate::error::AppError;
use crate::lifecycle;
use crate::state::AppState;
use crate::store::{StoredRoom, TaskCompletion};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    #[serde(default)]
    pub host_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomRequest {
    #[serde(default)]
    pub room_code: String,
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomResponse {
    pub message: &'static str,
    pub room_code: String,
    pub participants: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub analysis: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteTaskRequest {
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteTaskResponse {
    pub ok: bool,
    pub points_awarded: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPointsResponse {
    pub user_id: String,
    pub points: u64,
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    Ok(value)
}

fn room_code_param(raw: &str) -> Result<&str, AppError> {
    normalize_room_code(raw).ok_or_else(|| AppError::BadRequest("Invalid room code".to_string()))
}

/// POST /api/v1/rooms
pub async fn create_room(
    State(state): State<AppState>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<StoredRoom>), AppError> {
    let host_id = required(&req.host_id, "hostId")?;
    let room = state.store.create_room(host_id).await?;
    tracing::info!(room = %room.room_code, host_id, "Room created");
    Ok((StatusCode::CREATED, Json(room)))
}

/// POST /api/v1/rooms/join
pub async fn join_room(
    State(state): State<AppState>,
    Json(req): Json<JoinRoomRequest>,
) -> Result<Json<JoinRoomResponse>, AppError> {
    let room_code = room_code_param(required(&req.room_code, "roomCode")?)?;
    let user_id = required(&req.user_id, "userId")?;

    let (room, added) = state.store.join_room(room_code, user_id).await?;
    let message = if added {
        tracing::info!(room = %room.room_code, user_id, "User joined room");
        "Joined room successfully"
    } else {
        "Already in the room"
    };
    Ok(Json(JoinRoomResponse {
        message,
        room_code: room.room_code,
        participants: room.participants,
    }))
}

/// GET /api/v1/rooms/{code}/analysis
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<RoomAnalysis>, AppError> {
    let room_code = room_code_param(&code)?;
    state
        .store
        .latest_analysis(room_code)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No analysis for room {room_code}")))
}

/// PUT /api/v1/rooms/{code}/analysis
///
/// Replaces the room's snapshot and pushes it to every connection in the room.
pub async fn put_analysis(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<AnalysisRequest>,
) -> Result<Json<RoomAnalysis>, AppError> {
    let room_code = room_code_param(&code)?;
    if req.analysis.is_null() {
        return Err(AppError::BadRequest("analysis is required".to_string()));
    }

    let stored = state
        .store
        .upsert_analysis(RoomAnalysis {
            room_code: room_code.to_string(),
            file_name: req.file_name,
            analysis: req.analysis,
            last_updated: unix_millis(),
        })
        .await?;
    tracing::info!(room = %stored.room_code, file = %stored.file_name, "Analysis updated");

    lifecycle::publish_analysis(&state, stored.clone()).await;
    Ok(Json(stored))
}

/// POST /api/v1/roadmaps
pub async fn create_roadmap(
    State(state): State<AppState>,
    Json(mut roadmap): Json<Roadmap>,
) -> Result<(StatusCode, Json<Roadmap>), AppError> {
    if let Some(code) = roadmap.room_code.take() {
        roadmap.room_code = Some(room_code_param(&code)?.to_string());
    }
    let mut task_count = 0;
    for task in roadmap.milestones.iter().flat_map(|m| &m.tasks) {
        if task.task_id.trim().is_empty() {
            return Err(AppError::BadRequest("every task needs a taskId".to_string()));
        }
        task_count += 1;
    }

    let stored = state.store.save_roadmap(roadmap).await?;
    tracing::info!(roadmap_id = %stored.id, task_count, "Roadmap stored");
    Ok((StatusCode::CREATED, Json(stored)))
}

/// POST /api/v1/roadmaps/{id}/tasks/{task_id}/complete
pub async fn complete_task(
    State(state): State<AppState>,
    Path((roadmap_id, task_id)): Path<(String, String)>,
    Json(req): Json<CompleteTaskRequest>,
) -> Result<Json<CompleteTaskResponse>, AppError> {
    let user_id = required(&req.user_id, "userId")?;

    match state
        .store
        .complete_task(&roadmap_id, &task_id, user_id)
        .await?
    {
        TaskCompletion::Awarded { points, total } => {
            tracing::info!(%roadmap_id, %task_id, user_id, points, total, "Task completed");
            Ok(Json(CompleteTaskResponse {
                ok: true,
                points_awarded: points,
            }))
        },
        TaskCompletion::AlreadyCompleted => {
            Err(AppError::BadRequest("Task already completed".to_string()))
        },
    }
}

/// GET /api/v1/users/{user_id}/points
pub async fn user_points(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserPointsResponse>, AppError> {
    let points = state.store.user_points(&user_id).await?;
    Ok(Json(UserPointsResponse { user_id, points }))
}
