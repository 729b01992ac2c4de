use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::protocol::{RoomConfig, RoomDetail, RoomId, RoomStatus, RoomSummary};
use crate::server::BattleServer;

use super::{ApiError, Authed};

/// POST /rooms/create
pub async fn create_room(
    State(server): State<Arc<BattleServer>>,
    Authed(identity): Authed,
    Json(cfg): Json<RoomConfig>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let room = server.create_room(&identity, &cfg).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Room created successfully",
            "room_id": room.room_id,
            "room_name": room.name,
            "join_code": room.join_code,
        })),
    ))
}

/// GET /rooms
pub async fn list_rooms(
    State(server): State<Arc<BattleServer>>,
    Authed(_identity): Authed,
) -> Result<Json<Vec<RoomSummary>>, ApiError> {
    Ok(Json(server.list_rooms().await?))
}

/// GET /rooms/{room_id}
pub async fn get_room(
    State(server): State<Arc<BattleServer>>,
    Authed(_identity): Authed,
    Path(room_id): Path<RoomId>,
) -> Result<Json<RoomDetail>, ApiError> {
    Ok(Json(server.room_detail(&room_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct JoinBody {
    #[serde(default)]
    password: Option<String>,
}

/// POST /rooms/{room_id}/join
pub async fn join_room(
    State(server): State<Arc<BattleServer>>,
    Authed(identity): Authed,
    Path(room_id): Path<RoomId>,
    Json(body): Json<JoinBody>,
) -> Result<Json<RoomDetail>, ApiError> {
    let detail = server
        .join_room(&identity, &room_id, body.password.as_deref())
        .await?;
    Ok(Json(detail))
}

#[derive(Debug, Deserialize)]
pub struct KickBody {
    username: String,
}

/// POST /rooms/{room_id}/kick (host only)
pub async fn kick_participant(
    State(server): State<Arc<BattleServer>>,
    Authed(identity): Authed,
    Path(room_id): Path<RoomId>,
    Json(body): Json<KickBody>,
) -> Result<Json<Value>, ApiError> {
    server
        .kick_participant(&identity, &room_id, &body.username)
        .await?;
    Ok(Json(json!({
        "message": format!("{} has been kicked", body.username),
    })))
}

/// POST /rooms/{room_id}/start (host only)
pub async fn start_battle(
    State(server): State<Arc<BattleServer>>,
    Authed(identity): Authed,
    Path(room_id): Path<RoomId>,
) -> Result<Json<Value>, ApiError> {
    let question_id = server.start_battle(&identity, &room_id).await?;
    Ok(Json(json!({
        "message": "Battle started",
        "question_id": question_id,
    })))
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    status: RoomStatus,
}

/// PATCH /rooms/{room_id}/status (host only)
pub async fn update_status(
    State(server): State<Arc<BattleServer>>,
    Authed(identity): Authed,
    Path(room_id): Path<RoomId>,
    Json(body): Json<StatusBody>,
) -> Result<Json<Value>, ApiError> {
    let room = server.update_status(&identity, &room_id, body.status).await?;
    Ok(Json(json!({
        "message": "Room status updated",
        "room_id": room.room_id,
        "status": room.status,
    })))
}
