//! HTTP API: room CRUD/join/start, the submission pipeline, rankings, and
//! operational endpoints. JSON in, JSON out; bearer token in
//! `Authorization`.

mod battle;
mod error;
mod rankings;
mod rooms;

pub use error::ApiError;

use std::sync::Arc;

use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::routing::{get, patch, post};
use axum::{Json, Router};

use crate::auth::{AuthError, Identity, IdentityVerifier};
use crate::server::BattleServer;

/// Extractor for the verified caller identity from the `Authorization:
/// Bearer` header.
pub struct Authed(pub Identity);

impl FromRequestParts<Arc<BattleServer>> for Authed {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<BattleServer>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError(AuthError::MissingToken.into()))?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or(ApiError(AuthError::InvalidToken.into()))?;

        let identity = state
            .verifier()
            .verify(token)
            .map_err(|err| ApiError(err.into()))?;
        Ok(Self(identity))
    }
}

/// Build the REST router.
pub fn api_router() -> Router<Arc<BattleServer>> {
    Router::new()
        .route("/rooms/create", post(rooms::create_room))
        .route("/rooms", get(rooms::list_rooms))
        .route("/rooms/{room_id}", get(rooms::get_room))
        .route("/rooms/{room_id}/join", post(rooms::join_room))
        .route("/rooms/{room_id}/kick", post(rooms::kick_participant))
        .route("/rooms/{room_id}/start", post(rooms::start_battle))
        .route("/rooms/{room_id}/status", patch(rooms::update_status))
        .route("/battle/{question_id}", get(battle::get_battle_question))
        .route("/battle/{question_id}/verify", post(battle::verify_submission))
        .route("/battle/global-rankings", get(rankings::global_rankings))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
}

async fn health(State(server): State<Arc<BattleServer>>) -> Result<&'static str, ApiError> {
    if server.health_check().await {
        Ok("OK")
    } else {
        Err(ApiError(crate::server::ServiceError::Storage(
            "store unavailable".to_string(),
        )))
    }
}

async fn metrics(
    State(server): State<Arc<BattleServer>>,
) -> Json<crate::metrics::MetricsSnapshot> {
    Json(server.metrics().snapshot())
}
