use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::judge::Language;
use crate::protocol::{QuestionId, RoomId};
use crate::server::{BattleServer, ServiceError, SubmissionResponse};
use crate::store::BattleStore;

use super::{ApiError, Authed};

/// GET /battle/{question_id} — question, testcases, and the entry-function
/// signature for editor stubs.
pub async fn get_battle_question(
    State(server): State<Arc<BattleServer>>,
    Authed(_identity): Authed,
    Path(question_id): Path<QuestionId>,
) -> Result<Json<Value>, ApiError> {
    let question = server
        .store()
        .question(&question_id)
        .await
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::NotFound("Question"))?;

    let testcases = server
        .store()
        .testcases(&question_id)
        .await
        .map_err(ServiceError::from)?;
    let function_details = server
        .store()
        .function_signature(&question_id)
        .await
        .map_err(ServiceError::from)?
        .unwrap_or_default();

    Ok(Json(json!({
        "question": question,
        "testcases": testcases,
        "function_details": function_details,
    })))
}

#[derive(Debug, Deserialize)]
pub struct VerifyBody {
    code: String,
    language: String,
    room_id: RoomId,
}

/// POST /battle/{question_id}/verify — the submission pipeline entrypoint.
pub async fn verify_submission(
    State(server): State<Arc<BattleServer>>,
    Authed(identity): Authed,
    Path(question_id): Path<QuestionId>,
    Json(body): Json<VerifyBody>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    if body.code.trim().is_empty() {
        return Err(ServiceError::InvalidConfig("Code is required".to_string()).into());
    }

    let language = Language::from_str(&body.language).map_err(ServiceError::Judge)?;
    let response = server
        .submit(&identity, &body.room_id, &question_id, &body.code, language)
        .await?;
    Ok(Json(response))
}
