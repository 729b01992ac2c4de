use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::ranking::RankingEntry;
use crate::server::{BattleServer, ServiceError};
use crate::store::BattleStore;

use super::{ApiError, Authed};

/// GET /battle/global-rankings — top 100 by rating in the active season.
pub async fn global_rankings(
    State(server): State<Arc<BattleServer>>,
    Authed(_identity): Authed,
) -> Result<Json<Vec<RankingEntry>>, ApiError> {
    let rankings = server
        .store()
        .top_rankings(100)
        .await
        .map_err(ServiceError::from)?;
    Ok(Json(rankings))
}
