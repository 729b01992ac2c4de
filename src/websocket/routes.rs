use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use crate::server::BattleServer;

use super::handler::{battle_handler, global_lobby_handler, room_lobby_handler};

/// Realtime routes. Registered with and without the trailing slash so
/// clients built against either URL shape connect.
pub fn ws_router() -> Router<Arc<BattleServer>> {
    Router::new()
        .route("/ws/rooms", get(global_lobby_handler))
        .route("/ws/rooms/", get(global_lobby_handler))
        .route("/ws/room/{room_id}", get(room_lobby_handler))
        .route("/ws/room/{room_id}/", get(room_lobby_handler))
        .route("/ws/battle/{room_id}", get(battle_handler))
        .route("/ws/battle/{room_id}/", get(battle_handler))
}
