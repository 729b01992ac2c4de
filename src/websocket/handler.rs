use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::response::Response;

use crate::protocol::RoomId;
use crate::server::BattleServer;

use super::{battle, lobby, room_list};

fn token_param(params: &HashMap<String, String>) -> Option<String> {
    params.get("token").cloned().filter(|t| !t.is_empty())
}

/// `GET /ws/rooms/?token=...` — global lobby socket.
pub async fn global_lobby_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(server): State<Arc<BattleServer>>,
) -> Response {
    let token = token_param(&params);
    ws.on_upgrade(move |socket| room_list::handle_socket(socket, server, token))
}

/// `GET /ws/room/{room_id}/?token=...` — room lobby socket.
pub async fn room_lobby_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<RoomId>,
    Query(params): Query<HashMap<String, String>>,
    State(server): State<Arc<BattleServer>>,
) -> Response {
    let token = token_param(&params);
    ws.on_upgrade(move |socket| lobby::handle_socket(socket, server, room_id, token))
}

/// `GET /ws/battle/{room_id}/?token=...` — battle socket.
pub async fn battle_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<RoomId>,
    Query(params): Query<HashMap<String, String>>,
    State(server): State<Arc<BattleServer>>,
) -> Response {
    let token = token_param(&params);
    ws.on_upgrade(move |socket| battle::handle_socket(socket, server, room_id, token))
}
