use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use tokio::sync::broadcast;

use crate::bus::battle_topic;
use crate::protocol::{
    close_codes, ClientMessage, RealtimeErrorCode, RoomId, RoomStatus, ServerEvent,
};
use crate::server::BattleServer;
use crate::store::BattleStore;

use super::{authenticate, close_with, parse_frame, send_event};

/// Battle connection: active after battle start. Forwards countdown, time,
/// verification, and completion events; accepts liveness pings.
pub(super) async fn handle_socket(
    mut socket: WebSocket,
    server: Arc<BattleServer>,
    room_id: RoomId,
    token: Option<String>,
) {
    let Some(identity) = authenticate(&mut socket, &server, token).await else {
        return;
    };

    let room = match server.store().get_room(&room_id).await {
        Ok(Some(room)) => room,
        _ => {
            close_with(&mut socket, close_codes::ROOM_NOT_FOUND, "Room not found").await;
            return;
        }
    };

    let mut events = server.bus().subscribe(&battle_topic(&room_id));

    // Attach the room's clock if the battle is running against a limit and
    // no worker owns one yet (e.g. after a restart re-derived from
    // start_time).
    if room.status == RoomStatus::Playing && room.time_limit > 0 {
        server.spawn_battle_clock(room_id);
    }

    server.metrics().increment_ws_connections();
    tracing::info!(user = %identity.username, %room_id, "Connected to battle room");

    let connected = ServerEvent::Connected {
        message: format!("Connected to battle room: {room_id}"),
    };
    if send_event(&mut socket, &connected).await.is_err() {
        server.metrics().increment_ws_disconnections();
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if send_event(&mut socket, &event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(user = %identity.username, %room_id, skipped, "Battle subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            frame = socket.recv() => {
                let Some(Ok(message)) = frame else {
                    break;
                };
                match message {
                    Message::Text(text) => {
                        let reply = match parse_frame(&server, &text) {
                            Ok(ClientMessage::Ping) => ServerEvent::Pong,
                            Ok(_) => ServerEvent::error(
                                RealtimeErrorCode::UnknownMessageType,
                                "Unsupported message type for a battle room",
                            ),
                            Err(error_event) => error_event,
                        };
                        if send_event(&mut socket, &reply).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    server.metrics().increment_ws_disconnections();
    tracing::info!(user = %identity.username, %room_id, "Disconnected from battle room");
}
