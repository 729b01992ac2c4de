use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};

use crate::bus::ROOMS_TOPIC;
use crate::protocol::{close_codes, ClientMessage, RealtimeErrorCode, ServerEvent};
use crate::server::BattleServer;
use crate::store::BattleStore;

use super::{authenticate, close_with, parse_frame, send_event};

/// Global lobby connection: one `room_list` snapshot on connect, then
/// `room_update` fan-outs for every visible room change.
pub(super) async fn handle_socket(
    mut socket: WebSocket,
    server: Arc<BattleServer>,
    token: Option<String>,
) {
    let Some(identity) = authenticate(&mut socket, &server, token).await else {
        return;
    };

    server.metrics().increment_ws_connections();
    tracing::info!(user = %identity.username, "Connected to room list");

    let mut events = server.bus().subscribe(ROOMS_TOPIC);

    if send_snapshot(&mut socket, &server).await.is_err() {
        close_with(&mut socket, close_codes::SEND_ERROR, "Error sending room list").await;
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
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(user = %identity.username, skipped, "Room list subscriber lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            frame = socket.recv() => {
                let Some(Ok(message)) = frame else {
                    break;
                };
                match message {
                    Message::Text(text) => {
                        let reply = match parse_frame(&server, &text) {
                            Ok(ClientMessage::RequestRoomList) => {
                                if send_snapshot(&mut socket, &server).await.is_err() {
                                    break;
                                }
                                continue;
                            }
                            Ok(ClientMessage::Ping) => ServerEvent::Pong,
                            Ok(_) => ServerEvent::error(
                                RealtimeErrorCode::UnknownMessageType,
                                "Unsupported message type for the room list",
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
    tracing::info!(user = %identity.username, "Disconnected from room list");
}

async fn send_snapshot(
    socket: &mut WebSocket,
    server: &Arc<BattleServer>,
) -> Result<(), axum::Error> {
    let rooms = match server.store().list_active_rooms().await {
        Ok(rooms) => rooms,
        Err(err) => {
            tracing::error!(error = %err, "Failed to load room list");
            Vec::new()
        }
    };
    send_event(socket, &ServerEvent::RoomList { rooms }).await
}
