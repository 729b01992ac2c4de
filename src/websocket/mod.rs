//! Realtime endpoints: global lobby, room lobby, and battle sockets.
//!
//! Each connection authenticates via a `token` query parameter, subscribes to
//! its bus topic, and then pumps frames both ways: bus events out, client
//! intents in. All payloads are JSON objects with a string `type` field.

mod battle;
mod handler;
mod lobby;
mod room_list;
mod routes;

pub use routes::ws_router;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use std::sync::Arc;

use crate::auth::{Identity, IdentityVerifier};
use crate::protocol::{close_codes, ClientMessage, ServerEvent};
use crate::server::BattleServer;

/// Send one event as a JSON text frame.
pub(crate) async fn send_event(
    socket: &mut WebSocket,
    event: &ServerEvent,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(event).unwrap_or_else(|err| {
        tracing::error!(error = %err, "Failed to serialize server event");
        r#"{"type":"error","message":"Internal serialization error"}"#.to_string()
    });
    socket.send(Message::Text(json.into())).await
}

/// Close the socket with a protocol close code.
pub(crate) async fn close_with(socket: &mut WebSocket, code: u16, reason: &str) {
    let frame = CloseFrame {
        code,
        reason: reason.to_string().into(),
    };
    let _ = socket.send(Message::Close(Some(frame))).await;
}

/// Authenticate a freshly-upgraded socket from its query token. Closes the
/// socket with 4001/4002 and returns `None` on failure.
pub(crate) async fn authenticate(
    socket: &mut WebSocket,
    server: &BattleServer,
    token: Option<String>,
) -> Option<Identity> {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        close_with(socket, close_codes::MISSING_TOKEN, "No token provided").await;
        return None;
    };

    match server.verifier().verify(&token) {
        Ok(identity) => Some(identity),
        Err(err) => {
            tracing::debug!(error = %err, "WebSocket token rejected");
            close_with(
                socket,
                close_codes::INVALID_TOKEN,
                "Invalid or expired token",
            )
            .await;
            None
        }
    }
}

/// Parse one inbound text frame, enforcing the size limit. `Err` carries the
/// error event to send back; the connection survives.
pub(crate) fn parse_frame(
    server: &Arc<BattleServer>,
    text: &str,
) -> Result<ClientMessage, ServerEvent> {
    use crate::protocol::RealtimeErrorCode;

    if text.len() > server.config().max_message_size {
        return Err(ServerEvent::error(
            RealtimeErrorCode::InvalidMessageFormat,
            format!(
                "Message too large ({} bytes, max {})",
                text.len(),
                server.config().max_message_size
            ),
        ));
    }

    match serde_json::from_str::<ClientMessage>(text) {
        Ok(intent) => Ok(intent),
        Err(_) => {
            // Well-formed JSON carrying an unrecognized (or malformed) intent
            // gets the unknown-type code; broken JSON gets the format code.
            let known_object = serde_json::from_str::<serde_json::Value>(text)
                .ok()
                .and_then(|value| {
                    value
                        .get("type")
                        .and_then(|t| t.as_str())
                        .map(str::to_string)
                });
            Err(match known_object {
                Some(message_type) => ServerEvent::error(
                    RealtimeErrorCode::UnknownMessageType,
                    format!("Unknown message type: {message_type}"),
                ),
                None => ServerEvent::error(
                    RealtimeErrorCode::InvalidMessageFormat,
                    RealtimeErrorCode::InvalidMessageFormat.message(),
                ),
            })
        }
    }
}
