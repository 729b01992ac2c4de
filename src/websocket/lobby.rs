use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use tokio::sync::broadcast;

use crate::auth::Identity;
use crate::bus::room_topic;
use crate::protocol::{
    close_codes, ClientMessage, QuestionBrief, RealtimeErrorCode, RoomId, RoomStatus, ServerEvent,
    Visibility,
};
use crate::server::{BattleServer, ServiceError};
use crate::store::{BattleStore, JoinOutcome};

use super::{authenticate, close_with, parse_frame, send_event};

/// Room lobby connection lifecycle: authenticate, authorize (private rooms
/// require an existing non-kicked row), take a seat, then pump events and
/// intents. Disconnecting marks the participant `left`.
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
        Ok(None) => {
            close_with(&mut socket, close_codes::ROOM_NOT_FOUND, "Room not found").await;
            return;
        }
        Err(err) => {
            tracing::error!(%room_id, error = %err, "Room lookup failed on connect");
            close_with(&mut socket, close_codes::ROOM_NOT_FOUND, "Room not found").await;
            return;
        }
    };

    // Private rooms admit only the host and users already holding a
    // non-kicked participant row; the close code does not reveal which
    // check failed.
    if room.visibility == Visibility::Private && room.owner != identity.username {
        let allowed = server
            .store()
            .has_participant(&room_id, &identity.user_id)
            .await
            .unwrap_or(false);
        if !allowed {
            close_with(
                &mut socket,
                close_codes::ROOM_NOT_FOUND,
                RealtimeErrorCode::PrivateRoomNotAuthorized.message(),
            )
            .await;
            return;
        }
    }

    // Subscribe before taking the seat so this connection sees its own join
    // announcements.
    let mut events = server.bus().subscribe(&room_topic(&room_id));

    match server
        .store()
        .ensure_joined(&room_id, identity.user_id, &identity.username)
        .await
    {
        Ok(JoinOutcome::Joined { participants, .. }) => {
            server.metrics().increment_rooms_joined();
            server
                .system_chat(&room_id, &format!("{} joined the lobby", identity.username))
                .await;
            server.publish_room(&room_id, ServerEvent::ParticipantUpdate { participants });
            server.broadcast_rooms_update().await;
        }
        Ok(JoinOutcome::AlreadyJoined { .. }) => {}
        Ok(JoinOutcome::Blocked | JoinOutcome::NotJoinable(_) | JoinOutcome::Full) => {
            close_with(
                &mut socket,
                close_codes::ROOM_NOT_FOUND,
                RealtimeErrorCode::PrivateRoomNotAuthorized.message(),
            )
            .await;
            return;
        }
        Ok(JoinOutcome::WrongPassword) | Ok(JoinOutcome::NotFound) => {
            close_with(&mut socket, close_codes::ROOM_NOT_FOUND, "Room not found").await;
            return;
        }
        Err(err) => {
            tracing::error!(%room_id, error = %err, "Failed to seat participant");
            close_with(&mut socket, close_codes::SEND_ERROR, "Internal error").await;
            return;
        }
    }

    server.metrics().increment_ws_connections();
    tracing::info!(user = %identity.username, %room_id, "Joined room lobby");

    // Initial state for this client: participant list and chat history.
    let _ = send_participant_list(&mut socket, &server, &room_id).await;
    let _ = send_chat_history(&mut socket, &server, &room_id).await;

    let mut left_voluntarily = false;

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
                        tracing::warn!(
                            user = %identity.username,
                            %room_id,
                            skipped,
                            "Lobby subscriber lagged; client should re-sync"
                        );
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
                        let intent = match parse_frame(&server, &text) {
                            Ok(intent) => intent,
                            Err(error_event) => {
                                if send_event(&mut socket, &error_event).await.is_err() {
                                    break;
                                }
                                continue;
                            }
                        };
                        if handle_intent(
                            &mut socket,
                            &server,
                            &identity,
                            &room_id,
                            intent,
                            &mut left_voluntarily,
                        )
                        .await
                        .is_err()
                        {
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
    tracing::info!(user = %identity.username, %room_id, "Left room lobby");

    if !left_voluntarily {
        if let Err(err) = server.leave_room(&identity, &room_id).await {
            tracing::warn!(%room_id, user = %identity.username, error = %err, "Leave on disconnect failed");
        }
    }
}

/// Route one client intent. `Err` means the socket is dead.
async fn handle_intent(
    socket: &mut WebSocket,
    server: &Arc<BattleServer>,
    identity: &Identity,
    room_id: &RoomId,
    intent: ClientMessage,
    left_voluntarily: &mut bool,
) -> Result<(), axum::Error> {
    match intent {
        ClientMessage::RequestParticipants => {
            broadcast_participant_list(server, room_id).await;
        }
        ClientMessage::ChatMessage { message, .. } => {
            if let Err(err) = server.post_chat(identity, room_id, &message).await {
                let event = match err {
                    ServiceError::InvalidConfig(detail) => ServerEvent::Error {
                        message: detail,
                        code: Some(RealtimeErrorCode::EmptyMessage.code()),
                    },
                    other => ServerEvent::error(
                        RealtimeErrorCode::RoomNotFound,
                        other.to_string(),
                    ),
                };
                send_event(socket, &event).await?;
            }
        }
        ClientMessage::KickParticipant { username } => {
            if username.trim().is_empty() {
                let event = ServerEvent::error(
                    RealtimeErrorCode::UsernameRequired,
                    RealtimeErrorCode::UsernameRequired.message(),
                );
                return send_event(socket, &event).await;
            }
            if let Err(err) = server.kick_participant(identity, room_id, &username).await {
                let event = match err {
                    ServiceError::Forbidden(_) => ServerEvent::error(
                        RealtimeErrorCode::HostOnlyKick,
                        RealtimeErrorCode::HostOnlyKick.message(),
                    ),
                    _ => ServerEvent::error(
                        RealtimeErrorCode::KickFailed,
                        format!("Failed to kick {username}"),
                    ),
                };
                send_event(socket, &event).await?;
            }
        }
        ClientMessage::ReadyToggle { ready } => {
            if let Err(err) = server.set_ready(identity, room_id, ready).await {
                tracing::debug!(%room_id, error = %err, "Ready toggle rejected");
            }
        }
        ClientMessage::StartCountdown { countdown } => {
            if let Some(error_event) =
                start_countdown(server, identity, room_id, countdown).await
            {
                send_event(socket, &error_event).await?;
            }
        }
        ClientMessage::CloseRoom => {
            if let Err(err) = server.close_room(identity, room_id).await {
                let event = match err {
                    ServiceError::Forbidden(_) => ServerEvent::error(
                        RealtimeErrorCode::HostOnlyClose,
                        RealtimeErrorCode::HostOnlyClose.message(),
                    ),
                    _ => ServerEvent::error(
                        RealtimeErrorCode::CloseRoomFailed,
                        RealtimeErrorCode::CloseRoomFailed.message(),
                    ),
                };
                send_event(socket, &event).await?;
            }
        }
        ClientMessage::LeaveRoom => {
            *left_voluntarily = true;
            if let Err(err) = server.leave_room(identity, room_id).await {
                tracing::warn!(%room_id, error = %err, "Voluntary leave failed");
            }
        }
        ClientMessage::Ping => {
            send_event(socket, &ServerEvent::Pong).await?;
        }
        ClientMessage::RequestChatHistory => {
            send_chat_history(socket, server, room_id).await?;
        }
        ClientMessage::RequestRoomList => {
            let event = ServerEvent::error(
                RealtimeErrorCode::UnknownMessageType,
                "Unsupported message type for a room lobby",
            );
            send_event(socket, &event).await?;
        }
    }
    Ok(())
}

/// Host intent: validate, then run the synchronized countdown as its own
/// task so this connection keeps pumping events (including its own ticks).
async fn start_countdown(
    server: &Arc<BattleServer>,
    identity: &Identity,
    room_id: &RoomId,
    countdown: Option<u32>,
) -> Option<ServerEvent> {
    let is_host = server
        .store()
        .is_host(room_id, &identity.user_id)
        .await
        .unwrap_or(false);
    if !is_host {
        return Some(ServerEvent::error(
            RealtimeErrorCode::HostOnlyCountdown,
            RealtimeErrorCode::HostOnlyCountdown.message(),
        ));
    }

    let room = match server.store().get_room(room_id).await {
        Ok(Some(room)) => room,
        _ => {
            return Some(ServerEvent::error(
                RealtimeErrorCode::RoomNotFound,
                RealtimeErrorCode::RoomNotFound.message(),
            ))
        }
    };

    // The countdown presumes a started battle: the start endpoint selected
    // the question and moved the room to `playing`.
    let Some(question_id) = room.active_question else {
        return Some(ServerEvent::error(
            RealtimeErrorCode::NoQuestionSelected,
            RealtimeErrorCode::NoQuestionSelected.message(),
        ));
    };
    if room.status != RoomStatus::Playing {
        return Some(ServerEvent::error(
            RealtimeErrorCode::NoQuestionSelected,
            "Battle has not been started",
        ));
    }

    if room.is_ranked {
        let participants = server.store().participants(room_id).await.unwrap_or_default();
        let all_ready = participants
            .iter()
            .filter(|p| {
                p.role != crate::protocol::ParticipantRole::Host
                    && p.status == crate::protocol::ParticipantStatus::Joined
            })
            .all(|p| p.ready);
        if !all_ready {
            return Some(ServerEvent::error(
                RealtimeErrorCode::RankedNotReady,
                RealtimeErrorCode::RankedNotReady.message(),
            ));
        }
    }

    let question = server.store().question(&question_id).await.ok().flatten();
    let brief = QuestionBrief {
        id: question_id,
        title: question.as_ref().map(|q| q.title.clone()).unwrap_or_default(),
        difficulty: room.difficulty.to_string(),
    };

    let ticks = countdown.unwrap_or(server.config().countdown_secs).min(60);
    let server = Arc::clone(server);
    let room_id = *room_id;
    let is_ranked = room.is_ranked;
    tokio::spawn(async move {
        server.publish_room(
            &room_id,
            ServerEvent::BattleReady {
                room_id,
                question: brief,
            },
        );

        for n in (0..=ticks).rev() {
            server.publish_room(
                &room_id,
                ServerEvent::Countdown {
                    countdown: n,
                    is_ranked,
                },
            );
            tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
        }

        tracing::info!(%room_id, question = %question_id, "Countdown finished, battle underway");
        server.publish_battle(
            &room_id,
            ServerEvent::BattleStarted {
                room_id,
                question: crate::protocol::QuestionRef { id: question_id },
            },
        );
    });

    None
}

async fn broadcast_participant_list(server: &Arc<BattleServer>, room_id: &RoomId) {
    let Ok(Some(room)) = server.store().get_room(room_id).await else {
        return;
    };
    let participants = server.store().participants(room_id).await.unwrap_or_default();
    server.publish_room(
        room_id,
        ServerEvent::ParticipantList {
            participants,
            is_ranked: room.is_ranked,
        },
    );
}

async fn send_participant_list(
    socket: &mut WebSocket,
    server: &Arc<BattleServer>,
    room_id: &RoomId,
) -> Result<(), axum::Error> {
    let Ok(Some(room)) = server.store().get_room(room_id).await else {
        return Ok(());
    };
    let participants = server.store().participants(room_id).await.unwrap_or_default();
    send_event(
        socket,
        &ServerEvent::ParticipantList {
            participants,
            is_ranked: room.is_ranked,
        },
    )
    .await
}

async fn send_chat_history(
    socket: &mut WebSocket,
    server: &Arc<BattleServer>,
    room_id: &RoomId,
) -> Result<(), axum::Error> {
    let messages = server.chat_history(room_id).await.unwrap_or_default();
    send_event(socket, &ServerEvent::ChatHistory { messages }).await
}
