use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error_codes::RealtimeErrorCode;
use super::types::{ChatMessage, FinishEntry, ParticipantEntry, QuestionId, RoomId, RoomSummary};

/// Intents sent from client to server over any of the realtime sockets.
///
/// All frames are JSON objects with a string `type` field. Unknown types are
/// answered with an `error` event rather than a disconnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ask for the current participant list (room lobby)
    RequestParticipants,
    /// Post a chat message to the room
    ChatMessage {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        sender: Option<String>,
    },
    /// Remove a participant (host only)
    KickParticipant { username: String },
    /// Toggle own readiness
    ReadyToggle {
        #[serde(default)]
        ready: bool,
    },
    /// Begin the synchronized battle countdown (host only)
    StartCountdown {
        #[serde(skip_serializing_if = "Option::is_none")]
        countdown: Option<u32>,
    },
    /// Close the room (host only)
    CloseRoom,
    /// Leave the room voluntarily
    LeaveRoom,
    /// Heartbeat
    Ping,
    /// Ask for the last chat lines
    RequestChatHistory,
    /// Ask for a fresh room-list snapshot (global lobby)
    RequestRoomList,
}

/// Minimal question reference carried by `battle_started`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionRef {
    pub id: QuestionId,
}

/// Question preview carried by `battle_ready`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionBrief {
    pub id: QuestionId,
    pub title: String,
    pub difficulty: String,
}

/// Events sent from server to clients, either directly or fanned out through
/// the event bus topics (`rooms`, `room_<id>`, `battle_<id>`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Chat line (user or system)
    ChatMessage {
        message: String,
        sender: String,
        timestamp: DateTime<Utc>,
        is_system: bool,
    },
    /// Reply to `request_chat_history`: last lines in timestamp order
    ChatHistory { messages: Vec<ChatMessage> },
    /// Full participant list plus room mode
    ParticipantList {
        participants: Vec<ParticipantEntry>,
        is_ranked: bool,
    },
    /// Participant membership changed
    ParticipantUpdate { participants: Vec<ParticipantEntry> },
    /// A participant left the lobby
    ParticipantLeft { username: String },
    /// A participant toggled readiness
    ReadyStatus { username: String, ready: bool },
    /// Countdown is about to begin; carries the selected question preview
    BattleReady {
        room_id: RoomId,
        question: QuestionBrief,
    },
    /// One tick of the synchronized countdown (n, n-1, ..., 0)
    Countdown { countdown: u32, is_ranked: bool },
    /// The battle has started
    BattleStarted {
        room_id: RoomId,
        question: QuestionRef,
    },
    /// A participant was kicked by the host
    Kicked { username: String },
    /// The room was closed; chat has been cleared
    RoomClosed,
    /// Initial room-list snapshot (global lobby)
    RoomList { rooms: Vec<RoomSummary> },
    /// Room-list delta fan-out on any visible room change
    RoomUpdate { rooms: Vec<RoomSummary> },
    /// Periodic battle clock tick
    TimeUpdate {
        elapsed_seconds: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        remaining_seconds: Option<u64>,
    },
    /// A participant's submission passed all testcases
    CodeVerified {
        username: String,
        position: u32,
        completion_time: DateTime<Utc>,
    },
    /// Terminal battle event; emitted at most once per room
    BattleCompleted {
        winners: Vec<FinishEntry>,
        room_capacity: u32,
        message: String,
    },
    /// Heartbeat reply
    Pong,
    /// Connection acknowledgement (battle socket)
    Connected { message: String },
    /// Recoverable protocol error
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<u16>,
    },
}

impl ServerEvent {
    /// Build an `error` event from a realtime error code.
    pub fn error(code: RealtimeErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            code: Some(code.code()),
        }
    }
}
