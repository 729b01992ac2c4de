/// WebSocket close codes used by the realtime endpoints.
///
/// 4001/4002 fire before the session is established; 4003 on send failure;
/// 4005 covers both room-not-found and private-room authorization so a prober
/// cannot distinguish the two.
pub mod close_codes {
    pub const MISSING_TOKEN: u16 = 4001;
    pub const INVALID_TOKEN: u16 = 4002;
    pub const SEND_ERROR: u16 = 4003;
    pub const ROOM_NOT_FOUND: u16 = 4005;
}

/// Recoverable realtime protocol errors, delivered as `error` events without
/// closing the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealtimeErrorCode {
    AuthFailed,
    InvalidMessageFormat,
    UnknownMessageType,
    RoomNotFound,
    EmptyMessage,
    HostOnlyKick,
    UsernameRequired,
    KickFailed,
    HostOnlyCountdown,
    RankedNotReady,
    HostOnlyClose,
    CloseRoomFailed,
    NoQuestionSelected,
    PrivateRoomNotAuthorized,
}

impl RealtimeErrorCode {
    pub fn code(&self) -> u16 {
        match self {
            Self::AuthFailed => 4001,
            Self::InvalidMessageFormat => 4003,
            Self::UnknownMessageType => 4004,
            Self::RoomNotFound | Self::PrivateRoomNotAuthorized => 4005,
            Self::EmptyMessage => 4006,
            Self::HostOnlyKick => 4007,
            Self::UsernameRequired => 4008,
            Self::KickFailed => 4009,
            Self::HostOnlyCountdown => 4010,
            Self::RankedNotReady => 4011,
            Self::HostOnlyClose => 4012,
            Self::CloseRoomFailed => 4013,
            Self::NoQuestionSelected => 4014,
        }
    }

    /// Default human-readable message for this error.
    pub fn message(&self) -> &'static str {
        match self {
            Self::AuthFailed => "Authentication failed",
            Self::InvalidMessageFormat => "Invalid message format",
            Self::UnknownMessageType => "Unknown message type",
            Self::RoomNotFound => "Room not found",
            Self::EmptyMessage => "Message cannot be empty",
            Self::HostOnlyKick => "Only the host can kick participants",
            Self::UsernameRequired => "Username is required",
            Self::KickFailed => "Failed to kick participant",
            Self::HostOnlyCountdown => "Only the host can start the countdown",
            Self::RankedNotReady => "All participants must be ready for ranked mode",
            Self::HostOnlyClose => "Only the host can close the room",
            Self::CloseRoomFailed => "Failed to close room",
            Self::NoQuestionSelected => "No question selected for this room",
            Self::PrivateRoomNotAuthorized => "Not authorized to join private room",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_protocol_contract() {
        assert_eq!(close_codes::MISSING_TOKEN, 4001);
        assert_eq!(close_codes::INVALID_TOKEN, 4002);
        assert_eq!(close_codes::SEND_ERROR, 4003);
        assert_eq!(close_codes::ROOM_NOT_FOUND, 4005);

        assert_eq!(RealtimeErrorCode::HostOnlyCountdown.code(), 4010);
        assert_eq!(RealtimeErrorCode::RankedNotReady.code(), 4011);
        assert_eq!(
            RealtimeErrorCode::PrivateRoomNotAuthorized.code(),
            close_codes::ROOM_NOT_FOUND
        );
    }
}
