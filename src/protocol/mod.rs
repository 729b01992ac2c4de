//! Wire protocol and core domain types: rooms, participants, battle results,
//! realtime message envelopes, join codes, and close/error codes.

pub mod error_codes;
pub mod join_codes;
pub mod messages;
pub mod questions;
pub mod types;
pub mod validation;

pub use error_codes::{close_codes, RealtimeErrorCode};
pub use messages::{ClientMessage, QuestionBrief, QuestionRef, ServerEvent};
pub use questions::{ContributionStatus, FunctionSignature, Question, TestCase};
pub use types::{
    max_winners_for_capacity, min_participants_for_capacity, BattleResult, ChatMessage,
    Difficulty, FinishEntry, Participant, ParticipantEntry, ParticipantRole, ParticipantStatus,
    QuestionId, Room, RoomDetail, RoomId, RoomStatus, RoomSummary, UserId, UserStats, Visibility,
    INITIAL_RATING,
};
pub use validation::RoomConfig;
