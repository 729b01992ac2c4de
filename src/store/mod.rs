//! Room store: durable record of rooms, participants, chat, battle results,
//! rankings, user stats, and the problem catalog.
//!
//! Every compound operation on the [`BattleStore`] trait is atomic at the
//! call boundary: implementations serialize conflicting writers (the
//! in-memory backend holds its room table lock for the whole call), so the
//! invariants — derived `participant_count`, contiguous winner positions,
//! at-most-once terminal transitions — hold under concurrent callers.

mod memory;

pub use memory::InMemoryStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::protocol::{
    BattleResult, ChatMessage, Difficulty, FinishEntry, FunctionSignature, Participant,
    ParticipantEntry, Question, QuestionId, Room, RoomConfig, RoomDetail, RoomId, RoomStatus,
    RoomSummary, TestCase, UserId, UserStats,
};
use crate::ranking::{RankingEntry, Season};

/// Result of a join attempt.
#[derive(Debug, Clone)]
pub enum JoinOutcome {
    /// A seat was taken (first join or re-activation of a left row)
    Joined {
        room: Room,
        participants: Vec<ParticipantEntry>,
    },
    /// The user already holds a joined seat; no state changed
    AlreadyJoined {
        room: Room,
        participants: Vec<ParticipantEntry>,
    },
    /// The user was kicked earlier and can never rejoin
    Blocked,
    /// All seats taken
    Full,
    /// Private room, wrong password
    WrongPassword,
    /// Room is not accepting joins in its current status
    NotJoinable(RoomStatus),
    NotFound,
}

/// Result of a start attempt.
#[derive(Debug, Clone)]
pub enum StartOutcome {
    Started { room: Room },
    NotHost,
    WrongState(RoomStatus),
    NotEnoughParticipants { joined: u32, minimum: u32 },
    NotAllReady,
    NotFound,
}

/// Result of recording an accepted submission.
#[derive(Debug, Clone)]
pub enum SubmissionOutcome {
    /// The user already held a position; nothing changed
    AlreadyRecorded { position: u32 },
    /// A new position was assigned
    Recorded {
        position: u32,
        completion_time: DateTime<Utc>,
        /// Set when this submission filled the last winning slot
        completion: Option<CompletionSnapshot>,
    },
    /// Room is not in the playing state
    NotPlaying(RoomStatus),
    NotFound,
}

/// Winners payload captured when a room transitions to `completed`.
#[derive(Debug, Clone)]
pub struct CompletionSnapshot {
    pub winners: Vec<FinishEntry>,
    pub room_capacity: u32,
}

/// Storage abstraction for the room/battle engine.
#[async_trait]
pub trait BattleStore: Send + Sync {
    /// Initialize the backing storage (seed season, run migrations).
    async fn initialize(&self) -> Result<()>;

    // --- rooms ---

    /// Create a room with a fresh unique join code; the owner is inserted as
    /// a `(host, joined)` participant.
    async fn create_room(
        &self,
        owner_id: UserId,
        owner_name: &str,
        cfg: &RoomConfig,
    ) -> Result<Room>;

    async fn get_room(&self, room_id: &RoomId) -> Result<Option<Room>>;

    async fn room_detail(&self, room_id: &RoomId) -> Result<Option<RoomDetail>>;

    async fn list_active_rooms(&self) -> Result<Vec<RoomSummary>>;

    /// Join a room over HTTP. Seat races are resolved under the room lock
    /// with capacity re-checked after acquisition.
    async fn join_room(
        &self,
        room_id: &RoomId,
        user_id: UserId,
        username: &str,
        password: Option<&str>,
    ) -> Result<JoinOutcome>;

    /// Ensure a joined participant row exists for a realtime connection.
    /// Unlike [`join_room`](Self::join_room) this skips the password check
    /// (connection authorization happens at socket accept), but blocked users
    /// are still rejected.
    async fn ensure_joined(
        &self,
        room_id: &RoomId,
        user_id: UserId,
        username: &str,
    ) -> Result<JoinOutcome>;

    /// Whether the user holds any non-kicked participant row in the room.
    async fn has_participant(&self, room_id: &RoomId, user_id: &UserId) -> Result<bool>;

    async fn participants(&self, room_id: &RoomId) -> Result<Vec<ParticipantEntry>>;

    async fn participant(&self, room_id: &RoomId, user_id: &UserId)
        -> Result<Option<Participant>>;

    async fn is_host(&self, room_id: &RoomId, user_id: &UserId) -> Result<bool>;

    /// Mark a participant `left` and recompute the seat count. Returns the
    /// updated participant list, or `None` when the row does not exist.
    async fn mark_left(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
    ) -> Result<Option<Vec<ParticipantEntry>>>;

    /// Kick a joined participant: `status=kicked, blocked=true`.
    async fn kick(&self, room_id: &RoomId, target_username: &str) -> Result<bool>;

    async fn set_ready(&self, room_id: &RoomId, user_id: &UserId, ready: bool) -> Result<bool>;

    /// Atomically move an `active` room to `playing`: validates the caller is
    /// host, minimum seats, and (ranked) readiness; stamps `start_time` and
    /// `active_question`; increments each joined participant's battle count.
    async fn start_room(
        &self,
        room_id: &RoomId,
        host_id: &UserId,
        question_id: QuestionId,
        now: DateTime<Utc>,
    ) -> Result<StartOutcome>;

    /// Check-and-set a non-terminal room to `closed`. Returns false when the
    /// room was already terminal or absent.
    async fn close_room(&self, room_id: &RoomId) -> Result<bool>;

    /// Check-and-set `playing -> completed`. Returns the winners snapshot
    /// when this call performed the transition; `None` makes the losing path
    /// (timer vs. submission) a no-op.
    async fn complete_room(
        &self,
        room_id: &RoomId,
    ) -> Result<Option<CompletionSnapshot>>;

    // --- chat ---

    async fn save_chat_message(
        &self,
        room_id: &RoomId,
        sender: &str,
        body: &str,
        is_system: bool,
    ) -> Result<Option<ChatMessage>>;

    /// Last `limit` messages in timestamp order.
    async fn chat_history(&self, room_id: &RoomId, limit: usize) -> Result<Vec<ChatMessage>>;

    async fn clear_chat(&self, room_id: &RoomId) -> Result<()>;

    // --- battle results ---

    /// Record an accepted submission: assigns the next contiguous position,
    /// idempotent per user, and performs the `completed` transition plus
    /// ranked rating updates inside the same atomic step when the last
    /// winning slot fills.
    async fn record_submission(
        &self,
        room_id: &RoomId,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<SubmissionOutcome>;

    async fn battle_result(&self, room_id: &RoomId) -> Result<Option<BattleResult>>;

    // --- problem catalog ---

    async fn question(&self, question_id: &QuestionId) -> Result<Option<Question>>;

    async fn testcases(&self, question_id: &QuestionId) -> Result<Vec<TestCase>>;

    async fn function_signature(
        &self,
        question_id: &QuestionId,
    ) -> Result<Option<FunctionSignature>>;

    /// Ids of questions eligible for `(topic, difficulty)`: validated, and
    /// either curated or accepted contributions.
    async fn eligible_questions(
        &self,
        topic: &str,
        difficulty: Difficulty,
    ) -> Result<Vec<QuestionId>>;

    /// Seed a question with its testcases and signature.
    async fn insert_question(
        &self,
        question: Question,
        testcases: Vec<TestCase>,
        signature: Option<FunctionSignature>,
    ) -> Result<()>;

    // --- rankings & stats ---

    async fn active_season(&self) -> Result<Option<Season>>;

    async fn top_rankings(&self, limit: usize) -> Result<Vec<RankingEntry>>;

    async fn user_stats(&self, username: &str) -> Result<UserStats>;

    // --- maintenance ---

    /// Rooms past their reclamation cutoffs: `active` rooms older than
    /// `active_cutoff` that never started, and `playing` rooms whose
    /// `start_time` is older than `playing_cutoff`.
    async fn stale_room_ids(
        &self,
        now: DateTime<Utc>,
        active_cutoff: chrono::Duration,
        playing_cutoff: chrono::Duration,
    ) -> Result<Vec<RoomId>>;

    /// Delete the room and everything hanging off it (participants, chat,
    /// battle results) in one atomic step. Absent rooms succeed trivially.
    async fn purge_room(&self, room_id: &RoomId) -> Result<bool>;

    async fn health_check(&self) -> bool;
}
