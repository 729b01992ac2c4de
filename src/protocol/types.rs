use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default constants for validation (can be overridden by config)
#[allow(dead_code)]
pub const DEFAULT_JOIN_CODE_LENGTH: usize = 8;
#[allow(dead_code)]
pub const DEFAULT_CHAT_HISTORY_LIMIT: usize = 100;
/// Rating every player starts a season with.
pub const INITIAL_RATING: f64 = 1200.0;

/// Unique identifier for users
pub type UserId = Uuid;
/// Unique identifier for rooms
pub type RoomId = Uuid;
/// Unique identifier for questions
pub type QuestionId = Uuid;

/// Problem difficulty tier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Room visibility
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// Room lifecycle status.
///
/// Transitions are monotone along `active -> playing -> completed`; any
/// non-terminal status may jump to `closed` (host action or host departure).
/// `completed` and `closed` are terminal and scheduled for deletion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    #[default]
    Active,
    Playing,
    Completed,
    Closed,
}

impl RoomStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Closed)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: RoomStatus) -> bool {
        match (self, next) {
            (Self::Active, Self::Playing) => true,
            (Self::Playing, Self::Completed) => true,
            (Self::Active | Self::Playing, Self::Closed) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Playing => "playing",
            Self::Completed => "completed",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Participant role within a room. Exactly one host per room: the owner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Host,
    #[default]
    Participant,
}

/// Participant membership status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    #[default]
    Waiting,
    Joined,
    Left,
    Kicked,
}

/// Room configuration and state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub room_id: RoomId,
    /// Short human-shareable code, unique across all rooms.
    pub join_code: String,
    pub name: String,
    pub owner: String,
    pub topic: String,
    pub difficulty: Difficulty,
    /// Minutes; 0 means unlimited.
    pub time_limit: u32,
    pub capacity: u32,
    /// Derived: number of participants whose status is `joined`.
    pub participant_count: u32,
    pub visibility: Visibility,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub is_ranked: bool,
    pub is_active: bool,
    pub status: RoomStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_question: Option<QuestionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Room {
    pub fn is_full(&self) -> bool {
        self.participant_count >= self.capacity
    }

    /// Number of finishing positions that end the battle, derived from capacity.
    pub fn max_winners(&self) -> u32 {
        max_winners_for_capacity(self.capacity)
    }

    /// Minimum joined participants required to start.
    pub fn min_participants(&self) -> u32 {
        min_participants_for_capacity(self.capacity)
    }

    /// Wall-clock deadline of the battle, if one applies.
    pub fn battle_deadline(&self) -> Option<DateTime<Utc>> {
        match (self.start_time, self.time_limit) {
            (Some(start), limit) if limit > 0 => {
                Some(start + chrono::Duration::minutes(i64::from(limit)))
            }
            _ => None,
        }
    }

    /// Whether the battle's time limit has elapsed at `now`.
    pub fn time_limit_exceeded(&self, now: DateTime<Utc>) -> bool {
        self.battle_deadline().is_some_and(|deadline| now >= deadline)
    }
}

pub fn max_winners_for_capacity(capacity: u32) -> u32 {
    match capacity {
        2 => 1,
        5 => 2,
        10 => 3,
        _ => 1,
    }
}

pub fn min_participants_for_capacity(capacity: u32) -> u32 {
    match capacity {
        2 => 2,
        5 => 3,
        10 => 6,
        _ => 2,
    }
}

/// A user's membership row in a room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: UserId,
    pub username: String,
    pub role: ParticipantRole,
    pub status: ParticipantStatus,
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_at: Option<DateTime<Utc>>,
    pub joined_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_at: Option<DateTime<Utc>>,
    /// Kicked participants are blocked and can never rejoin.
    pub blocked: bool,
}

impl Participant {
    pub fn is_joined(&self) -> bool {
        self.status == ParticipantStatus::Joined
    }

    pub fn is_host(&self) -> bool {
        self.role == ParticipantRole::Host
    }
}

/// Wire representation of a participant in list payloads
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParticipantEntry {
    pub username: String,
    pub role: ParticipantRole,
    pub status: ParticipantStatus,
    pub ready: bool,
}

impl From<&Participant> for ParticipantEntry {
    fn from(p: &Participant) -> Self {
        Self {
            username: p.username.clone(),
            role: p.role,
            status: p.status,
            ready: p.ready,
        }
    }
}

/// Room plus its participant rows, as returned by detail fetches
#[derive(Debug, Clone, Serialize)]
pub struct RoomDetail {
    #[serde(flatten)]
    pub room: Room,
    pub participants: Vec<ParticipantEntry>,
}

/// Compact room view used in room-list snapshots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub join_code: String,
    pub name: String,
    pub owner: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub time_limit: u32,
    pub capacity: u32,
    pub participant_count: u32,
    pub visibility: Visibility,
    pub status: RoomStatus,
    pub is_ranked: bool,
    pub participants: Vec<ParticipantEntry>,
}

/// A chat line within a room. System messages are generated server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    pub message: String,
    pub is_system: bool,
    pub timestamp: DateTime<Utc>,
}

/// One finishing-order entry of a battle result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinishEntry {
    pub username: String,
    pub position: u32,
    pub completion_time: DateTime<Utc>,
}

/// Ordered finishing record for a `(room, question)` pair.
///
/// Entries are appended in finishing order; a given user appears at most
/// once, and positions form a contiguous `1..=n` prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleResult {
    pub battle_id: Uuid,
    pub room_id: RoomId,
    pub question_id: QuestionId,
    pub results: Vec<FinishEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BattleResult {
    pub fn new(room_id: RoomId, question_id: QuestionId, now: DateTime<Utc>) -> Self {
        Self {
            battle_id: Uuid::new_v4(),
            room_id,
            question_id,
            results: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn position_of(&self, username: &str) -> Option<u32> {
        self.results
            .iter()
            .find(|entry| entry.username == username)
            .map(|entry| entry.position)
    }
}

/// Per-user lifetime battle counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserStats {
    pub total_battles: u32,
    pub battles_won: u32,
}
