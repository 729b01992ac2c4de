//! In-memory store backend.
//!
//! A single `RwLock` over the room table serializes every compound room
//! operation, which is what gives the trait its transactional guarantees:
//! the last-seat race, winner-position assignment, and terminal check-and-set
//! all happen under one writer lock. Lock ordering, where multiple maps are
//! touched: rooms -> join_codes -> stats -> seasons -> rankings.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::protocol::{
    join_codes, BattleResult, ChatMessage, Difficulty, FinishEntry, FunctionSignature,
    Participant, ParticipantEntry, ParticipantRole, ParticipantStatus, Question, QuestionId,
    Room, RoomConfig, RoomDetail, RoomId, RoomStatus, RoomSummary, TestCase, UserId, UserStats,
    Visibility,
};
use crate::ranking::{self, Ranking, RankingEntry, Season, K_FACTOR};

use super::{
    BattleStore, CompletionSnapshot, JoinOutcome, StartOutcome, SubmissionOutcome,
};

const JOIN_CODE_ATTEMPTS: u8 = 16;

struct RoomRecord {
    room: Room,
    participants: Vec<Participant>,
    chat: Vec<ChatMessage>,
    result: Option<BattleResult>,
    /// Guard so final rating updates run exactly once per room.
    ratings_applied: bool,
}

impl RoomRecord {
    fn joined_count(&self) -> u32 {
        self.participants.iter().filter(|p| p.is_joined()).count() as u32
    }

    fn recount(&mut self, now: DateTime<Utc>) {
        self.room.participant_count = self.joined_count();
        self.room.updated_at = now;
    }

    fn entries(&self) -> Vec<ParticipantEntry> {
        self.participants.iter().map(ParticipantEntry::from).collect()
    }

    fn find(&self, user_id: &UserId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.user_id == user_id)
    }

    fn find_mut(&mut self, user_id: &UserId) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| &p.user_id == user_id)
    }

    fn summary(&self) -> RoomSummary {
        RoomSummary {
            room_id: self.room.room_id,
            join_code: self.room.join_code.clone(),
            name: self.room.name.clone(),
            owner: self.room.owner.clone(),
            topic: self.room.topic.clone(),
            difficulty: self.room.difficulty,
            time_limit: self.room.time_limit,
            capacity: self.room.capacity,
            participant_count: self.room.participant_count,
            visibility: self.room.visibility,
            status: self.room.status,
            is_ranked: self.room.is_ranked,
            participants: self.entries(),
        }
    }

    fn winners_snapshot(&self) -> CompletionSnapshot {
        let max_winners = self.room.max_winners() as usize;
        let winners = self
            .result
            .as_ref()
            .map(|r| r.results.iter().take(max_winners).cloned().collect())
            .unwrap_or_default();
        CompletionSnapshot {
            winners,
            room_capacity: self.room.capacity,
        }
    }
}

struct QuestionRecord {
    question: Question,
    testcases: Vec<TestCase>,
    signature: Option<FunctionSignature>,
}

/// In-memory database for tests and single-instance deployments.
pub struct InMemoryStore {
    rooms: RwLock<HashMap<RoomId, RoomRecord>>,
    join_codes: RwLock<HashSet<String>>,
    questions: RwLock<HashMap<QuestionId, QuestionRecord>>,
    seasons: RwLock<Vec<Season>>,
    rankings: RwLock<HashMap<(String, Uuid), Ranking>>,
    stats: RwLock<HashMap<String, UserStats>>,
    join_code_length: usize,
}

impl InMemoryStore {
    pub fn new(join_code_length: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            join_codes: RwLock::new(HashSet::new()),
            questions: RwLock::new(HashMap::new()),
            seasons: RwLock::new(Vec::new()),
            rankings: RwLock::new(HashMap::new()),
            stats: RwLock::new(HashMap::new()),
            join_code_length,
        }
    }

    fn new_participant(
        user_id: UserId,
        username: &str,
        role: ParticipantRole,
        now: DateTime<Utc>,
    ) -> Participant {
        Participant {
            user_id,
            username: username.to_string(),
            role,
            status: ParticipantStatus::Joined,
            ready: false,
            ready_at: None,
            joined_at: now,
            left_at: None,
            blocked: false,
        }
    }

    /// Apply final Elo updates for a ranked room, once. Non-finishers tie at
    /// the last place. Called with the rooms write lock held.
    async fn apply_final_ratings(&self, record: &mut RoomRecord) {
        if !record.room.is_ranked || record.ratings_applied {
            return;
        }

        let joined: Vec<String> = record
            .participants
            .iter()
            .filter(|p| p.is_joined())
            .map(|p| p.username.clone())
            .collect();
        if joined.len() < 2 {
            return;
        }

        let finish_position = |name: &str| -> Option<u32> {
            record
                .result
                .as_ref()
                .and_then(|result| result.position_of(name))
        };
        if !joined.iter().any(|name| finish_position(name).is_some()) {
            // Timer fired with no accepted submissions; nothing to rate.
            return;
        }

        let mut seasons = self.seasons.write().await;
        let season = match seasons.iter_mut().find(|s| s.is_active) {
            Some(season) => season.clone(),
            None => {
                let season = Season::new("Season 1", Utc::now());
                seasons.push(season.clone());
                season
            }
        };
        drop(seasons);

        let mut rankings = self.rankings.write().await;
        let last_place = joined.len() as u32;
        let standings: Vec<(String, f64, u32)> = joined
            .iter()
            .map(|name| {
                let rating = rankings
                    .entry((name.clone(), season.id))
                    .or_insert_with(|| Ranking::new(name.clone(), season.id))
                    .rating;
                (name.clone(), rating, finish_position(name).unwrap_or(last_place))
            })
            .collect();

        let deltas: Vec<f64> = if standings.len() == 2 {
            // Head-to-head battles use the 1v1 formula directly.
            let (first, second) = (&standings[0], &standings[1]);
            let winner_is_first = first.2 < second.2;
            let (winner, loser) = if winner_is_first {
                (first, second)
            } else {
                (second, first)
            };
            let (dw, dl) = ranking::elo_1v1(winner.1, loser.1, K_FACTOR);
            if winner_is_first {
                vec![dw, dl]
            } else {
                vec![dl, dw]
            }
        } else {
            let players: Vec<(f64, u32)> =
                standings.iter().map(|(_, r, p)| (*r, *p)).collect();
            ranking::elo_squad(&players, K_FACTOR)
        };

        for ((name, _, position), delta) in standings.iter().zip(deltas) {
            if let Some(entry) = rankings.get_mut(&(name.clone(), season.id)) {
                entry.apply(delta, *position == 1);
            }
        }

        record.ratings_applied = true;
    }

    /// Shared join path for HTTP joins and realtime attach.
    /// `check_password` is false on the realtime path.
    async fn join_inner(
        &self,
        room_id: &RoomId,
        user_id: UserId,
        username: &str,
        password: Option<&str>,
        check_password: bool,
    ) -> Result<JoinOutcome> {
        let now = Utc::now();
        let mut rooms = self.rooms.write().await;
        let Some(record) = rooms.get_mut(room_id) else {
            return Ok(JoinOutcome::NotFound);
        };

        if let Some(existing) = record.find(&user_id) {
            if existing.blocked {
                return Ok(JoinOutcome::Blocked);
            }
            if existing.is_joined() {
                return Ok(JoinOutcome::AlreadyJoined {
                    room: record.room.clone(),
                    participants: record.entries(),
                });
            }
            // Re-activation of a left/waiting row. Allowed while the room is
            // alive (including `playing`, which covers reconnects), but a
            // seat must still be free.
            if record.room.status.is_terminal() {
                return Ok(JoinOutcome::NotJoinable(record.room.status));
            }
            if record.joined_count() >= record.room.capacity {
                return Ok(JoinOutcome::Full);
            }
            if let Some(p) = record.find_mut(&user_id) {
                p.status = ParticipantStatus::Joined;
                p.left_at = None;
            }
            record.recount(now);
            return Ok(JoinOutcome::Joined {
                room: record.room.clone(),
                participants: record.entries(),
            });
        }

        // Fresh join: only into a lobby-phase room with a free seat.
        if record.room.status != RoomStatus::Active {
            return Ok(JoinOutcome::NotJoinable(record.room.status));
        }
        if record.joined_count() >= record.room.capacity {
            return Ok(JoinOutcome::Full);
        }
        if check_password && record.room.visibility == Visibility::Private {
            let supplied = password.unwrap_or_default();
            if record.room.password.as_deref() != Some(supplied) {
                return Ok(JoinOutcome::WrongPassword);
            }
        }

        record.participants.push(Self::new_participant(
            user_id,
            username,
            ParticipantRole::Participant,
            now,
        ));
        record.recount(now);
        Ok(JoinOutcome::Joined {
            room: record.room.clone(),
            participants: record.entries(),
        })
    }
}

#[async_trait]
impl BattleStore for InMemoryStore {
    async fn initialize(&self) -> Result<()> {
        let mut seasons = self.seasons.write().await;
        if !seasons.iter().any(|s| s.is_active) {
            seasons.push(Season::new("Season 1", Utc::now()));
        }
        Ok(())
    }

    async fn create_room(
        &self,
        owner_id: UserId,
        owner_name: &str,
        cfg: &RoomConfig,
    ) -> Result<Room> {
        let now = Utc::now();

        // Lock ordering: rooms first, then join_codes, held together so no
        // other task observes a code without its room.
        let mut rooms = self.rooms.write().await;
        let mut codes = self.join_codes.write().await;

        let join_code = {
            let mut attempts = 0u8;
            loop {
                let code = join_codes::generate_join_code(self.join_code_length);
                if !codes.contains(&code) {
                    break code;
                }
                attempts += 1;
                if attempts >= JOIN_CODE_ATTEMPTS {
                    anyhow::bail!(
                        "Failed to generate unique join code after {attempts} attempts"
                    );
                }
            }
        };

        let room_id = Uuid::new_v4();
        let room = Room {
            room_id,
            join_code: join_code.clone(),
            name: cfg
                .name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| owner_name.to_string()),
            owner: owner_name.to_string(),
            topic: cfg.topic.clone(),
            difficulty: cfg.difficulty,
            time_limit: cfg.time_limit,
            capacity: cfg.capacity,
            participant_count: 1,
            visibility: cfg.visibility,
            password: if cfg.visibility == Visibility::Private {
                cfg.password.clone()
            } else {
                None
            },
            is_ranked: cfg.is_ranked,
            is_active: true,
            status: RoomStatus::Active,
            active_question: None,
            start_time: None,
            created_at: now,
            updated_at: now,
        };

        let record = RoomRecord {
            room: room.clone(),
            participants: vec![Self::new_participant(
                owner_id,
                owner_name,
                ParticipantRole::Host,
                now,
            )],
            chat: Vec::new(),
            result: None,
            ratings_applied: false,
        };

        rooms.insert(room_id, record);
        codes.insert(join_code);
        Ok(room)
    }

    async fn get_room(&self, room_id: &RoomId) -> Result<Option<Room>> {
        let rooms = self.rooms.read().await;
        Ok(rooms.get(room_id).map(|r| r.room.clone()))
    }

    async fn room_detail(&self, room_id: &RoomId) -> Result<Option<RoomDetail>> {
        let rooms = self.rooms.read().await;
        Ok(rooms.get(room_id).map(|r| RoomDetail {
            room: r.room.clone(),
            participants: r.entries(),
        }))
    }

    async fn list_active_rooms(&self) -> Result<Vec<RoomSummary>> {
        let rooms = self.rooms.read().await;
        let mut summaries: Vec<RoomSummary> = rooms
            .values()
            .filter(|r| r.room.is_active)
            .map(RoomRecord::summary)
            .collect();
        summaries.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        Ok(summaries)
    }

    async fn join_room(
        &self,
        room_id: &RoomId,
        user_id: UserId,
        username: &str,
        password: Option<&str>,
    ) -> Result<JoinOutcome> {
        self.join_inner(room_id, user_id, username, password, true)
            .await
    }

    async fn ensure_joined(
        &self,
        room_id: &RoomId,
        user_id: UserId,
        username: &str,
    ) -> Result<JoinOutcome> {
        self.join_inner(room_id, user_id, username, None, false).await
    }

    async fn has_participant(&self, room_id: &RoomId, user_id: &UserId) -> Result<bool> {
        let rooms = self.rooms.read().await;
        Ok(rooms
            .get(room_id)
            .and_then(|r| r.find(user_id))
            .is_some_and(|p| p.status != ParticipantStatus::Kicked))
    }

    async fn participants(&self, room_id: &RoomId) -> Result<Vec<ParticipantEntry>> {
        let rooms = self.rooms.read().await;
        Ok(rooms.get(room_id).map(RoomRecord::entries).unwrap_or_default())
    }

    async fn participant(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
    ) -> Result<Option<Participant>> {
        let rooms = self.rooms.read().await;
        Ok(rooms.get(room_id).and_then(|r| r.find(user_id)).cloned())
    }

    async fn is_host(&self, room_id: &RoomId, user_id: &UserId) -> Result<bool> {
        let rooms = self.rooms.read().await;
        Ok(rooms
            .get(room_id)
            .and_then(|r| r.find(user_id))
            .is_some_and(Participant::is_host))
    }

    async fn mark_left(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
    ) -> Result<Option<Vec<ParticipantEntry>>> {
        let now = Utc::now();
        let mut rooms = self.rooms.write().await;
        let Some(record) = rooms.get_mut(room_id) else {
            return Ok(None);
        };
        let Some(participant) = record.find_mut(user_id) else {
            return Ok(None);
        };

        participant.status = ParticipantStatus::Left;
        participant.left_at = Some(now);
        participant.ready = false;
        participant.ready_at = None;
        record.recount(now);
        Ok(Some(record.entries()))
    }

    async fn kick(&self, room_id: &RoomId, target_username: &str) -> Result<bool> {
        let now = Utc::now();
        let mut rooms = self.rooms.write().await;
        let Some(record) = rooms.get_mut(room_id) else {
            return Ok(false);
        };
        let Some(participant) = record
            .participants
            .iter_mut()
            .find(|p| p.username == target_username && p.is_joined())
        else {
            return Ok(false);
        };

        participant.status = ParticipantStatus::Kicked;
        participant.blocked = true;
        participant.left_at = Some(now);
        participant.ready = false;
        record.recount(now);
        Ok(true)
    }

    async fn set_ready(&self, room_id: &RoomId, user_id: &UserId, ready: bool) -> Result<bool> {
        let now = Utc::now();
        let mut rooms = self.rooms.write().await;
        let Some(participant) = rooms.get_mut(room_id).and_then(|r| r.find_mut(user_id)) else {
            return Ok(false);
        };

        participant.ready = ready;
        participant.ready_at = ready.then_some(now);
        Ok(true)
    }

    async fn start_room(
        &self,
        room_id: &RoomId,
        host_id: &UserId,
        question_id: QuestionId,
        now: DateTime<Utc>,
    ) -> Result<StartOutcome> {
        let mut rooms = self.rooms.write().await;
        let Some(record) = rooms.get_mut(room_id) else {
            return Ok(StartOutcome::NotFound);
        };

        if !record.find(host_id).is_some_and(Participant::is_host) {
            return Ok(StartOutcome::NotHost);
        }
        if record.room.status != RoomStatus::Active {
            return Ok(StartOutcome::WrongState(record.room.status));
        }

        let joined = record.joined_count();
        let minimum = record.room.min_participants();
        if joined < minimum {
            return Ok(StartOutcome::NotEnoughParticipants { joined, minimum });
        }

        if record.room.is_ranked {
            let all_ready = record
                .participants
                .iter()
                .filter(|p| p.is_joined() && !p.is_host())
                .all(|p| p.ready);
            if !all_ready {
                return Ok(StartOutcome::NotAllReady);
            }
        }

        record.room.status = RoomStatus::Playing;
        record.room.start_time = Some(now);
        record.room.active_question = Some(question_id);
        record.room.updated_at = now;

        let joined_names: Vec<String> = record
            .participants
            .iter()
            .filter(|p| p.is_joined())
            .map(|p| p.username.clone())
            .collect();
        let room = record.room.clone();
        drop(rooms);

        let mut stats = self.stats.write().await;
        for name in joined_names {
            stats.entry(name).or_default().total_battles += 1;
        }

        Ok(StartOutcome::Started { room })
    }

    async fn close_room(&self, room_id: &RoomId) -> Result<bool> {
        let now = Utc::now();
        let mut rooms = self.rooms.write().await;
        let Some(record) = rooms.get_mut(room_id) else {
            return Ok(false);
        };
        if record.room.status.is_terminal() {
            return Ok(false);
        }

        record.room.status = RoomStatus::Closed;
        record.room.is_active = false;
        record.room.updated_at = now;
        Ok(true)
    }

    async fn complete_room(&self, room_id: &RoomId) -> Result<Option<CompletionSnapshot>> {
        let now = Utc::now();
        let mut rooms = self.rooms.write().await;
        let Some(record) = rooms.get_mut(room_id) else {
            return Ok(None);
        };
        if record.room.status != RoomStatus::Playing {
            return Ok(None);
        }

        record.room.status = RoomStatus::Completed;
        record.room.is_active = false;
        record.room.updated_at = now;
        self.apply_final_ratings(record).await;
        Ok(Some(record.winners_snapshot()))
    }

    async fn save_chat_message(
        &self,
        room_id: &RoomId,
        sender: &str,
        body: &str,
        is_system: bool,
    ) -> Result<Option<ChatMessage>> {
        let mut rooms = self.rooms.write().await;
        let Some(record) = rooms.get_mut(room_id) else {
            return Ok(None);
        };

        let message = ChatMessage {
            sender: sender.to_string(),
            message: body.to_string(),
            is_system,
            timestamp: Utc::now(),
        };
        record.chat.push(message.clone());
        Ok(Some(message))
    }

    async fn chat_history(&self, room_id: &RoomId, limit: usize) -> Result<Vec<ChatMessage>> {
        let rooms = self.rooms.read().await;
        Ok(rooms
            .get(room_id)
            .map(|r| {
                let skip = r.chat.len().saturating_sub(limit);
                r.chat.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default())
    }

    async fn clear_chat(&self, room_id: &RoomId) -> Result<()> {
        let mut rooms = self.rooms.write().await;
        if let Some(record) = rooms.get_mut(room_id) {
            record.chat.clear();
        }
        Ok(())
    }

    async fn record_submission(
        &self,
        room_id: &RoomId,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<SubmissionOutcome> {
        let mut rooms = self.rooms.write().await;
        let Some(record) = rooms.get_mut(room_id) else {
            return Ok(SubmissionOutcome::NotFound);
        };

        if record.room.status != RoomStatus::Playing {
            return Ok(SubmissionOutcome::NotPlaying(record.room.status));
        }
        let Some(question_id) = record.room.active_question else {
            return Ok(SubmissionOutcome::NotPlaying(record.room.status));
        };

        let room_id_val = record.room.room_id;
        let result = record
            .result
            .get_or_insert_with(|| BattleResult::new(room_id_val, question_id, now));

        if let Some(position) = result.position_of(username) {
            return Ok(SubmissionOutcome::AlreadyRecorded { position });
        }

        let position = result.results.len() as u32 + 1;
        result.results.push(FinishEntry {
            username: username.to_string(),
            position,
            completion_time: now,
        });
        result.updated_at = now;
        record.room.updated_at = now;

        if position == 1 {
            let mut stats = self.stats.write().await;
            stats.entry(username.to_string()).or_default().battles_won += 1;
        }

        let completion = if position >= record.room.max_winners() {
            record.room.status = RoomStatus::Completed;
            record.room.is_active = false;
            self.apply_final_ratings(record).await;
            Some(record.winners_snapshot())
        } else {
            None
        };

        Ok(SubmissionOutcome::Recorded {
            position,
            completion_time: now,
            completion,
        })
    }

    async fn battle_result(&self, room_id: &RoomId) -> Result<Option<BattleResult>> {
        let rooms = self.rooms.read().await;
        Ok(rooms.get(room_id).and_then(|r| r.result.clone()))
    }

    async fn question(&self, question_id: &QuestionId) -> Result<Option<Question>> {
        let questions = self.questions.read().await;
        Ok(questions.get(question_id).map(|q| q.question.clone()))
    }

    async fn testcases(&self, question_id: &QuestionId) -> Result<Vec<TestCase>> {
        let questions = self.questions.read().await;
        Ok(questions
            .get(question_id)
            .map(|q| q.testcases.clone())
            .unwrap_or_default())
    }

    async fn function_signature(
        &self,
        question_id: &QuestionId,
    ) -> Result<Option<FunctionSignature>> {
        let questions = self.questions.read().await;
        Ok(questions.get(question_id).and_then(|q| q.signature.clone()))
    }

    async fn eligible_questions(
        &self,
        topic: &str,
        difficulty: Difficulty,
    ) -> Result<Vec<QuestionId>> {
        let questions = self.questions.read().await;
        let mut ids: Vec<QuestionId> = questions
            .values()
            .filter(|q| {
                q.question.topic == topic
                    && q.question.difficulty == difficulty
                    && q.question.is_eligible()
            })
            .map(|q| q.question.question_id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn insert_question(
        &self,
        question: Question,
        testcases: Vec<TestCase>,
        signature: Option<FunctionSignature>,
    ) -> Result<()> {
        let mut questions = self.questions.write().await;
        questions.insert(
            question.question_id,
            QuestionRecord {
                question,
                testcases,
                signature,
            },
        );
        Ok(())
    }

    async fn active_season(&self) -> Result<Option<Season>> {
        let seasons = self.seasons.read().await;
        Ok(seasons.iter().find(|s| s.is_active).cloned())
    }

    async fn top_rankings(&self, limit: usize) -> Result<Vec<RankingEntry>> {
        let Some(season) = self.active_season().await? else {
            return Ok(Vec::new());
        };

        let rankings = self.rankings.read().await;
        let mut rows: Vec<&Ranking> = rankings
            .values()
            .filter(|r| r.season_id == season.id)
            .collect();
        rows.sort_by(|a, b| {
            b.rating
                .partial_cmp(&a.rating)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(rows
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, r)| RankingEntry {
                rank: i as u32 + 1,
                username: r.username.clone(),
                rating: r.rating,
                wins: r.wins,
                losses: r.losses,
                total_matches: r.total_matches,
            })
            .collect())
    }

    async fn user_stats(&self, username: &str) -> Result<UserStats> {
        let stats = self.stats.read().await;
        Ok(stats.get(username).cloned().unwrap_or_default())
    }

    async fn stale_room_ids(
        &self,
        now: DateTime<Utc>,
        active_cutoff: chrono::Duration,
        playing_cutoff: chrono::Duration,
    ) -> Result<Vec<RoomId>> {
        let rooms = self.rooms.read().await;
        Ok(rooms
            .values()
            .filter(|r| match r.room.status {
                RoomStatus::Active => {
                    r.room.start_time.is_none()
                        && now.signed_duration_since(r.room.created_at) >= active_cutoff
                }
                RoomStatus::Playing => r
                    .room
                    .start_time
                    .is_some_and(|start| now.signed_duration_since(start) >= playing_cutoff),
                _ => false,
            })
            .map(|r| r.room.room_id)
            .collect())
    }

    async fn purge_room(&self, room_id: &RoomId) -> Result<bool> {
        let mut rooms = self.rooms.write().await;
        let mut codes = self.join_codes.write().await;

        match rooms.remove(room_id) {
            Some(record) => {
                codes.remove(&record.room.join_code);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryStore {
        InMemoryStore::new(8)
    }

    fn public_config() -> RoomConfig {
        RoomConfig {
            name: None,
            topic: "ARRAY".to_string(),
            difficulty: Difficulty::Easy,
            time_limit: 10,
            capacity: 2,
            visibility: Visibility::Public,
            password: None,
            is_ranked: false,
        }
    }

    async fn create_room(store: &InMemoryStore, cfg: &RoomConfig) -> (Room, UserId) {
        let owner = Uuid::new_v4();
        let room = store.create_room(owner, "alice", cfg).await.unwrap();
        (room, owner)
    }

    #[tokio::test]
    async fn create_room_seats_owner_as_host() {
        let store = store();
        let (room, owner) = create_room(&store, &public_config()).await;

        assert_eq!(room.participant_count, 1);
        assert_eq!(room.status, RoomStatus::Active);
        assert!(join_codes::is_valid_join_code(&room.join_code, 8));
        assert!(store.is_host(&room.room_id, &owner).await.unwrap());
    }

    #[tokio::test]
    async fn join_codes_are_unique_across_rooms() {
        let store = store();
        let mut seen = HashSet::new();
        for _ in 0..50 {
            let (room, _) = create_room(&store, &public_config()).await;
            assert!(seen.insert(room.join_code));
        }
    }

    #[tokio::test]
    async fn join_is_idempotent_for_joined_user() {
        let store = store();
        let (room, _) = create_room(&store, &public_config()).await;
        let bob = Uuid::new_v4();

        let first = store
            .join_room(&room.room_id, bob, "bob", None)
            .await
            .unwrap();
        assert!(matches!(first, JoinOutcome::Joined { .. }));

        let second = store
            .join_room(&room.room_id, bob, "bob", None)
            .await
            .unwrap();
        let JoinOutcome::AlreadyJoined { room, .. } = second else {
            panic!("expected AlreadyJoined");
        };
        assert_eq!(room.participant_count, 2);
    }

    #[tokio::test]
    async fn last_seat_race_admits_exactly_one() {
        let store = store();
        let (room, _) = create_room(&store, &public_config()).await;

        let bob = Uuid::new_v4();
        let carol = Uuid::new_v4();
        let (bob_join, carol_join) = tokio::join!(
            store.join_room(&room.room_id, bob, "bob", None),
            store.join_room(&room.room_id, carol, "carol", None),
        );

        let outcomes = [bob_join.unwrap(), carol_join.unwrap()];
        let joined = outcomes
            .iter()
            .filter(|o| matches!(o, JoinOutcome::Joined { .. }))
            .count();
        let full = outcomes
            .iter()
            .filter(|o| matches!(o, JoinOutcome::Full))
            .count();
        assert_eq!((joined, full), (1, 1));

        let current = store.get_room(&room.room_id).await.unwrap().unwrap();
        assert_eq!(current.participant_count, 2);
    }

    #[tokio::test]
    async fn private_room_enforces_password_for_new_joins() {
        let store = store();
        let mut cfg = public_config();
        cfg.visibility = Visibility::Private;
        cfg.password = Some("hunter2".to_string());
        let (room, _) = create_room(&store, &cfg).await;
        let bob = Uuid::new_v4();

        let wrong = store
            .join_room(&room.room_id, bob, "bob", Some("letmein"))
            .await
            .unwrap();
        assert!(matches!(wrong, JoinOutcome::WrongPassword));

        let right = store
            .join_room(&room.room_id, bob, "bob", Some("hunter2"))
            .await
            .unwrap();
        assert!(matches!(right, JoinOutcome::Joined { .. }));
    }

    #[tokio::test]
    async fn kicked_user_is_blocked_from_rejoin() {
        let store = store();
        let (room, _) = create_room(&store, &public_config()).await;
        let bob = Uuid::new_v4();
        store
            .join_room(&room.room_id, bob, "bob", None)
            .await
            .unwrap();

        assert!(store.kick(&room.room_id, "bob").await.unwrap());
        let participant = store
            .participant(&room.room_id, &bob)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(participant.status, ParticipantStatus::Kicked);
        assert!(participant.blocked);

        let rejoin = store
            .join_room(&room.room_id, bob, "bob", None)
            .await
            .unwrap();
        assert!(matches!(rejoin, JoinOutcome::Blocked));

        let current = store.get_room(&room.room_id).await.unwrap().unwrap();
        assert_eq!(current.participant_count, 1);
    }

    #[tokio::test]
    async fn participant_count_tracks_joined_rows() {
        let store = store();
        let mut cfg = public_config();
        cfg.capacity = 5;
        let (room, _) = create_room(&store, &cfg).await;
        let bob = Uuid::new_v4();
        let carol = Uuid::new_v4();

        store
            .join_room(&room.room_id, bob, "bob", None)
            .await
            .unwrap();
        store
            .join_room(&room.room_id, carol, "carol", None)
            .await
            .unwrap();
        assert_eq!(
            store
                .get_room(&room.room_id)
                .await
                .unwrap()
                .unwrap()
                .participant_count,
            3
        );

        store.mark_left(&room.room_id, &bob).await.unwrap();
        assert_eq!(
            store
                .get_room(&room.room_id)
                .await
                .unwrap()
                .unwrap()
                .participant_count,
            2
        );

        // bob rejoins: his old row re-activates
        let rejoin = store
            .join_room(&room.room_id, bob, "bob", None)
            .await
            .unwrap();
        assert!(matches!(rejoin, JoinOutcome::Joined { .. }));
        assert_eq!(
            store
                .get_room(&room.room_id)
                .await
                .unwrap()
                .unwrap()
                .participant_count,
            3
        );
    }

    #[tokio::test]
    async fn start_requires_minimum_and_ready() {
        let store = store();
        let mut cfg = public_config();
        cfg.capacity = 5;
        cfg.is_ranked = true;
        cfg.time_limit = 0;
        let (room, owner) = create_room(&store, &cfg).await;
        let question = Uuid::new_v4();

        // capacity 5 requires 3 joined
        let outcome = store
            .start_room(&room.room_id, &owner, question, Utc::now())
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            StartOutcome::NotEnoughParticipants {
                joined: 1,
                minimum: 3
            }
        ));

        let bob = Uuid::new_v4();
        let carol = Uuid::new_v4();
        store
            .join_room(&room.room_id, bob, "bob", None)
            .await
            .unwrap();
        store
            .join_room(&room.room_id, carol, "carol", None)
            .await
            .unwrap();

        // ranked: non-host participants must be ready
        let outcome = store
            .start_room(&room.room_id, &owner, question, Utc::now())
            .await
            .unwrap();
        assert!(matches!(outcome, StartOutcome::NotAllReady));

        store.set_ready(&room.room_id, &bob, true).await.unwrap();
        store.set_ready(&room.room_id, &carol, true).await.unwrap();

        let outcome = store
            .start_room(&room.room_id, &owner, question, Utc::now())
            .await
            .unwrap();
        let StartOutcome::Started { room: started } = outcome else {
            panic!("expected start");
        };
        assert_eq!(started.status, RoomStatus::Playing);
        assert_eq!(started.active_question, Some(question));
        assert!(started.start_time.is_some());

        // host readiness was never consulted; joined participants got credit
        assert_eq!(store.user_stats("alice").await.unwrap().total_battles, 1);
        assert_eq!(store.user_stats("bob").await.unwrap().total_battles, 1);
    }

    #[tokio::test]
    async fn start_rejects_non_host_and_restart() {
        let store = store();
        let (room, owner) = create_room(&store, &public_config()).await;
        let bob = Uuid::new_v4();
        store
            .join_room(&room.room_id, bob, "bob", None)
            .await
            .unwrap();
        let question = Uuid::new_v4();

        let outcome = store
            .start_room(&room.room_id, &bob, question, Utc::now())
            .await
            .unwrap();
        assert!(matches!(outcome, StartOutcome::NotHost));

        let outcome = store
            .start_room(&room.room_id, &owner, question, Utc::now())
            .await
            .unwrap();
        assert!(matches!(outcome, StartOutcome::Started { .. }));

        // a playing (or completed) room can never restart
        let outcome = store
            .start_room(&room.room_id, &owner, question, Utc::now())
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            StartOutcome::WrongState(RoomStatus::Playing)
        ));
    }

    async fn playing_room(
        store: &InMemoryStore,
        capacity: u32,
        extra: &[(&str, UserId)],
    ) -> (Room, UserId) {
        let mut cfg = public_config();
        cfg.capacity = capacity;
        let (room, owner) = create_room(store, &cfg).await;
        for (name, id) in extra {
            store
                .join_room(&room.room_id, *id, name, None)
                .await
                .unwrap();
        }
        let question = Uuid::new_v4();
        let outcome = store
            .start_room(&room.room_id, &owner, question, Utc::now())
            .await
            .unwrap();
        let StartOutcome::Started { room } = outcome else {
            panic!("room should start");
        };
        (room, owner)
    }

    #[tokio::test]
    async fn submission_positions_are_contiguous_and_idempotent() {
        let store = store();
        let ids: Vec<UserId> = (0..4).map(|_| Uuid::new_v4()).collect();
        let (room, _) = playing_room(
            &store,
            5,
            &[("bob", ids[0]), ("carol", ids[1]), ("dave", ids[2])],
        )
        .await;

        let outcome = store
            .record_submission(&room.room_id, "bob", Utc::now())
            .await
            .unwrap();
        let SubmissionOutcome::Recorded {
            position: 1,
            completion: None,
            ..
        } = outcome
        else {
            panic!("bob should take position 1 without completing the battle");
        };

        // resubmission returns the same position, no new entry
        let outcome = store
            .record_submission(&room.room_id, "bob", Utc::now())
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            SubmissionOutcome::AlreadyRecorded { position: 1 }
        ));

        // second finisher completes a capacity-5 room (max_winners = 2)
        let outcome = store
            .record_submission(&room.room_id, "carol", Utc::now())
            .await
            .unwrap();
        let SubmissionOutcome::Recorded {
            position: 2,
            completion: Some(snapshot),
            ..
        } = outcome
        else {
            panic!("carol should complete the battle");
        };
        assert_eq!(snapshot.room_capacity, 5);
        assert_eq!(snapshot.winners.len(), 2);
        assert_eq!(snapshot.winners[0].username, "bob");
        assert_eq!(snapshot.winners[1].username, "carol");

        // third submitter is too late: the room is completed
        let outcome = store
            .record_submission(&room.room_id, "dave", Utc::now())
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            SubmissionOutcome::NotPlaying(RoomStatus::Completed)
        ));

        let result = store.battle_result(&room.room_id).await.unwrap().unwrap();
        let positions: Vec<u32> = result.results.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![1, 2]);
        assert_eq!(store.user_stats("bob").await.unwrap().battles_won, 1);
        assert_eq!(store.user_stats("carol").await.unwrap().battles_won, 0);
    }

    #[tokio::test]
    async fn capacity_two_completes_on_first_accept() {
        let store = store();
        let bob = Uuid::new_v4();
        let (room, _) = playing_room(&store, 2, &[("bob", bob)]).await;

        let outcome = store
            .record_submission(&room.room_id, "bob", Utc::now())
            .await
            .unwrap();
        let SubmissionOutcome::Recorded {
            position: 1,
            completion: Some(snapshot),
            ..
        } = outcome
        else {
            panic!("first accept should complete a 1v1");
        };
        assert_eq!(snapshot.winners.len(), 1);
        assert_eq!(snapshot.winners[0].username, "bob");

        let room = store.get_room(&room.room_id).await.unwrap().unwrap();
        assert_eq!(room.status, RoomStatus::Completed);
        assert!(!room.is_active);
    }

    #[tokio::test]
    async fn terminal_transition_happens_once() {
        let store = store();
        let bob = Uuid::new_v4();
        let (room, _) = playing_room(&store, 2, &[("bob", bob)]).await;

        // timer path wins
        let first = store.complete_room(&room.room_id).await.unwrap();
        assert!(first.is_some());
        assert!(first.unwrap().winners.is_empty());

        // second attempt (submission path racing) is a no-op
        let second = store.complete_room(&room.room_id).await.unwrap();
        assert!(second.is_none());

        let outcome = store
            .record_submission(&room.room_id, "bob", Utc::now())
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            SubmissionOutcome::NotPlaying(RoomStatus::Completed)
        ));
    }

    #[tokio::test]
    async fn ranked_one_v_one_moves_ratings_once() {
        let store = store();
        store.initialize().await.unwrap();

        let mut cfg = public_config();
        cfg.is_ranked = true;
        let (room, owner) = create_room(&store, &cfg).await;
        let bob = Uuid::new_v4();
        store
            .join_room(&room.room_id, bob, "bob", None)
            .await
            .unwrap();
        store.set_ready(&room.room_id, &bob, true).await.unwrap();
        store
            .start_room(&room.room_id, &owner, Uuid::new_v4(), Utc::now())
            .await
            .unwrap();

        store
            .record_submission(&room.room_id, "bob", Utc::now())
            .await
            .unwrap();

        let rankings = store.top_rankings(10).await.unwrap();
        assert_eq!(rankings.len(), 2);
        assert_eq!(rankings[0].username, "bob");
        assert!((rankings[0].rating - 1216.0).abs() < 1e-9);
        assert!((rankings[1].rating - 1184.0).abs() < 1e-9);
        assert_eq!(rankings[0].wins, 1);
        assert_eq!(rankings[1].losses, 1);
    }

    #[tokio::test]
    async fn chat_history_is_capped_and_cleared() {
        let store = store();
        let (room, _) = create_room(&store, &public_config()).await;

        for i in 0..120 {
            store
                .save_chat_message(&room.room_id, "alice", &format!("msg {i}"), false)
                .await
                .unwrap();
        }

        let history = store.chat_history(&room.room_id, 100).await.unwrap();
        assert_eq!(history.len(), 100);
        assert_eq!(history[0].message, "msg 20");
        assert_eq!(history[99].message, "msg 119");

        store.clear_chat(&room.room_id).await.unwrap();
        assert!(store
            .chat_history(&room.room_id, 100)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn stale_rooms_are_detected_by_cutoff() {
        let store = store();
        let (active_room, _) = create_room(&store, &public_config()).await;
        let bob = Uuid::new_v4();
        let (started_room, _) = playing_room(&store, 2, &[("bob", bob)]).await;

        let now = Utc::now();
        let none = store
            .stale_room_ids(
                now,
                chrono::Duration::hours(1),
                chrono::Duration::minutes(65),
            )
            .await
            .unwrap();
        assert!(none.is_empty());

        let much_later = now + chrono::Duration::hours(2);
        let stale = store
            .stale_room_ids(
                much_later,
                chrono::Duration::hours(1),
                chrono::Duration::minutes(65),
            )
            .await
            .unwrap();
        assert!(stale.contains(&active_room.room_id));
        assert!(stale.contains(&started_room.room_id));
    }

    #[tokio::test]
    async fn purge_removes_room_and_frees_code() {
        let store = store();
        let (room, _) = create_room(&store, &public_config()).await;

        assert!(store.purge_room(&room.room_id).await.unwrap());
        assert!(store.get_room(&room.room_id).await.unwrap().is_none());
        // second purge succeeds trivially
        assert!(!store.purge_room(&room.room_id).await.unwrap());

        let codes = store.join_codes.read().await;
        assert!(!codes.contains(&room.join_code));
    }
}
