use chrono::Utc;
use rand::Rng;

use crate::auth::Identity;
use crate::protocol::{
    validation, QuestionId, Room, RoomConfig, RoomDetail, RoomId, RoomStatus, RoomSummary,
    ServerEvent,
};
use crate::store::{BattleStore, JoinOutcome, StartOutcome};

use super::{BattleServer, ServiceError};

impl BattleServer {
    /// Create a room. The owner takes the host seat; the global lobby gets a
    /// fresh room-list snapshot.
    pub async fn create_room(
        &self,
        identity: &Identity,
        cfg: &RoomConfig,
    ) -> Result<Room, ServiceError> {
        self.rate_limiter.check_room_creation(&identity.user_id).await?;
        validation::validate_room_config(cfg).map_err(ServiceError::InvalidConfig)?;

        let room = self
            .store()
            .create_room(identity.user_id, &identity.username, cfg)
            .await?;

        self.metrics().increment_rooms_created();
        tracing::info!(
            room_id = %room.room_id,
            join_code = %room.join_code,
            owner = %identity.username,
            capacity = room.capacity,
            is_ranked = room.is_ranked,
            instance_id = %self.instance_id,
            "Room created"
        );

        self.broadcast_rooms_update().await;
        Ok(room)
    }

    pub async fn list_rooms(&self) -> Result<Vec<RoomSummary>, ServiceError> {
        Ok(self.store().list_active_rooms().await?)
    }

    pub async fn room_detail(&self, room_id: &RoomId) -> Result<RoomDetail, ServiceError> {
        self.store()
            .room_detail(room_id)
            .await?
            .ok_or(ServiceError::NotFound("Room"))
    }

    /// Join a room over HTTP. Idempotent for an already-joined user.
    pub async fn join_room(
        &self,
        identity: &Identity,
        room_id: &RoomId,
        password: Option<&str>,
    ) -> Result<RoomDetail, ServiceError> {
        self.rate_limiter.check_join_attempt(&identity.user_id).await?;

        let outcome = self
            .store()
            .join_room(room_id, identity.user_id, &identity.username, password)
            .await?;

        match outcome {
            JoinOutcome::Joined { room, participants } => {
                self.metrics().increment_rooms_joined();
                tracing::info!(
                    %room_id,
                    user = %identity.username,
                    instance_id = %self.instance_id,
                    "Participant joined room"
                );

                self.system_chat(room_id, &format!("{} joined the lobby", identity.username))
                    .await;
                self.publish_room(
                    room_id,
                    ServerEvent::ParticipantUpdate {
                        participants: participants.clone(),
                    },
                );
                self.broadcast_rooms_update().await;
                Ok(RoomDetail { room, participants })
            }
            JoinOutcome::AlreadyJoined { room, participants } => {
                Ok(RoomDetail { room, participants })
            }
            JoinOutcome::Blocked => Err(ServiceError::Forbidden(
                "You have been removed from this room".to_string(),
            )),
            JoinOutcome::Full => Err(ServiceError::Full),
            JoinOutcome::WrongPassword => Err(ServiceError::WrongPassword),
            JoinOutcome::NotJoinable(status) => Err(ServiceError::InvalidState(format!(
                "Room is not accepting participants (status: {status})"
            ))),
            JoinOutcome::NotFound => Err(ServiceError::NotFound("Room")),
        }
    }

    /// Leave a room. A host leaving a still-`active` room closes it; that is
    /// the only host-departure rule.
    pub async fn leave_room(
        &self,
        identity: &Identity,
        room_id: &RoomId,
    ) -> Result<(), ServiceError> {
        let was_host = self.store().is_host(room_id, &identity.user_id).await?;

        let Some(participants) = self.store().mark_left(room_id, &identity.user_id).await? else {
            return Ok(());
        };

        tracing::info!(
            %room_id,
            user = %identity.username,
            was_host,
            "Participant left room"
        );

        self.system_chat(room_id, &format!("{} left the lobby", identity.username))
            .await;
        self.publish_room(room_id, ServerEvent::ParticipantUpdate { participants });
        self.publish_room(
            room_id,
            ServerEvent::ParticipantLeft {
                username: identity.username.clone(),
            },
        );
        self.broadcast_rooms_update().await;

        if was_host {
            let still_active = self
                .store()
                .get_room(room_id)
                .await?
                .is_some_and(|room| room.status == RoomStatus::Active);
            if still_active {
                self.close_room_internal(room_id).await?;
            }
        }
        Ok(())
    }

    /// Kick a participant (host only). Kicked users are blocked for the
    /// room's lifetime.
    pub async fn kick_participant(
        &self,
        identity: &Identity,
        room_id: &RoomId,
        target_username: &str,
    ) -> Result<(), ServiceError> {
        if !self.store().is_host(room_id, &identity.user_id).await? {
            return Err(ServiceError::Forbidden(
                "Only the host can kick participants".to_string(),
            ));
        }

        if !self.store().kick(room_id, target_username).await? {
            return Err(ServiceError::InvalidState(format!(
                "Failed to kick {target_username}"
            )));
        }

        self.metrics().increment_participants_kicked();
        tracing::info!(%room_id, target = %target_username, by = %identity.username, "Participant kicked");

        self.system_chat(room_id, &format!("{target_username} has been kicked"))
            .await;
        let participants = self.store().participants(room_id).await?;
        self.publish_room(room_id, ServerEvent::ParticipantUpdate { participants });
        self.publish_room(
            room_id,
            ServerEvent::Kicked {
                username: target_username.to_string(),
            },
        );
        self.broadcast_rooms_update().await;
        Ok(())
    }

    /// Toggle own readiness. Host readiness is ignored by start gating.
    pub async fn set_ready(
        &self,
        identity: &Identity,
        room_id: &RoomId,
        ready: bool,
    ) -> Result<(), ServiceError> {
        if !self.store().set_ready(room_id, &identity.user_id, ready).await? {
            return Err(ServiceError::NotFound("Participant"));
        }

        self.publish_room(
            room_id,
            ServerEvent::ReadyStatus {
                username: identity.username.clone(),
                ready,
            },
        );
        Ok(())
    }

    /// Start the battle: pick a question uniformly at random from the
    /// eligible set and atomically transition the room to `playing`. Returns
    /// the selected question id.
    pub async fn start_battle(
        &self,
        identity: &Identity,
        room_id: &RoomId,
    ) -> Result<QuestionId, ServiceError> {
        let room = self
            .store()
            .get_room(room_id)
            .await?
            .ok_or(ServiceError::NotFound("Room"))?;

        let eligible = self
            .store()
            .eligible_questions(&room.topic, room.difficulty)
            .await?;
        if eligible.is_empty() {
            return Err(ServiceError::InvalidState(format!(
                "No question available for topic {} at {} difficulty",
                room.topic, room.difficulty
            )));
        }
        // The eligible set is computed once per start; selection is uniform.
        let question_id = eligible[rand::rng().random_range(0..eligible.len())];

        let outcome = self
            .store()
            .start_room(room_id, &identity.user_id, question_id, Utc::now())
            .await?;

        let room = match outcome {
            StartOutcome::Started { room } => room,
            StartOutcome::NotHost => {
                return Err(ServiceError::Forbidden(
                    "Only the host can start the battle".to_string(),
                ))
            }
            StartOutcome::WrongState(status) => {
                return Err(ServiceError::InvalidState(format!(
                    "Room cannot start from status {status}"
                )))
            }
            StartOutcome::NotEnoughParticipants { joined, minimum } => {
                return Err(ServiceError::InvalidState(format!(
                    "Need at least {minimum} joined participants to start, have {joined}"
                )))
            }
            StartOutcome::NotAllReady => {
                return Err(ServiceError::InvalidState(
                    "All participants must be ready for ranked mode".to_string(),
                ))
            }
            StartOutcome::NotFound => return Err(ServiceError::NotFound("Room")),
        };

        self.metrics().increment_battles_started();
        tracing::info!(
            %room_id,
            question_id = %question_id,
            host = %identity.username,
            time_limit = room.time_limit,
            "Battle started"
        );

        self.spawn_battle_clock(*room_id);
        self.broadcast_rooms_update().await;
        Ok(question_id)
    }

    /// Close a room (host action).
    pub async fn close_room(
        &self,
        identity: &Identity,
        room_id: &RoomId,
    ) -> Result<(), ServiceError> {
        if !self.store().is_host(room_id, &identity.user_id).await? {
            return Err(ServiceError::Forbidden(
                "Only the host can close the room".to_string(),
            ));
        }
        self.close_room_internal(room_id).await
    }

    /// Shared close path (host action or host departure): check-and-set to
    /// `closed`, announce, clear chat, and schedule the purge.
    pub(crate) async fn close_room_internal(&self, room_id: &RoomId) -> Result<(), ServiceError> {
        if !self.store().close_room(room_id).await? {
            return Err(ServiceError::InvalidState(
                "Room is already closed".to_string(),
            ));
        }

        self.metrics().increment_rooms_closed();
        tracing::info!(%room_id, "Room closed");

        self.system_chat(room_id, "Room closed. Chat cleared.").await;
        self.publish_room(room_id, ServerEvent::RoomClosed);
        self.store().clear_chat(room_id).await?;
        self.schedule_purge(*room_id, self.config().close_purge_delay);
        self.broadcast_rooms_update().await;
        Ok(())
    }

    /// PATCH /rooms/{id}/status (host only). Only transitions the state
    /// machine allows are honored; `playing` requires the full start
    /// protocol and is rejected here.
    pub async fn update_status(
        &self,
        identity: &Identity,
        room_id: &RoomId,
        next: RoomStatus,
    ) -> Result<Room, ServiceError> {
        if !self.store().is_host(room_id, &identity.user_id).await? {
            return Err(ServiceError::Forbidden(
                "Only the host can change room status".to_string(),
            ));
        }

        let room = self
            .store()
            .get_room(room_id)
            .await?
            .ok_or(ServiceError::NotFound("Room"))?;

        if !room.status.can_transition_to(next) {
            return Err(ServiceError::InvalidState(format!(
                "Cannot transition from {} to {next}",
                room.status
            )));
        }

        match next {
            RoomStatus::Closed => self.close_room_internal(room_id).await?,
            RoomStatus::Completed => {
                // Host-initiated early completion uses the same terminal path
                // as the timer, so the event fires at most once.
                self.complete_battle(room_id, "Battle ended by host").await?;
            }
            RoomStatus::Playing | RoomStatus::Active => {
                return Err(ServiceError::InvalidState(
                    "Use the start endpoint to begin a battle".to_string(),
                ));
            }
        }

        self.store()
            .get_room(room_id)
            .await?
            .ok_or(ServiceError::NotFound("Room"))
    }
}
