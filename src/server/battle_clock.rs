use chrono::{DateTime, Utc};

use crate::protocol::{RoomId, RoomStatus, ServerEvent};
use crate::store::BattleStore;

use super::{BattleServer, ServiceError};

impl BattleServer {
    /// Spawn the room's battle clock: a single owned task that publishes
    /// `time_update` ticks and enforces the time limit. One task per room; a
    /// second spawn for the same room is a no-op. The task exits when it
    /// observes a terminal status.
    pub(crate) fn spawn_battle_clock(&self, room_id: RoomId) {
        use dashmap::mapref::entry::Entry;

        let Some(server) = self.self_arc() else {
            return;
        };

        let entry = self.battle_clocks.entry(room_id);
        let Entry::Vacant(slot) = entry else {
            return;
        };
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(server.config().time_update_tick);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so clients get their
            // first time_update one tick after the start.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match server.battle_clock_tick(&room_id, Utc::now()).await {
                    Ok(true) => continue,
                    Ok(false) => break,
                    Err(err) => {
                        tracing::error!(%room_id, error = %err, "Battle clock tick failed");
                        break;
                    }
                }
            }

            server.battle_clocks.remove(&room_id);
            tracing::debug!(%room_id, "Battle clock stopped");
        });

        slot.insert(handle);
    }

    /// One clock tick: publish elapsed/remaining and enforce the limit.
    /// Returns whether the clock should keep running.
    pub(crate) async fn battle_clock_tick(
        &self,
        room_id: &RoomId,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let Some(room) = self.store().get_room(room_id).await? else {
            return Ok(false);
        };
        if room.status != RoomStatus::Playing {
            return Ok(false);
        }
        let Some(start) = room.start_time else {
            return Ok(false);
        };

        let elapsed_seconds = now.signed_duration_since(start).num_seconds().max(0) as u64;
        let remaining_seconds = room
            .battle_deadline()
            .map(|deadline| deadline.signed_duration_since(now).num_seconds().max(0) as u64);

        self.publish_battle(
            room_id,
            ServerEvent::TimeUpdate {
                elapsed_seconds,
                remaining_seconds,
            },
        );

        if room.time_limit_exceeded(now) {
            self.force_complete_expired(room_id).await?;
            return Ok(false);
        }
        Ok(true)
    }

    /// Lazy enforcement on the submission path: if the room's limit has
    /// elapsed, complete it now. Returns whether the limit had elapsed.
    /// Idempotent against the clock task via the store's check-and-set.
    pub async fn enforce_time_limit(
        &self,
        room_id: &RoomId,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let Some(room) = self.store().get_room(room_id).await? else {
            return Ok(false);
        };
        if room.status != RoomStatus::Playing || !room.time_limit_exceeded(now) {
            return Ok(false);
        }

        self.force_complete_expired(room_id).await?;
        Ok(true)
    }

    async fn force_complete_expired(&self, room_id: &RoomId) -> Result<(), ServiceError> {
        self.complete_battle(room_id, "Battle ended due to time limit")
            .await
    }

    /// Terminal completion shared by the timer, the lazy submission check,
    /// and host-initiated completion. The store's check-and-set guarantees
    /// exactly one `battle_completed` per room; the losing caller is a no-op.
    pub(crate) async fn complete_battle(
        &self,
        room_id: &RoomId,
        message: &str,
    ) -> Result<(), ServiceError> {
        let Some(snapshot) = self.store().complete_room(room_id).await? else {
            return Ok(());
        };

        self.metrics().increment_battles_completed();
        tracing::info!(
            %room_id,
            winners = snapshot.winners.len(),
            %message,
            "Battle completed"
        );

        // The clock task observes the terminal status on its next tick and
        // exits on its own; no abort needed.
        self.publish_battle(
            room_id,
            ServerEvent::BattleCompleted {
                winners: snapshot.winners,
                room_capacity: snapshot.room_capacity,
                message: message.to_string(),
            },
        );
        self.schedule_purge(*room_id, self.config().terminal_purge_delay);
        self.broadcast_rooms_update().await;
        Ok(())
    }

    /// Whether a clock task currently owns this room.
    #[allow(dead_code)]
    pub(crate) fn has_battle_clock(&self, room_id: &RoomId) -> bool {
        self.battle_clocks.contains_key(room_id)
    }
}
