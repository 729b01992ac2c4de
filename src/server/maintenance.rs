use std::sync::Arc;

use chrono::Utc;

use crate::bus::{battle_topic, room_topic};
use crate::protocol::RoomId;
use crate::store::BattleStore;

use super::BattleServer;

impl BattleServer {
    /// Background reclamation of finished and stalled rooms. Two sweeps per
    /// pass: `active` rooms that never started within the cutoff, and
    /// `playing` rooms past the playing cutoff. Each hit is purged with its
    /// participants, chat, and results in one store call.
    pub async fn reaper_task(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config().reaper_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            let active_cutoff = chrono_duration(self.config().stale_active);
            let playing_cutoff = chrono_duration(self.config().stale_playing);

            let stale = match self
                .store()
                .stale_room_ids(Utc::now(), active_cutoff, playing_cutoff)
                .await
            {
                Ok(ids) => ids,
                Err(err) => {
                    tracing::error!(error = %err, "Reaper scan failed");
                    continue;
                }
            };

            if stale.is_empty() {
                continue;
            }

            tracing::info!(
                count = stale.len(),
                instance_id = %self.instance_id,
                "Reaping stalled rooms"
            );

            let mut purged = 0usize;
            for room_id in stale {
                match self.purge_room_now(&room_id).await {
                    Ok(true) => purged += 1,
                    Ok(false) => {}
                    Err(err) => {
                        tracing::error!(%room_id, error = %err, "Failed to reap room");
                    }
                }
            }

            if purged > 0 {
                self.broadcast_rooms_update().await;
            }
        }
    }

    /// Schedule a delayed purge after a room reaches a terminal status. The
    /// job re-checks the status at fire time: a room that is somehow no
    /// longer terminal (or already gone) is left alone.
    pub(crate) fn schedule_purge(&self, room_id: RoomId, delay: tokio::time::Duration) {
        let Some(server) = self.self_arc() else {
            return;
        };
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            match server.store().get_room(&room_id).await {
                Ok(Some(room)) if room.status.is_terminal() => {
                    if let Err(err) = server.purge_room_now(&room_id).await {
                        tracing::error!(%room_id, error = %err, "Scheduled purge failed");
                    } else {
                        server.broadcast_rooms_update().await;
                    }
                }
                Ok(Some(room)) => {
                    tracing::warn!(
                        %room_id,
                        status = %room.status,
                        "Skipping scheduled purge of non-terminal room"
                    );
                }
                // Already gone: the purge succeeds trivially.
                Ok(None) => {}
                Err(err) => {
                    tracing::error!(%room_id, error = %err, "Scheduled purge lookup failed");
                }
            }
        });
    }

    /// Delete a room and drop its bus topics.
    pub(crate) async fn purge_room_now(&self, room_id: &RoomId) -> anyhow::Result<bool> {
        let existed = self.store().purge_room(room_id).await?;
        if existed {
            self.metrics().increment_rooms_reaped();
            self.bus().remove_topic(&room_topic(room_id));
            self.bus().remove_topic(&battle_topic(room_id));
            tracing::info!(%room_id, "Room purged");
        }
        Ok(existed)
    }
}

fn chrono_duration(duration: tokio::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::seconds(i64::MAX))
}
