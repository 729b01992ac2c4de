//! Room/battle engine orchestration.
//!
//! [`BattleServer`] is the single write path for room state: HTTP handlers
//! and realtime sockets both call into it, it calls into the store, and it
//! publishes the resulting events on the bus. Submodules split the surface by
//! concern; everything is `impl BattleServer` blocks over one struct, so
//! invariants live in one place.

use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use uuid::Uuid;

use crate::auth::{AuthError, IdentityVerifier};
use crate::bus::{battle_topic, room_topic, EventBus, ROOMS_TOPIC};
use crate::config::ServerSection;
use crate::judge::{CodeJudge, JudgeError};
use crate::metrics::ServerMetrics;
use crate::protocol::{RoomId, ServerEvent};
use crate::rate_limit::{ActionRateLimiter, RateLimitConfig, RateLimitExceeded};
use crate::store::BattleStore;

mod battle_clock;
mod chat;
mod maintenance;
mod room_service;
#[cfg(test)]
mod room_service_tests;
mod submission;
#[cfg(test)]
pub(crate) mod test_support;

pub use submission::SubmissionResponse;

/// Error taxonomy of the engine. HTTP and realtime layers map these onto
/// status codes / error events; the variants carry the human-readable detail.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    InvalidConfig(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("Room is full")]
    Full,
    #[error("Incorrect room password")]
    WrongPassword,
    #[error("Time limit exceeded")]
    TimeLimitExceeded,
    #[error(transparent)]
    Judge(#[from] JudgeError),
    #[error(transparent)]
    Throttled(#[from] RateLimitExceeded),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Runtime tuning for the engine, derived from the config file.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub reaper_interval: Duration,
    pub terminal_purge_delay: Duration,
    pub close_purge_delay: Duration,
    pub stale_active: Duration,
    pub stale_playing: Duration,
    pub time_update_tick: Duration,
    pub countdown_secs: u32,
    pub chat_history_limit: usize,
    pub event_buffer_size: usize,
    pub max_message_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&ServerSection::default())
    }
}

impl From<&ServerSection> for EngineConfig {
    fn from(section: &ServerSection) -> Self {
        Self {
            reaper_interval: Duration::from_secs(section.reaper_interval_secs.max(1)),
            terminal_purge_delay: Duration::from_secs(section.terminal_purge_delay_secs),
            close_purge_delay: Duration::from_secs(section.close_purge_delay_secs),
            stale_active: Duration::from_secs(section.stale_active_secs),
            stale_playing: Duration::from_secs(section.stale_playing_secs),
            time_update_tick: Duration::from_secs(section.time_update_tick_secs.clamp(1, 10)),
            countdown_secs: section.countdown_secs,
            chat_history_limit: section.chat_history_limit,
            event_buffer_size: section.event_buffer_size,
            max_message_size: section.max_message_size,
        }
    }
}

/// The realtime room/battle engine.
pub struct BattleServer {
    /// Source of truth for rooms, results, rankings, and the catalog
    store: Arc<dyn BattleStore>,
    /// Fan-out fabric for all realtime events
    bus: Arc<EventBus>,
    /// External code judge
    judge: Arc<dyn CodeJudge>,
    /// Bearer credential verification
    verifier: Arc<dyn IdentityVerifier>,
    /// Engine tuning
    config: EngineConfig,
    /// Operation counters
    metrics: Arc<ServerMetrics>,
    /// Per-user operation limits
    rate_limiter: Arc<ActionRateLimiter>,
    /// One owned clock task per playing room
    battle_clocks: DashMap<RoomId, JoinHandle<()>>,
    /// Instance identifier for log correlation
    instance_id: Uuid,
    /// Weak self-handle so `&self` methods can hand an owned `Arc` to the
    /// tasks they spawn (clocks, delayed purges)
    self_ref: OnceLock<Weak<BattleServer>>,
}

impl BattleServer {
    pub fn new(
        store: Arc<dyn BattleStore>,
        judge: Arc<dyn CodeJudge>,
        verifier: Arc<dyn IdentityVerifier>,
        config: EngineConfig,
        rate_limit_config: RateLimitConfig,
    ) -> Arc<Self> {
        let rate_limiter = Arc::new(ActionRateLimiter::new(rate_limit_config));
        rate_limiter.clone().start_cleanup_task();
        let bus = Arc::new(EventBus::new(config.event_buffer_size));

        let server = Arc::new(Self {
            store,
            bus,
            judge,
            verifier,
            config,
            metrics: Arc::new(ServerMetrics::new()),
            rate_limiter,
            battle_clocks: DashMap::new(),
            instance_id: Uuid::new_v4(),
            self_ref: OnceLock::new(),
        });
        let _ = server.self_ref.set(Arc::downgrade(&server));
        server
    }

    /// Owned handle for spawned tasks. `None` only during shutdown, when the
    /// last strong reference is gone and spawning is pointless anyway.
    pub(crate) fn self_arc(&self) -> Option<Arc<Self>> {
        self.self_ref.get().and_then(Weak::upgrade)
    }

    pub fn store(&self) -> &dyn BattleStore {
        self.store.as_ref()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn verifier(&self) -> &dyn IdentityVerifier {
        self.verifier.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<ServerMetrics> {
        self.metrics.clone()
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub async fn health_check(&self) -> bool {
        self.store.health_check().await
    }

    /// Publish to a room's lobby topic.
    pub(crate) fn publish_room(&self, room_id: &RoomId, event: ServerEvent) {
        self.metrics.increment_events_published();
        self.bus.publish(&room_topic(room_id), event);
    }

    /// Publish to both a room's lobby and battle topics. Battle lifecycle
    /// events (`time_update`, `code_verified`, `battle_completed`,
    /// `battle_started`) are visible on either socket.
    pub(crate) fn publish_battle(&self, room_id: &RoomId, event: ServerEvent) {
        self.metrics.increment_events_published();
        self.bus.publish(&room_topic(room_id), event.clone());
        self.bus.publish(&battle_topic(room_id), event);
    }

    /// Push a fresh room-list snapshot to every global lobby subscriber.
    pub(crate) async fn broadcast_rooms_update(&self) {
        match self.store.list_active_rooms().await {
            Ok(rooms) => {
                self.metrics.increment_events_published();
                self.bus.publish(ROOMS_TOPIC, ServerEvent::RoomUpdate { rooms });
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to build room-list update");
            }
        }
    }
}
