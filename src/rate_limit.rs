//! Per-user sliding-window rate limiting for room creation, joins, and
//! submissions. Violations surface to HTTP callers as 429.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};

use crate::config::RateLimitSection;
use crate::protocol::UserId;

/// Runtime rate limiting configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_room_creations: u32,
    pub max_join_attempts: u32,
    pub max_submissions: u32,
    pub time_window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_room_creations: 5,
            max_join_attempts: 20,
            max_submissions: 30,
            time_window: Duration::from_secs(60),
        }
    }
}

impl From<&RateLimitSection> for RateLimitConfig {
    fn from(section: &RateLimitSection) -> Self {
        Self {
            max_room_creations: section.max_room_creations,
            max_join_attempts: section.max_join_attempts,
            max_submissions: section.max_submissions,
            time_window: Duration::from_secs(section.time_window_secs.max(1)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Action {
    CreateRoom,
    Join,
    Submit,
}

#[derive(Debug, Clone)]
struct WindowEntry {
    room_creations: u32,
    join_attempts: u32,
    submissions: u32,
    window_start: Instant,
}

impl WindowEntry {
    fn new() -> Self {
        Self {
            room_creations: 0,
            join_attempts: 0,
            submissions: 0,
            window_start: Instant::now(),
        }
    }

    fn maybe_reset(&mut self, window: Duration) {
        if self.window_start.elapsed() >= window {
            *self = Self::new();
        }
    }

    fn try_action(&mut self, action: Action, config: &RateLimitConfig) -> bool {
        self.maybe_reset(config.time_window);
        match action {
            Action::CreateRoom => {
                if self.room_creations >= config.max_room_creations {
                    return false;
                }
                // A creation also consumes a join slot: the creator lands in
                // the room they create.
                self.room_creations += 1;
                self.join_attempts += 1;
                true
            }
            Action::Join => {
                if self.join_attempts >= config.max_join_attempts {
                    return false;
                }
                self.join_attempts += 1;
                true
            }
            Action::Submit => {
                if self.submissions >= config.max_submissions {
                    return false;
                }
                self.submissions += 1;
                true
            }
        }
    }

    fn time_until_reset(&self, window: Duration) -> Duration {
        window.saturating_sub(self.window_start.elapsed())
    }
}

/// Rate limiting error carrying the retry hint
#[derive(Debug, Clone, thiserror::Error)]
#[error("{action} rate limit exceeded. Try again in {} seconds.", retry_after.as_secs())]
pub struct RateLimitExceeded {
    pub action: &'static str,
    pub retry_after: Duration,
}

/// Rate limiter for room and submission operations
pub struct ActionRateLimiter {
    config: RateLimitConfig,
    entries: Arc<RwLock<HashMap<UserId, WindowEntry>>>,
}

impl ActionRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn check_room_creation(&self, user_id: &UserId) -> Result<(), RateLimitExceeded> {
        self.check(user_id, Action::CreateRoom, "Room creation").await
    }

    pub async fn check_join_attempt(&self, user_id: &UserId) -> Result<(), RateLimitExceeded> {
        self.check(user_id, Action::Join, "Join attempt").await
    }

    pub async fn check_submission(&self, user_id: &UserId) -> Result<(), RateLimitExceeded> {
        self.check(user_id, Action::Submit, "Submission").await
    }

    async fn check(
        &self,
        user_id: &UserId,
        action: Action,
        label: &'static str,
    ) -> Result<(), RateLimitExceeded> {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(*user_id).or_insert_with(WindowEntry::new);

        if entry.try_action(action, &self.config) {
            Ok(())
        } else {
            Err(RateLimitExceeded {
                action: label,
                retry_after: entry.time_until_reset(self.config.time_window),
            })
        }
    }

    /// Drop entries idle for two windows so the map does not grow unbounded.
    pub async fn cleanup_old_entries(&self) {
        let mut entries = self.entries.write().await;
        let threshold = self.config.time_window * 2;
        let now = Instant::now();
        entries.retain(|_, entry| now.duration_since(entry.window_start) < threshold);
    }

    /// Spawn the periodic cleanup loop.
    pub fn start_cleanup_task(self: Arc<Self>) {
        let limiter = Arc::clone(&self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(limiter.config.time_window);
            loop {
                interval.tick().await;
                limiter.cleanup_old_entries().await;
            }
        });
    }
}
