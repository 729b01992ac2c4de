//! Root configuration struct and its sections.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::defaults::*;
use super::logging::LoggingConfig;

/// Root configuration for the server binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// TCP port the HTTP/WebSocket listener binds to
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub judge: JudgeSection,
    #[serde(default)]
    pub security: SecuritySection,
    #[serde(default)]
    pub rate_limit: RateLimitSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            server: ServerSection::default(),
            judge: JudgeSection::default(),
            security: SecuritySection::default(),
            rate_limit: RateLimitSection::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Room/battle engine behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// How often the reaper scans for stalled rooms (seconds)
    #[serde(default = "default_reaper_interval_secs")]
    pub reaper_interval_secs: u64,
    /// Delay before a completed room's data is purged (seconds)
    #[serde(default = "default_terminal_purge_delay_secs")]
    pub terminal_purge_delay_secs: u64,
    /// Delay before a host-closed room's data is purged (seconds)
    #[serde(default = "default_close_purge_delay_secs")]
    pub close_purge_delay_secs: u64,
    /// Age after which a never-started room is reclaimed (seconds)
    #[serde(default = "default_stale_active_secs")]
    pub stale_active_secs: u64,
    /// Age after which a playing room is reclaimed (seconds)
    #[serde(default = "default_stale_playing_secs")]
    pub stale_playing_secs: u64,
    /// Battle clock tick; must stay <= 10s so the limit fires at next tick
    #[serde(default = "default_time_update_tick_secs")]
    pub time_update_tick_secs: u64,
    /// Default countdown length when the host does not specify one
    #[serde(default = "default_countdown_secs")]
    pub countdown_secs: u32,
    /// Number of chat lines returned by a history fetch
    #[serde(default = "default_chat_history_limit")]
    pub chat_history_limit: usize,
    /// Length of generated join codes
    #[serde(default = "default_join_code_length")]
    pub join_code_length: usize,
    /// Per-subscriber buffer on event bus topics
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,
    /// Maximum accepted realtime frame size in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            reaper_interval_secs: default_reaper_interval_secs(),
            terminal_purge_delay_secs: default_terminal_purge_delay_secs(),
            close_purge_delay_secs: default_close_purge_delay_secs(),
            stale_active_secs: default_stale_active_secs(),
            stale_playing_secs: default_stale_playing_secs(),
            time_update_tick_secs: default_time_update_tick_secs(),
            countdown_secs: default_countdown_secs(),
            chat_history_limit: default_chat_history_limit(),
            join_code_length: default_join_code_length(),
            event_buffer_size: default_event_buffer_size(),
            max_message_size: default_max_message_size(),
        }
    }
}

/// External judge API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeSection {
    /// Submission endpoint of the judge service
    #[serde(default = "default_judge_api_url")]
    pub api_url: String,
    /// Per-request timeout (seconds)
    #[serde(default = "default_judge_timeout_secs")]
    pub request_timeout_secs: u64,
    /// CPU time limit handed to the judge per case (seconds)
    #[serde(default = "default_cpu_time_limit_secs")]
    pub cpu_time_limit_secs: u32,
    /// Memory limit handed to the judge per case (kilobytes)
    #[serde(default = "default_memory_limit_kb")]
    pub memory_limit_kb: u32,
    /// Language name -> judge language id
    #[serde(default = "default_language_ids")]
    pub language_ids: HashMap<String, u32>,
}

impl Default for JudgeSection {
    fn default() -> Self {
        Self {
            api_url: default_judge_api_url(),
            request_timeout_secs: default_judge_timeout_secs(),
            cpu_time_limit_secs: default_cpu_time_limit_secs(),
            memory_limit_kb: default_memory_limit_kb(),
            language_ids: default_language_ids(),
        }
    }
}

/// Token verification and CORS settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecuritySection {
    /// HMAC secret shared with the identity service. Must be set in production.
    #[serde(default = "default_token_secret")]
    pub token_secret: String,
    /// Token lifetime used by operator tooling when issuing tokens
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: i64,
    /// Comma-separated allowed CORS origins, or "*"
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            token_secret: default_token_secret(),
            token_ttl_secs: default_token_ttl_secs(),
            cors_origins: default_cors_origins(),
        }
    }
}

/// Sliding-window rate limits, per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSection {
    #[serde(default = "default_max_room_creations")]
    pub max_room_creations: u32,
    #[serde(default = "default_max_join_attempts")]
    pub max_join_attempts: u32,
    #[serde(default = "default_max_submissions")]
    pub max_submissions: u32,
    #[serde(default = "default_rate_limit_window_secs")]
    pub time_window_secs: u64,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            max_room_creations: default_max_room_creations(),
            max_join_attempts: default_max_join_attempts(),
            max_submissions: default_max_submissions(),
            time_window_secs: default_rate_limit_window_secs(),
        }
    }
}
