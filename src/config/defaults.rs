//! Default value functions referenced by serde attributes across the config
//! sections. Keeping them in one place makes the effective defaults auditable.

use std::collections::HashMap;

use super::logging::LogFormat;

pub fn default_port() -> u16 {
    8800
}

// --- server section ---

pub fn default_reaper_interval_secs() -> u64 {
    60
}

pub fn default_terminal_purge_delay_secs() -> u64 {
    300
}

pub fn default_close_purge_delay_secs() -> u64 {
    300
}

pub fn default_stale_active_secs() -> u64 {
    3600
}

pub fn default_stale_playing_secs() -> u64 {
    3900
}

pub fn default_time_update_tick_secs() -> u64 {
    5
}

pub fn default_countdown_secs() -> u32 {
    5
}

pub fn default_chat_history_limit() -> usize {
    100
}

pub fn default_join_code_length() -> usize {
    8
}

pub fn default_event_buffer_size() -> usize {
    256
}

pub fn default_max_message_size() -> usize {
    65536
}

// --- judge section ---

pub fn default_judge_api_url() -> String {
    "http://localhost:2358/submissions?wait=true".to_string()
}

pub fn default_judge_timeout_secs() -> u64 {
    15
}

pub fn default_cpu_time_limit_secs() -> u32 {
    2
}

pub fn default_memory_limit_kb() -> u32 {
    128_000
}

pub fn default_language_ids() -> HashMap<String, u32> {
    HashMap::from([
        ("python".to_string(), 71),
        ("cpp".to_string(), 54),
        ("java".to_string(), 62),
        ("javascript".to_string(), 63),
        ("go".to_string(), 60),
    ])
}

// --- security section ---

pub fn default_token_secret() -> String {
    String::new()
}

pub fn default_token_ttl_secs() -> i64 {
    86_400
}

pub fn default_cors_origins() -> String {
    "*".to_string()
}

// --- rate limit section ---

pub fn default_max_room_creations() -> u32 {
    5
}

pub fn default_max_join_attempts() -> u32 {
    20
}

pub fn default_max_submissions() -> u32 {
    30
}

pub fn default_rate_limit_window_secs() -> u64 {
    60
}

// --- logging section ---

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "server.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub fn default_enable_file_logging() -> bool {
    false
}

pub fn default_log_format() -> LogFormat {
    LogFormat::Text
}
