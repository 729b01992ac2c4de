use serde::{Deserialize, Serialize};

use super::types::{Difficulty, Visibility};

/// Maximum accepted room name length
pub const MAX_ROOM_NAME_LENGTH: usize = 100;
/// Maximum accepted topic length
pub const MAX_TOPIC_LENGTH: usize = 100;
/// Maximum accepted chat message length
pub const MAX_CHAT_MESSAGE_LENGTH: usize = 2000;

/// Requested configuration for a new room (HTTP create body)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub topic: String,
    pub difficulty: Difficulty,
    /// Minutes; 0 means unlimited (ranked rooms only).
    pub time_limit: u32,
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub is_ranked: bool,
}

fn default_capacity() -> u32 {
    2
}

/// Validate a room configuration before creation.
///
/// Rules: private rooms require a non-empty password; capacity >= 2; ranked
/// rooms may run unlimited (`time_limit = 0`) but unranked rooms must have a
/// positive limit.
pub fn validate_room_config(cfg: &RoomConfig) -> Result<(), String> {
    if cfg.topic.trim().is_empty() {
        return Err("Topic is required".to_string());
    }
    if cfg.topic.len() > MAX_TOPIC_LENGTH {
        return Err(format!("Topic exceeds {MAX_TOPIC_LENGTH} characters"));
    }
    if let Some(name) = &cfg.name {
        if name.len() > MAX_ROOM_NAME_LENGTH {
            return Err(format!("Room name exceeds {MAX_ROOM_NAME_LENGTH} characters"));
        }
    }
    if cfg.capacity < 2 {
        return Err("Capacity must be at least 2".to_string());
    }
    if cfg.visibility == Visibility::Private
        && cfg.password.as_deref().is_none_or(|p| p.trim().is_empty())
    {
        return Err("Password is required for private rooms".to_string());
    }
    if !cfg.is_ranked && cfg.time_limit == 0 {
        return Err("Time limit must be positive for unranked rooms".to_string());
    }
    Ok(())
}

/// Validate a chat message body.
pub fn validate_chat_message(message: &str) -> Result<(), String> {
    if message.trim().is_empty() {
        return Err("Message cannot be empty".to_string());
    }
    if message.len() > MAX_CHAT_MESSAGE_LENGTH {
        return Err(format!(
            "Message exceeds {MAX_CHAT_MESSAGE_LENGTH} characters"
        ));
    }
    Ok(())
}
