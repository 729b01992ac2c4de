use crate::auth::Identity;
use crate::protocol::{validation, ChatMessage, RoomId, ServerEvent};
use crate::store::BattleStore;

use super::{BattleServer, ServiceError};

impl BattleServer {
    /// Persist and broadcast a user chat message.
    pub async fn post_chat(
        &self,
        identity: &Identity,
        room_id: &RoomId,
        body: &str,
    ) -> Result<(), ServiceError> {
        validation::validate_chat_message(body).map_err(ServiceError::InvalidConfig)?;

        let Some(message) = self
            .store()
            .save_chat_message(room_id, &identity.username, body, false)
            .await?
        else {
            return Err(ServiceError::NotFound("Room"));
        };

        self.metrics().increment_chat_messages();
        self.publish_room(
            room_id,
            ServerEvent::ChatMessage {
                message: message.message,
                sender: message.sender,
                timestamp: message.timestamp,
                is_system: false,
            },
        );
        Ok(())
    }

    /// Persist and broadcast a server-generated system message
    /// ("{user} joined the lobby", "Room closed. Chat cleared.", ...).
    pub(crate) async fn system_chat(&self, room_id: &RoomId, text: &str) {
        match self
            .store()
            .save_chat_message(room_id, "System", text, true)
            .await
        {
            Ok(Some(message)) => {
                self.publish_room(
                    room_id,
                    ServerEvent::ChatMessage {
                        message: message.message,
                        sender: message.sender,
                        timestamp: message.timestamp,
                        is_system: true,
                    },
                );
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(%room_id, error = %err, "Failed to persist system message");
            }
        }
    }

    /// Last chat lines for a room, oldest first.
    pub async fn chat_history(&self, room_id: &RoomId) -> Result<Vec<ChatMessage>, ServiceError> {
        Ok(self
            .store()
            .chat_history(room_id, self.config().chat_history_limit)
            .await?)
    }
}
