//! Realtime wire messages
//!
//! Frames are JSON text: `{"event": <name>, "data": <payload>}`. Bare server
//! signals omit `data`.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Server-to-client event names
pub mod events {
    pub const MESSAGE_SENT: &str = "messageSent";
    pub const EVENTS_UPDATED: &str = "eventsUpdated";
    pub const NOTIFICATIONS_UPDATED: &str = "notificationsUpdated";
    pub const FRIEND_CHANGE: &str = "friendChange";
    pub const RSVP_OCCURRED: &str = "RSVPOcurred";
    pub const NEW_STORY_UPDATE: &str = "newStoryUpdate";
    pub const EXISTING_STORY_UPDATE: &str = "existingStoryUpdate";
}

/// Signals a connected client may send
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientSignal {
    MessageSent { chat: Uuid },
    JoinRooms(Vec<Uuid>),
    AppOpened { user: Uuid },
    NotificationsUpdated { user: Uuid },
}

/// Event pushed to connected clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEvent {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ServerEvent {
    pub fn bare(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: None,
        }
    }

    pub fn with_data(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data: Some(data),
        }
    }
}

/// Raw handshake query: `?user=<id>&chatList=<id,id,...>`
#[derive(Debug, Deserialize)]
pub struct HandshakeQuery {
    pub user: Option<String>,
    #[serde(rename = "chatList", default)]
    pub chat_list: Option<String>,
}

/// Validated handshake parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Handshake {
    pub user: Uuid,
    pub chats: Vec<Uuid>,
}

impl HandshakeQuery {
    /// Validate the query. A malformed user id is rejected; malformed chat ids
    /// are dropped.
    pub fn parse(&self) -> Result<Handshake> {
        let raw_user = self
            .user
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("missing user".to_string()))?;
        let user = Uuid::parse_str(raw_user.trim())
            .map_err(|_| AppError::BadRequest(format!("invalid user id: {}", raw_user)))?;

        let mut chats = Vec::new();
        for raw in self.chat_list.as_deref().unwrap_or("").split(',') {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            match Uuid::parse_str(raw) {
                Ok(chat) if !chats.contains(&chat) => chats.push(chat),
                Ok(_) => {}
                Err(_) => {
                    tracing::debug!(user_id = %user, chat = raw, "Skipping malformed chat id")
                }
            }
        }

        Ok(Handshake { user, chats })
    }
}
