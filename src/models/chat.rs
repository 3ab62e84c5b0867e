use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::{Message, Sender};

pub const NEW_CHAT_TITLE: &str = "New Chat";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: i64,
    #[serde(default)]
    pub archived: bool,
}

impl Chat {
    pub fn new(created_at: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: NEW_CHAT_TITLE.to_string(),
            messages: Vec::new(),
            created_at,
            archived: false,
        }
    }

    pub fn has_user_message(&self) -> bool {
        self.messages.iter().any(|m| m.sender == Sender::User)
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.messages.last().map(|m| m.timestamp)
    }

    /// Timestamp for the next appended message, never earlier than the last one.
    pub fn next_timestamp(&self, now: i64) -> i64 {
        self.last_timestamp().map_or(now, |last| now.max(last))
    }
}
