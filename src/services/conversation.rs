use anyhow::Result;

use crate::models::Chat;
use crate::services::database::Database;

pub const CHATS_KEY: &str = "chats";

pub const GREETING: &str = "Hi, I'm your mental health companion. How are you feeling today? I'm here to listen and support you.";

const TITLE_MAX_CHARS: usize = 20;

/// Title for a chat derived from its first user message: the first 20
/// characters, with an ellipsis when the message is longer.
pub fn derive_title(text: &str) -> String {
    match text.char_indices().nth(TITLE_MAX_CHARS) {
        Some((boundary, _)) => format!("{}...", &text[..boundary]),
        None => text.to_string(),
    }
}

/// Load the stored chat list. Absent, unreadable or malformed data all yield
/// `None`; the caller starts fresh.
pub fn load_chats(db: &Database) -> Option<Vec<Chat>> {
    let json = match db.get_item(CHATS_KEY) {
        Ok(Some(json)) => json,
        Ok(None) => return None,
        Err(e) => {
            tracing::error!("Failed to read stored chats: {}", e);
            return None;
        }
    };

    match serde_json::from_str::<Vec<Chat>>(&json) {
        Ok(chats) => Some(chats),
        Err(e) => {
            tracing::warn!("Stored chats are corrupt, starting fresh: {}", e);
            None
        }
    }
}

pub fn save_chats(db: &Database, chats: &[Chat]) -> Result<()> {
    let json = serde_json::to_string(chats)?;
    db.set_item(CHATS_KEY, &json)
}
