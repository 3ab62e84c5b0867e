use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::database::Database;

pub const SETTINGS_KEY: &str = "chatSettings";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub show_timestamps: bool,
    #[serde(rename = "useFriendlyTone", alias = "friendlyTone")]
    pub friendly_tone: bool,
    /// Configured reply budget in model tokens, clamped before use.
    pub response_length: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_timestamps: true,
            friendly_tone: true,
            response_length: 150,
        }
    }
}

pub struct SettingsService;

impl SettingsService {
    pub fn load(db: &Database) -> Settings {
        match db.get_item(SETTINGS_KEY) {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!("Stored settings are unreadable, using defaults: {}", e);
                Settings::default()
            }),
            Ok(None) => Settings::default(),
            Err(e) => {
                tracing::error!("Failed to read settings: {}", e);
                Settings::default()
            }
        }
    }

    pub fn save(db: &Database, settings: &Settings) -> Result<()> {
        let json = serde_json::to_string(settings)?;
        db.set_item(SETTINGS_KEY, &json)
    }
}
