use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};

use crate::providers::{CompanionBackend, FunctionsClient, FunctionsConfig, GeminiBackend, GeminiConfig};

pub const APP_NAME: &str = "Companion";
pub const DB_FILE_NAME: &str = "companion.db";

pub const ENV_FUNCTIONS_URL: &str = "COMPANION_FUNCTIONS_URL";
pub const ENV_FUNCTIONS_KEY: &str = "COMPANION_FUNCTIONS_KEY";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_GEMINI_MODEL: &str = "GEMINI_MODEL";
pub const ENV_GEMINI_BASE_URL: &str = "GEMINI_BASE_URL";
pub const ENV_DATA_DIR: &str = "COMPANION_DATA_DIR";

/// Which remote the companion talks to.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    Functions(FunctionsConfig),
    Gemini(GeminiConfig),
}

impl BackendConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Hosted functions when both their URL and key are set, otherwise Gemini
    /// directly. A missing Gemini key is not an error here; replies fail and
    /// fall back to the apology message instead.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let (Some(base_url), Some(api_key)) =
            (non_empty(ENV_FUNCTIONS_URL), non_empty(ENV_FUNCTIONS_KEY))
        {
            return BackendConfig::Functions(FunctionsConfig { base_url, api_key });
        }

        let mut config = GeminiConfig::new(non_empty(ENV_GEMINI_API_KEY));
        if let Some(model) = non_empty(ENV_GEMINI_MODEL) {
            config = config.with_model(model);
        }
        if let Some(base_url) = non_empty(ENV_GEMINI_BASE_URL) {
            config = config.with_base_url(base_url);
        }
        BackendConfig::Gemini(config)
    }

    pub fn build(self) -> Arc<dyn CompanionBackend> {
        match self {
            BackendConfig::Functions(config) => Arc::new(FunctionsClient::new(config)),
            BackendConfig::Gemini(config) => {
                if config.api_key.is_none() {
                    tracing::warn!("{} is not set; replies will fail", ENV_GEMINI_API_KEY);
                }
                Arc::new(GeminiBackend::new(config))
            }
        }
    }
}

pub fn db_path() -> Result<PathBuf> {
    db_path_from(|key| std::env::var(key).ok())
}

fn db_path_from<F>(lookup: F) -> Result<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = lookup(ENV_DATA_DIR) {
        return Ok(PathBuf::from(dir).join(DB_FILE_NAME));
    }

    let data_dir = match (lookup("XDG_DATA_HOME"), lookup("HOME")) {
        (Some(xdg), _) => PathBuf::from(xdg),
        (None, Some(home)) => PathBuf::from(home).join(".local/share"),
        (None, None) => bail!("Neither XDG_DATA_HOME nor HOME is set"),
    };
    Ok(data_dir.join("companion").join(DB_FILE_NAME))
}
