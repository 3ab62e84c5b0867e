pub mod conversation;
pub mod database;
pub mod pipeline;
pub mod settings;
pub mod suggestions;
pub mod tone;

pub use database::Database;
pub use pipeline::{ReplyOutcome, ResponsePipeline};
pub use settings::{Settings, SettingsService};
pub use suggestions::{SuggestionFetcher, SuggestionState};
