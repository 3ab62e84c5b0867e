pub mod functions;
pub mod gemini;
pub mod traits;
pub mod types;

pub use functions::{FunctionsClient, FunctionsConfig};
pub use gemini::{GeminiBackend, GeminiConfig};
pub use traits::CompanionBackend;
pub use types::{
    ProviderError, ReplyRequest, ReplyResponse, SuggestionRequest, SuggestionResponse,
};
