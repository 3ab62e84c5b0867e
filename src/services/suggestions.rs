use std::sync::Arc;

use crate::models::Message;
use crate::providers::{CompanionBackend, ProviderError, SuggestionRequest};
use crate::services::pipeline::build_transcript;

pub const MAX_SUGGESTIONS: usize = 4;
pub const MAX_SUGGESTION_CHARS: usize = 40;
/// Number of trailing messages sent as context.
pub const CONTEXT_WINDOW: usize = 3;

pub const FALLBACK_SUGGESTIONS: [&str; MAX_SUGGESTIONS] = [
    "I've been feeling overwhelmed lately",
    "Something happened at work today",
    "My sleep has been affected",
    "I'm trying to practice self-care",
];

pub fn fallback_suggestions() -> Vec<String> {
    FALLBACK_SUGGESTIONS.iter().map(|s| s.to_string()).collect()
}

/// Last few messages of a conversation.
pub fn context_window(messages: &[Message]) -> Vec<Message> {
    let start = messages.len().saturating_sub(CONTEXT_WINDOW);
    messages[start..].to_vec()
}

pub fn build_suggestion_prompt(context: &[Message]) -> String {
    let mut prompt = String::from(
        "You help people talk with a supportive mental health companion. \
Suggest exactly 4 short messages the user might want to send next.",
    );
    if context.is_empty() {
        prompt.push_str(" The conversation has just started, so suggest common concerns or conversation starters.");
    } else {
        prompt.push_str("\n\nRecent conversation:\n\n");
        prompt.push_str(&build_transcript(context));
    }
    prompt.push_str(&format!(
        "\n\nReturn them only as a JSON array of strings. Keep each one under {} characters.",
        MAX_SUGGESTION_CHARS
    ));
    prompt
}

/// Pull suggestions out of free-form model output. Only the first JSON array,
/// starting at the first `[`, is parsed; anything unusable yields the fixed
/// fallback list.
pub fn parse_suggestions(raw: &str) -> Vec<String> {
    let Some(start) = raw.find('[') else {
        tracing::warn!("No JSON array in suggestions response, using fallback");
        return fallback_suggestions();
    };

    let first = serde_json::Deserializer::from_str(&raw[start..])
        .into_iter::<Vec<String>>()
        .next();

    match first {
        Some(Ok(items)) => {
            let cleaned = clean_suggestions(items);
            if cleaned.is_empty() {
                fallback_suggestions()
            } else {
                cleaned
            }
        }
        Some(Err(e)) => {
            tracing::warn!("Unparseable suggestions array, using fallback: {}", e);
            fallback_suggestions()
        }
        None => fallback_suggestions(),
    }
}

fn clean_suggestions(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(MAX_SUGGESTIONS)
        .collect()
}

/// Quick-reply suggestions shown under the active chat.
#[derive(Debug, Clone)]
pub struct SuggestionState {
    items: Vec<String>,
    loading: bool,
    latest_request: u64,
}

impl Default for SuggestionState {
    fn default() -> Self {
        Self {
            items: fallback_suggestions(),
            loading: false,
            latest_request: 0,
        }
    }
}

impl SuggestionState {
    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Whether a fetch has been started at least once.
    pub fn has_requested(&self) -> bool {
        self.latest_request > 0
    }

    /// Mark a new fetch in flight and return its sequence number.
    pub fn begin(&mut self) -> u64 {
        self.latest_request += 1;
        self.loading = true;
        self.latest_request
    }

    /// Apply a finished fetch. Results of superseded fetches are ignored;
    /// failures keep whatever list is already shown.
    pub fn complete(&mut self, request: u64, result: Result<Vec<String>, ProviderError>) {
        if request != self.latest_request {
            tracing::debug!(request, latest = self.latest_request, "Dropping stale suggestions");
            return;
        }
        self.loading = false;

        match result {
            Ok(items) => {
                let cleaned = clean_suggestions(items);
                if cleaned.is_empty() {
                    tracing::warn!("Suggestions response was empty, keeping current list");
                } else {
                    self.items = cleaned;
                }
            }
            Err(e) => {
                tracing::warn!("Failed to fetch suggestions: {}", e);
            }
        }
    }
}

#[derive(Clone)]
pub struct SuggestionFetcher {
    backend: Arc<dyn CompanionBackend>,
}

impl SuggestionFetcher {
    pub fn new(backend: Arc<dyn CompanionBackend>) -> Self {
        Self { backend }
    }

    pub async fn fetch(&self, context: Vec<Message>) -> Result<Vec<String>, ProviderError> {
        tracing::debug!(context = context.len(), "Fetching suggestions");
        let response = self
            .backend
            .suggest(SuggestionRequest { messages: context })
            .await?;
        Ok(response.suggestions)
    }
}
