//! Turns a conversation history into a bot reply via the remote backend.
//!
//! The network half ([`ResponsePipeline::request_reply`]) runs on a spawned
//! task and never fails: every error is folded into [`ReplyOutcome::Failed`].
//! The rendering half ([`render_reply`]) runs on the store's side when the
//! outcome is applied, so tone augmentation can use the store's injected RNG.

use std::sync::Arc;

use rand::Rng;

use crate::models::Message;
use crate::providers::{CompanionBackend, ProviderError, ReplyRequest};
use crate::services::tone;

/// Smallest budget ever sent to the model, whatever the configured length.
pub const MIN_RESPONSE_TOKENS: u32 = 1500;
/// Largest budget ever sent to the model.
pub const MAX_RESPONSE_TOKENS: u32 = 2048;

/// Replies shorter than this are never considered truncated.
pub const TRUNCATION_MIN_CHARS: usize = 100;
pub const TERMINAL_PUNCTUATION: [char; 5] = ['.', '!', '?', ':', ';'];

pub const SYSTEM_INSTRUCTION: &str = "You are a warm, empathetic and supportive mental health companion. \
Listen carefully, validate the user's feelings, and respond with kindness and practical, gentle suggestions. \
You are not a replacement for professional care; encourage seeking professional help when appropriate. \
Always give complete, conclusive answers: even when you need to be brief, finish every sentence and never stop mid-thought.";

pub const FALLBACK_REPLY: &str =
    "I'm sorry, I had trouble generating a response just now. Please try again in a moment.";

pub fn effective_token_budget(configured: u32) -> u32 {
    configured.clamp(MIN_RESPONSE_TOKENS, MAX_RESPONSE_TOKENS)
}

/// Render messages as `Role: content` lines separated by blank lines.
pub fn build_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.sender.transcript_label(), m.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Full prompt for reply generation: system instruction, transcript, and an
/// open assistant turn.
pub fn build_prompt(messages: &[Message]) -> String {
    format!(
        "{}\n\nConversation so far:\n\n{}\n\nAssistant:",
        SYSTEM_INSTRUCTION,
        build_transcript(messages)
    )
}

/// Heuristic: a long reply that does not end in terminal punctuation was
/// probably cut off by the token budget.
pub fn looks_truncated(text: &str) -> bool {
    let trimmed = text.trim_end();
    if trimmed.chars().count() <= TRUNCATION_MIN_CHARS {
        return false;
    }
    match trimmed.chars().last() {
        Some(last) => !TERMINAL_PUNCTUATION.contains(&last),
        None => false,
    }
}

#[derive(Debug)]
pub enum ReplyOutcome {
    Generated { content: String, truncated: bool },
    Failed(ProviderError),
}

#[derive(Clone)]
pub struct ResponsePipeline {
    backend: Arc<dyn CompanionBackend>,
}

impl ResponsePipeline {
    pub fn new(backend: Arc<dyn CompanionBackend>) -> Self {
        Self { backend }
    }

    pub async fn request_reply(&self, history: Vec<Message>, configured_length: u32) -> ReplyOutcome {
        let max_tokens = effective_token_budget(configured_length);
        tracing::debug!(
            backend = self.backend.name(),
            messages = history.len(),
            max_tokens,
            "Requesting reply"
        );

        let request = ReplyRequest {
            messages: history,
            max_tokens,
        };

        match self.backend.generate_reply(request).await {
            Ok(response) if response.content.trim().is_empty() => {
                let error = ProviderError::InvalidResponse("Empty reply content".to_string());
                tracing::error!("Reply generation failed: {}", error);
                ReplyOutcome::Failed(error)
            }
            Ok(response) => {
                let truncated = response
                    .truncated
                    .unwrap_or_else(|| looks_truncated(&response.content));
                if truncated {
                    tracing::warn!(
                        chars = response.content.chars().count(),
                        max_tokens,
                        "Reply may have been truncated"
                    );
                }
                ReplyOutcome::Generated {
                    content: response.content,
                    truncated,
                }
            }
            Err(e) => {
                tracing::error!("Reply generation failed: {}", e);
                ReplyOutcome::Failed(e)
            }
        }
    }
}

/// Final bot message text for an outcome.
pub fn render_reply<R: Rng + ?Sized>(outcome: ReplyOutcome, friendly_tone: bool, rng: &mut R) -> String {
    match outcome {
        ReplyOutcome::Generated { content, .. } if friendly_tone => tone::augment(&content, rng),
        ReplyOutcome::Generated { content, .. } => content,
        ReplyOutcome::Failed(_) => FALLBACK_REPLY.to_string(),
    }
}
