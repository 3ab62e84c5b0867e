use async_trait::async_trait;
use reqwest::Client;

use super::models::*;
use crate::providers::traits::CompanionBackend;
use crate::providers::types::*;
use crate::services::pipeline::{build_prompt, looks_truncated};
use crate::services::suggestions::{build_suggestion_prompt, parse_suggestions};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

const TEMPERATURE: f32 = 0.7;
const SUGGESTION_MAX_TOKENS: u32 = 200;

#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: Option<String>,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiConfig {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// Talks to the Gemini REST API directly, doing the work the hosted
/// `chat-gemini` and `chat-suggestions` functions do.
pub struct GeminiBackend {
    client: Client,
    config: GeminiConfig,
}

/// Text and finish reason of the first candidate.
struct Generated {
    text: String,
    finish_reason: Option<String>,
}

impl GeminiBackend {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ProviderError::AuthError("Missing Gemini API key".to_string()))
    }

    /// Parse an API error response body into a user-friendly message.
    fn parse_error_message(status: reqwest::StatusCode, body: &str) -> String {
        if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(body) {
            if let Some(msg) = parsed["error"]["message"].as_str() {
                return format!("HTTP {}: {}", status.as_u16(), msg);
            }
        }
        format!("HTTP {}: Request failed", status.as_u16())
    }

    async fn generate(&self, prompt: String, max_tokens: u32) -> Result<Generated, ProviderError> {
        let api_key = self.api_key()?;
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url(),
            self.config.model
        );

        let gemini_request = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart { text: Some(prompt) }],
            }],
            generation_config: Some(GeminiGenerationConfig {
                temperature: Some(TEMPERATURE),
                max_output_tokens: Some(max_tokens),
            }),
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&gemini_request)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ProviderError::AuthError("Invalid API key".to_string()));
        }

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed(Self::parse_error_message(
                status, &body,
            )));
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        if let Some(error) = gemini_response.error {
            return Err(ProviderError::RequestFailed(
                error.message.unwrap_or_else(|| "Unknown error".to_string()),
            ));
        }

        if let Some(usage) = &gemini_response.usage_metadata {
            tracing::debug!(
                tokens_in = ?usage.prompt_token_count,
                tokens_out = ?usage.candidates_token_count,
                "Gemini usage"
            );
        }

        let candidate = gemini_response
            .candidates
            .and_then(|c| c.into_iter().next())
            .ok_or_else(|| ProviderError::InvalidResponse("No candidates in response".to_string()))?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::InvalidResponse(
                "No content in response".to_string(),
            ));
        }

        Ok(Generated {
            text,
            finish_reason: candidate.finish_reason,
        })
    }
}

#[async_trait]
impl CompanionBackend for GeminiBackend {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate_reply(&self, request: ReplyRequest) -> Result<ReplyResponse, ProviderError> {
        if request.messages.is_empty() {
            return Err(ProviderError::RequestFailed(
                "No messages to respond to".to_string(),
            ));
        }

        let prompt = build_prompt(&request.messages);
        let generated = self.generate(prompt, request.max_tokens).await?;

        let truncated = generated.finish_reason.as_deref() == Some("MAX_TOKENS")
            || looks_truncated(&generated.text);

        Ok(ReplyResponse {
            content: generated.text,
            truncated: Some(truncated),
        })
    }

    async fn suggest(
        &self,
        request: SuggestionRequest,
    ) -> Result<SuggestionResponse, ProviderError> {
        let prompt = build_suggestion_prompt(&request.messages);
        let generated = self.generate(prompt, SUGGESTION_MAX_TOKENS).await?;

        Ok(SuggestionResponse {
            suggestions: parse_suggestions(&generated.text),
        })
    }
}
