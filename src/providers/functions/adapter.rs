use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::providers::traits::CompanionBackend;
use crate::providers::types::*;

const REPLY_FUNCTION: &str = "chat-gemini";
const SUGGESTIONS_FUNCTION: &str = "chat-suggestions";

#[derive(Clone)]
pub struct FunctionsConfig {
    pub base_url: String,
    pub api_key: String,
}

impl std::fmt::Debug for FunctionsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionsConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .finish()
    }
}

/// Client for the hosted serverless functions that front the language model.
pub struct FunctionsClient {
    client: Client,
    config: FunctionsConfig,
}

impl FunctionsClient {
    pub fn new(config: FunctionsConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn function_url(&self, name: &str) -> String {
        format!(
            "{}/functions/v1/{}",
            self.config.base_url.trim_end_matches('/'),
            name
        )
    }

    async fn invoke<B, T>(&self, name: &str, body: &B) -> Result<T, ProviderError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.function_url(name))
            .bearer_auth(&self.config.api_key)
            .header("apikey", &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::AuthError(format!(
                "Function {} rejected credentials",
                name
            )));
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited {
                retry_after_secs: None,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or_else(|_| "Request failed".to_string());
            return Err(ProviderError::RequestFailed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                detail
            )));
        }

        match serde_json::from_str::<FunctionResponse<T>>(&body) {
            Ok(FunctionResponse::Ok(payload)) => Ok(payload),
            Ok(FunctionResponse::Failed(err)) => Err(ProviderError::RequestFailed(err.error)),
            Err(e) => Err(ProviderError::InvalidResponse(e.to_string())),
        }
    }
}

#[async_trait]
impl CompanionBackend for FunctionsClient {
    fn name(&self) -> &'static str {
        "functions"
    }

    async fn generate_reply(&self, request: ReplyRequest) -> Result<ReplyResponse, ProviderError> {
        self.invoke(REPLY_FUNCTION, &request).await
    }

    async fn suggest(
        &self,
        request: SuggestionRequest,
    ) -> Result<SuggestionResponse, ProviderError> {
        self.invoke(SUGGESTIONS_FUNCTION, &request).await
    }
}
