use async_trait::async_trait;

use super::types::{
    ProviderError, ReplyRequest, ReplyResponse, SuggestionRequest, SuggestionResponse,
};

/// The remote side of the companion: reply generation and quick-reply suggestions.
#[async_trait]
pub trait CompanionBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate_reply(&self, request: ReplyRequest) -> Result<ReplyResponse, ProviderError>;

    async fn suggest(
        &self,
        request: SuggestionRequest,
    ) -> Result<SuggestionResponse, ProviderError>;
}
