use agentdeck_primitives::schemas::provider::ProviderKind;
use async_trait::async_trait;
use reqwest::Client;

use super::shared::openai_api::{chat_payload, post_chat, post_chat_stream};
use super::{LlmInferenceResponse, LlmRequest, LlmService, TextChunkStream};
use crate::llm_provider::error::LlmProviderError;

const OPENROUTER_CHAT_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

pub struct OpenRouter;

fn require_key(credential: &str) -> Result<&str, LlmProviderError> {
    let key = credential.trim();
    if key.is_empty() {
        Err(LlmProviderError::ApiKeyNotSet)
    } else {
        Ok(key)
    }
}

#[async_trait]
impl LlmService for OpenRouter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenRouter
    }

    async fn generate_content(
        &self,
        client: &Client,
        request: &LlmRequest,
    ) -> Result<LlmInferenceResponse, LlmProviderError> {
        let key = require_key(&request.credential)?;
        post_chat(client, OPENROUTER_CHAT_URL, key, chat_payload(request, false)).await
    }

    async fn generate_content_stream(
        &self,
        client: &Client,
        request: &LlmRequest,
    ) -> Result<TextChunkStream, LlmProviderError> {
        let key = require_key(&request.credential)?;
        post_chat_stream(client, OPENROUTER_CHAT_URL, key, chat_payload(request, true)).await
    }
}
