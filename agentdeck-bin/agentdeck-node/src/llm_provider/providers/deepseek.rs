use agentdeck_primitives::schemas::provider::ProviderKind;
use async_trait::async_trait;
use reqwest::Client;

use super::shared::openai_api::{chat_payload, post_chat, post_chat_stream};
use super::{LlmInferenceResponse, LlmRequest, LlmService, TextChunkStream};
use crate::llm_provider::error::LlmProviderError;

// DeepSeek speaks the chat-completions dialect; deepseek-reasoner replies
// carry the reasoning channel the shared parser already maps to `thinking`.
const DEEPSEEK_CHAT_URL: &str = "https://api.deepseek.com/chat/completions";

pub struct DeepSeek;

fn require_key(credential: &str) -> Result<&str, LlmProviderError> {
    let key = credential.trim();
    if key.is_empty() {
        Err(LlmProviderError::ApiKeyNotSet)
    } else {
        Ok(key)
    }
}

#[async_trait]
impl LlmService for DeepSeek {
    fn kind(&self) -> ProviderKind {
        ProviderKind::DeepSeek
    }

    async fn generate_content(
        &self,
        client: &Client,
        request: &LlmRequest,
    ) -> Result<LlmInferenceResponse, LlmProviderError> {
        let key = require_key(&request.credential)?;
        post_chat(client, DEEPSEEK_CHAT_URL, key, chat_payload(request, false)).await
    }

    async fn generate_content_stream(
        &self,
        client: &Client,
        request: &LlmRequest,
    ) -> Result<TextChunkStream, LlmProviderError> {
        let key = require_key(&request.credential)?;
        post_chat_stream(client, DEEPSEEK_CHAT_URL, key, chat_payload(request, true)).await
    }
}
