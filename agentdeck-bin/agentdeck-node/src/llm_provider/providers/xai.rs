use agentdeck_primitives::schemas::chat_message::{Citation, CitationSource};
use agentdeck_primitives::schemas::provider::ProviderKind;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::shared::openai_api::{chat_payload, post_chat, post_chat_stream, vendor_error, ChatCompletionResponse};
use super::{LlmInferenceResponse, LlmRequest, LlmService, TextChunkStream};
use crate::llm_provider::error::LlmProviderError;

const XAI_CHAT_URL: &str = "https://api.x.ai/v1/chat/completions";

pub struct Xai;

// Live-search replies are chat completions plus a flat list of source URLs.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(flatten)]
    completion: ChatCompletionResponse,
    #[serde(default)]
    citations: Vec<String>,
}

fn require_key(credential: &str) -> Result<&str, LlmProviderError> {
    let key = credential.trim();
    if key.is_empty() {
        Err(LlmProviderError::ApiKeyNotSet)
    } else {
        Ok(key)
    }
}

#[async_trait]
impl LlmService for Xai {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Xai
    }

    async fn generate_content(
        &self,
        client: &Client,
        request: &LlmRequest,
    ) -> Result<LlmInferenceResponse, LlmProviderError> {
        let key = require_key(&request.credential)?;
        post_chat(client, XAI_CHAT_URL, key, chat_payload(request, false)).await
    }

    async fn generate_content_stream(
        &self,
        client: &Client,
        request: &LlmRequest,
    ) -> Result<TextChunkStream, LlmProviderError> {
        let key = require_key(&request.credential)?;
        post_chat_stream(client, XAI_CHAT_URL, key, chat_payload(request, true)).await
    }

    async fn generate_content_with_search(
        &self,
        client: &Client,
        request: &LlmRequest,
    ) -> Result<LlmInferenceResponse, LlmProviderError> {
        let key = require_key(&request.credential)?;
        let mut payload = chat_payload(request, false);
        payload["search_parameters"] = json!({ "mode": "auto", "return_citations": true });

        let res = client
            .post(XAI_CHAT_URL)
            .bearer_auth(key)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;
        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            return Err(vendor_error(status.as_u16(), &body));
        }

        let parsed: SearchResponse = serde_json::from_str(&body)?;
        let choice = parsed.completion.choices.into_iter().next().ok_or_else(|| {
            LlmProviderError::UnexpectedResponseFormat("response carried no choices".to_string())
        })?;
        let citations = parsed
            .citations
            .into_iter()
            .map(|uri| Citation {
                source: CitationSource::Web,
                uri,
                title: String::new(),
            })
            .collect();

        Ok(LlmInferenceResponse {
            text: choice.message.content.unwrap_or_default(),
            thinking: choice.message.reasoning_content,
            citations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_response_parses_citations() {
        let body = "{
            \"choices\": [{ \"message\": { \"content\": \"It is sunny.\" } }],
            \"citations\": [\"https://example.com/wx\"]
        }";
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.citations.len(), 1);
        assert_eq!(
            parsed.completion.choices[0].message.content.as_deref(),
            Some("It is sunny.")
        );
    }
}
