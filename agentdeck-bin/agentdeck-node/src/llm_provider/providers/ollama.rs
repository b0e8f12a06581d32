use agentdeck_primitives::deck_utils::deck_logging::{deck_log, DeckLogLevel, DeckLogOption};
use agentdeck_primitives::schemas::chat_message::MessageSender;
use agentdeck_primitives::schemas::provider::ProviderKind;
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use super::{LlmInferenceResponse, LlmRequest, LlmService, TextChunk, TextChunkStream};
use crate::llm_provider::error::LlmProviderError;

/// Local inference. The credential slot carries the endpoint URL of the
/// user's Ollama server; there is no API key.
pub struct Ollama;

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

fn require_endpoint(credential: &str) -> Result<&str, LlmProviderError> {
    let endpoint = credential.trim().trim_end_matches('/');
    if endpoint.is_empty() {
        Err(LlmProviderError::UrlNotSet)
    } else {
        Ok(endpoint)
    }
}

fn chat_payload(request: &LlmRequest, stream: bool) -> JsonValue {
    let mut messages = Vec::new();
    if let Some(system) = &request.system_instruction {
        if !system.is_empty() {
            messages.push(json!({ "role": "system", "content": system }));
        }
    }
    for message in &request.history {
        let role = match message.sender {
            MessageSender::User => "user",
            MessageSender::Agent => "assistant",
        };
        let mut entry = json!({ "role": role, "content": message.text });
        if let Some(image) = &message.image {
            entry["images"] = json!([image.data_base64]);
        }
        messages.push(entry);
    }

    json!({
        "model": request.model,
        "messages": messages,
        "stream": stream,
    })
}

fn parse_chat_line(line: &str) -> Option<Result<TextChunk, String>> {
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<OllamaChatResponse>(line) {
        Ok(parsed) => {
            if let Some(error) = parsed.error {
                return Some(Err(error));
            }
            let content = parsed.message.map(|message| message.content).unwrap_or_default();
            if content.is_empty() && !parsed.done {
                return None;
            }
            Some(Ok(TextChunk::text(content)))
        }
        Err(_) => None,
    }
}

#[async_trait]
impl LlmService for Ollama {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    async fn generate_content(
        &self,
        client: &Client,
        request: &LlmRequest,
    ) -> Result<LlmInferenceResponse, LlmProviderError> {
        let endpoint = require_endpoint(&request.credential)?;
        let url = format!("{}/api/chat", endpoint);

        let res = client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&chat_payload(request, false))
            .send()
            .await?;
        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            return Err(LlmProviderError::VendorError {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: OllamaChatResponse = serde_json::from_str(&body)?;
        if let Some(error) = parsed.error {
            return Err(LlmProviderError::VendorError {
                status: status.as_u16(),
                message: error,
            });
        }
        Ok(LlmInferenceResponse::text_only(
            parsed.message.map(|message| message.content).unwrap_or_default(),
        ))
    }

    async fn generate_content_stream(
        &self,
        client: &Client,
        request: &LlmRequest,
    ) -> Result<TextChunkStream, LlmProviderError> {
        let endpoint = require_endpoint(&request.credential)?;
        let url = format!("{}/api/chat", endpoint);

        let res = client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&chat_payload(request, true))
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(LlmProviderError::VendorError {
                status: status.as_u16(),
                message: body,
            });
        }

        let (sender, receiver) = mpsc::unbounded();
        tokio::spawn(async move {
            let mut stream = res.bytes_stream();
            let mut buffer = String::new();
            while let Some(item) = stream.next().await {
                match item {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                        while let Some(position) = buffer.find('\n') {
                            let line: String = buffer.drain(..=position).collect();
                            match parse_chat_line(line.trim()) {
                                Some(Ok(chunk)) => {
                                    if sender.unbounded_send(chunk).is_err() {
                                        return;
                                    }
                                }
                                Some(Err(error)) => {
                                    let _ = sender.unbounded_send(TextChunk::error(error));
                                    return;
                                }
                                None => {}
                            }
                        }
                    }
                    Err(err) => {
                        deck_log(
                            DeckLogOption::Provider,
                            DeckLogLevel::Error,
                            format!("Error while receiving chunk: {:?}", err).as_str(),
                        );
                        let _ = sender.unbounded_send(TextChunk::error(err.to_string()));
                        return;
                    }
                }
            }
        });

        Ok(Box::pin(receiver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentdeck_primitives::schemas::chat_message::ChatMessage;

    #[test]
    fn test_empty_endpoint_is_url_not_set() {
        assert!(matches!(require_endpoint("   "), Err(LlmProviderError::UrlNotSet)));
        assert_eq!(
            require_endpoint("http://localhost:11434/").unwrap(),
            "http://localhost:11434"
        );
    }

    #[test]
    fn test_payload_maps_roles() {
        let mut request = LlmRequest::new("http://localhost:11434", "llama3.1");
        request.history = vec![ChatMessage::user("hi"), ChatMessage::agent("hello")];
        let payload = chat_payload(&request, true);
        assert_eq!(payload["messages"][0]["role"], "user");
        assert_eq!(payload["messages"][1]["role"], "assistant");
        assert_eq!(payload["stream"], true);
    }

    #[test]
    fn test_parse_stream_lines() {
        let chunk = parse_chat_line("{\"message\":{\"content\":\"Hel\"},\"done\":false}");
        assert_eq!(chunk.unwrap().unwrap().text, "Hel");

        let error = parse_chat_line("{\"error\":\"model not found\"}");
        assert_eq!(error.unwrap().unwrap_err(), "model not found");

        assert!(parse_chat_line("").is_none());
    }
}
