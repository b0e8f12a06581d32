use agentdeck_primitives::deck_utils::deck_logging::{deck_log, DeckLogLevel, DeckLogOption};
use agentdeck_primitives::schemas::chat_message::MessageSender;
use agentdeck_primitives::schemas::provider::ProviderKind;
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use super::shared::openai_api::vendor_error;
use super::{LlmInferenceResponse, LlmRequest, LlmService, TextChunk, TextChunkStream};
use crate::llm_provider::error::LlmProviderError;

const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_OUTPUT_TOKENS: u32 = 8192;

pub struct Claude;

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockDelta {
        delta: StreamDelta,
    },
    MessageStop,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamDelta {
    TextDelta {
        text: String,
    },
    ThinkingDelta {
        thinking: String,
    },
    #[serde(other)]
    Other,
}

fn require_key(credential: &str) -> Result<&str, LlmProviderError> {
    let key = credential.trim();
    if key.is_empty() {
        Err(LlmProviderError::ApiKeyNotSet)
    } else {
        Ok(key)
    }
}

fn messages_payload(request: &LlmRequest, stream: bool) -> JsonValue {
    let messages: Vec<JsonValue> = request
        .history
        .iter()
        .map(|message| {
            let role = match message.sender {
                MessageSender::User => "user",
                MessageSender::Agent => "assistant",
            };
            match &message.image {
                Some(image) => json!({
                    "role": role,
                    "content": [
                        {
                            "type": "image",
                            "source": {
                                "type": "base64",
                                "media_type": image.mime_type,
                                "data": image.data_base64,
                            }
                        },
                        { "type": "text", "text": message.text }
                    ]
                }),
                None => json!({ "role": role, "content": message.text }),
            }
        })
        .collect();

    let mut payload = json!({
        "model": request.model,
        "max_tokens": MAX_OUTPUT_TOKENS,
        "messages": messages,
        "stream": stream,
    });

    if let Some(system) = &request.system_instruction {
        if !system.is_empty() {
            payload["system"] = json!(system);
        }
    }

    if !request.tools.is_empty() {
        let tools: Vec<JsonValue> = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.parameter_schema,
                })
            })
            .collect();
        payload["tools"] = JsonValue::Array(tools);
    }

    payload
}

fn parse_messages_response(body: &str) -> Result<LlmInferenceResponse, LlmProviderError> {
    let parsed: MessagesResponse = serde_json::from_str(body)?;
    let mut text = String::new();
    let mut thinking = String::new();
    for block in parsed.content {
        match block {
            ContentBlock::Text { text: t } => text.push_str(&t),
            ContentBlock::Thinking { thinking: t } => thinking.push_str(&t),
            ContentBlock::Other => {}
        }
    }
    Ok(LlmInferenceResponse {
        text,
        thinking: if thinking.is_empty() { None } else { Some(thinking) },
        citations: Vec::new(),
    })
}

fn parse_stream_line(line: &str) -> Option<TextChunk> {
    let data = line.strip_prefix("data:")?.trim();
    match serde_json::from_str::<StreamEvent>(data) {
        Ok(StreamEvent::ContentBlockDelta { delta }) => match delta {
            StreamDelta::TextDelta { text } => Some(TextChunk::text(text)),
            StreamDelta::ThinkingDelta { thinking } => Some(TextChunk {
                text: String::new(),
                thinking: Some(thinking),
                error: None,
            }),
            StreamDelta::Other => None,
        },
        _ => None,
    }
}

fn is_stream_stop(line: &str) -> bool {
    line.strip_prefix("data:")
        .map(|data| matches!(serde_json::from_str::<StreamEvent>(data.trim()), Ok(StreamEvent::MessageStop)))
        .unwrap_or(false)
}

#[async_trait]
impl LlmService for Claude {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Claude
    }

    async fn generate_content(
        &self,
        client: &Client,
        request: &LlmRequest,
    ) -> Result<LlmInferenceResponse, LlmProviderError> {
        let key = require_key(&request.credential)?;
        let res = client
            .post(CLAUDE_API_URL)
            .header("x-api-key", key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&messages_payload(request, false))
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            return Err(vendor_error(status.as_u16(), &body));
        }
        parse_messages_response(&body)
    }

    async fn generate_content_stream(
        &self,
        client: &Client,
        request: &LlmRequest,
    ) -> Result<TextChunkStream, LlmProviderError> {
        let key = require_key(&request.credential)?;
        let res = client
            .post(CLAUDE_API_URL)
            .header("x-api-key", key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&messages_payload(request, true))
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(vendor_error(status.as_u16(), &body));
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
                            let line = line.trim();
                            if is_stream_stop(line) {
                                return;
                            }
                            if let Some(chunk) = parse_stream_line(line) {
                                if sender.unbounded_send(chunk).is_err() {
                                    return;
                                }
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
    fn test_payload_carries_system_and_roles() {
        let mut request = LlmRequest::new("key", "claude-3-5-sonnet-latest");
        request.system_instruction = Some("be terse".to_string());
        request.history = vec![ChatMessage::user("hello"), ChatMessage::agent("hi")];

        let payload = messages_payload(&request, false);
        assert_eq!(payload["system"], "be terse");
        assert_eq!(payload["messages"][0]["role"], "user");
        assert_eq!(payload["messages"][1]["role"], "assistant");
    }

    #[test]
    fn test_response_splits_text_and_thinking_blocks() {
        let body = "{
            \"content\": [
                { \"type\": \"thinking\", \"thinking\": \"Short answer suffices.\" },
                { \"type\": \"text\", \"text\": \"Hello.\" }
            ]
        }";
        let response = parse_messages_response(body).unwrap();
        assert_eq!(response.text, "Hello.");
        assert_eq!(response.thinking.as_deref(), Some("Short answer suffices."));
    }

    #[test]
    fn test_stream_delta_lines() {
        let chunk =
            parse_stream_line("data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hel\"}}")
                .unwrap();
        assert_eq!(chunk.text, "Hel");

        assert!(parse_stream_line("event: content_block_delta").is_none());
        assert!(is_stream_stop("data: {\"type\":\"message_stop\"}"));
    }
}
