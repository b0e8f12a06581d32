use agentdeck_primitives::deck_utils::deck_logging::{deck_log, DeckLogLevel, DeckLogOption};
use agentdeck_primitives::schemas::agent_prototype::OutputFormat;
use agentdeck_primitives::schemas::chat_message::MessageSender;
use futures::channel::mpsc;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use crate::llm_provider::error::LlmProviderError;
use crate::llm_provider::providers::{LlmInferenceResponse, LlmRequest, TextChunk, TextChunkStream};

// Chat-completions wire format shared by every OpenAI-compatible backend
// (OpenAI, Groq, DeepSeek, Mistral, Together, OpenRouter, xAI).

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
    // DeepSeek-style reasoning channel; absent on most backends.
    #[serde(default)]
    pub reasoning_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatStreamResponse {
    #[serde(default)]
    choices: Vec<ChatStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatStreamChoice {
    delta: ChatStreamDelta,
}

#[derive(Debug, Deserialize, Default)]
struct ChatStreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Builds the messages array from the uniform request. The system message
/// carries the prompt plus the output-format directive for formats the wire
/// protocol has no switch for.
pub fn chat_messages(request: &LlmRequest) -> Vec<JsonValue> {
    let mut messages = Vec::new();

    let mut system_content = request.system_instruction.clone().unwrap_or_default();
    if let Some(format) = format_directive(request) {
        if !system_content.is_empty() {
            system_content.push('\n');
        }
        system_content.push_str(&format);
    }
    if !system_content.is_empty() {
        messages.push(json!({ "role": "system", "content": system_content }));
    }

    for message in &request.history {
        let role = match message.sender {
            MessageSender::User => "user",
            MessageSender::Agent => "assistant",
        };
        match &message.image {
            Some(image) => {
                let data_url = format!("data:{};base64,{}", image.mime_type, image.data_base64);
                messages.push(json!({
                    "role": role,
                    "content": [
                        { "type": "text", "text": message.text },
                        { "type": "image_url", "image_url": { "url": data_url } }
                    ]
                }));
            }
            None => {
                messages.push(json!({ "role": role, "content": message.text }));
            }
        }
    }

    messages
}

fn format_directive(request: &LlmRequest) -> Option<String> {
    let config = request.output_format.as_ref()?;
    if !config.enabled {
        return None;
    }
    match config.format {
        // JSON goes through response_format instead, see chat_payload.
        OutputFormat::Json => None,
        OutputFormat::Xml => Some("Format the entire response as XML.".to_string()),
        OutputFormat::Yaml => Some("Format the entire response as YAML.".to_string()),
        OutputFormat::Markdown => Some("Format the entire response as Markdown.".to_string()),
        OutputFormat::Code => {
            let language = config.language.as_deref().unwrap_or("plain text");
            Some(format!("Respond with a single {} code block.", language))
        }
    }
}

pub fn chat_payload(request: &LlmRequest, stream: bool) -> JsonValue {
    let mut payload = json!({
        "model": request.model,
        "messages": chat_messages(request),
        "stream": stream,
    });

    if !request.tools.is_empty() {
        let tools: Vec<JsonValue> = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameter_schema,
                    }
                })
            })
            .collect();
        payload["tools"] = JsonValue::Array(tools);
    }

    if let Some(config) = request.output_format.as_ref() {
        if config.enabled && config.format == OutputFormat::Json {
            payload["response_format"] = json!({ "type": "json_object" });
        }
    }

    payload
}

/// Reads the error body of a failed call into a vendor error. Bodies that do
/// not match the `{"error":{"message"}}` shape are passed through verbatim.
pub fn vendor_error(status: u16, body: &str) -> LlmProviderError {
    let message = serde_json::from_str::<ApiErrorResponse>(body)
        .map(|parsed| parsed.error.message)
        .unwrap_or_else(|_| body.to_string());
    LlmProviderError::VendorError { status, message }
}

pub async fn post_chat(
    client: &Client,
    url: &str,
    api_key: &str,
    payload: JsonValue,
) -> Result<LlmInferenceResponse, LlmProviderError> {
    let res = client
        .post(url)
        .bearer_auth(api_key)
        .header("Content-Type", "application/json")
        .json(&payload)
        .send()
        .await?;

    let status = res.status();
    let body = res.text().await?;
    if !status.is_success() {
        return Err(vendor_error(status.as_u16(), &body));
    }

    let parsed: ChatCompletionResponse = serde_json::from_str(&body)?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmProviderError::UnexpectedResponseFormat("response carried no choices".to_string()))?;

    Ok(LlmInferenceResponse {
        text: choice.message.content.unwrap_or_default(),
        thinking: choice.message.reasoning_content,
        citations: Vec::new(),
    })
}

pub async fn post_chat_stream(
    client: &Client,
    url: &str,
    api_key: &str,
    payload: JsonValue,
) -> Result<TextChunkStream, LlmProviderError> {
    let res = client
        .post(url)
        .bearer_auth(api_key)
        .header("Content-Type", "application/json")
        .json(&payload)
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
                        match parse_sse_line(line.trim()) {
                            SseEvent::Chunk(chunk) => {
                                if sender.unbounded_send(chunk).is_err() {
                                    return;
                                }
                            }
                            SseEvent::Done => return,
                            SseEvent::Ignore => {}
                        }
                    }
                }
                Err(err) => {
                    deck_log(
                        DeckLogOption::Provider,
                        DeckLogLevel::Error,
                        format!("Error while receiving stream chunk: {:?}", err).as_str(),
                    );
                    let _ = sender.unbounded_send(TextChunk::error(err.to_string()));
                    return;
                }
            }
        }
    });

    Ok(Box::pin(receiver))
}

enum SseEvent {
    Chunk(TextChunk),
    Done,
    Ignore,
}

fn parse_sse_line(line: &str) -> SseEvent {
    let Some(data) = line.strip_prefix("data:") else {
        return SseEvent::Ignore;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseEvent::Done;
    }
    match serde_json::from_str::<ChatStreamResponse>(data) {
        Ok(parsed) => {
            let delta = parsed
                .choices
                .into_iter()
                .next()
                .map(|choice| choice.delta)
                .unwrap_or_default();
            let text = delta.content.unwrap_or_default();
            if text.is_empty() && delta.reasoning_content.is_none() {
                return SseEvent::Ignore;
            }
            SseEvent::Chunk(TextChunk {
                text,
                thinking: delta.reasoning_content,
                error: None,
            })
        }
        Err(_) => SseEvent::Ignore,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentdeck_primitives::schemas::agent_prototype::{OutputFormatConfig, ToolDefinition};
    use agentdeck_primitives::schemas::chat_message::ChatMessage;
    use serde_json::json;

    fn request_with_history() -> LlmRequest {
        let mut request = LlmRequest::new("sk-test", "gpt-4o-mini");
        request.system_instruction = Some("You forecast weather.".to_string());
        request.history = vec![ChatMessage::user("Will it rain?")];
        request
    }

    #[test]
    fn test_payload_includes_system_and_history() {
        let payload = chat_payload(&request_with_history(), false);
        assert_eq!(payload["model"], "gpt-4o-mini");
        assert_eq!(payload["stream"], false);
        let messages = payload["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[1]["content"], "Will it rain?");
    }

    #[test]
    fn test_payload_maps_tools() {
        let mut request = request_with_history();
        request.tools = vec![ToolDefinition {
            name: "get_weather".to_string(),
            description: "Current conditions for a city".to_string(),
            parameter_schema: json!({ "type": "object" }),
            output_schema: json!({}),
        }];

        let payload = chat_payload(&request, false);
        let tools = payload["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["function"]["name"], "get_weather");
    }

    #[test]
    fn test_json_output_uses_response_format() {
        let mut request = request_with_history();
        request.output_format = Some(OutputFormatConfig {
            enabled: true,
            format: OutputFormat::Json,
            language: None,
        });

        let payload = chat_payload(&request, false);
        assert_eq!(payload["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_yaml_output_becomes_system_directive() {
        let mut request = request_with_history();
        request.output_format = Some(OutputFormatConfig {
            enabled: true,
            format: OutputFormat::Yaml,
            language: None,
        });

        let payload = chat_payload(&request, false);
        let system = payload["messages"][0]["content"].as_str().unwrap();
        assert!(system.contains("YAML"));
    }

    #[test]
    fn test_parse_sse_data_line() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}";
        match parse_sse_line(line) {
            SseEvent::Chunk(chunk) => assert_eq!(chunk.text, "Hel"),
            _ => panic!("expected a chunk"),
        }
    }

    #[test]
    fn test_parse_sse_done_marker() {
        assert!(matches!(parse_sse_line("data: [DONE]"), SseEvent::Done));
        assert!(matches!(parse_sse_line(": keep-alive"), SseEvent::Ignore));
        assert!(matches!(parse_sse_line(""), SseEvent::Ignore));
    }

    #[test]
    fn test_vendor_error_extracts_message() {
        let err = vendor_error(429, "{\"error\":{\"message\":\"rate limited\"}}");
        match err {
            LlmProviderError::VendorError { status, message } => {
                assert_eq!(status, 429);
                assert_eq!(message, "rate limited");
            }
            _ => panic!("expected vendor error"),
        }
    }
}
