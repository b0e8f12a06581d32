use agentdeck_primitives::deck_utils::deck_logging::{deck_log, DeckLogLevel, DeckLogOption};
use agentdeck_primitives::schemas::agent_prototype::OutputFormat;
use agentdeck_primitives::schemas::chat_message::{Citation, CitationSource, MessageSender};
use agentdeck_primitives::schemas::provider::ProviderKind;
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use super::{
    GeneratedImage, ImageEditRequest, ImageRequest, LlmInferenceResponse, LlmRequest, LlmService, TextChunk,
    TextChunkStream,
};
use crate::llm_provider::error::LlmProviderError;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct Gemini;

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "groundingMetadata")]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
    #[serde(default)]
    thought: bool,
    #[serde(rename = "inlineData")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GroundingMetadata {
    #[serde(rename = "groundingChunks", default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<WebSource>,
}

#[derive(Debug, Deserialize)]
struct WebSource {
    #[serde(default)]
    uri: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    code: i32,
    message: String,
    status: String,
}

fn require_key(credential: &str) -> Result<&str, LlmProviderError> {
    let key = credential.trim();
    if key.is_empty() {
        Err(LlmProviderError::ApiKeyNotSet)
    } else {
        Ok(key)
    }
}

fn contents_from_history(request: &LlmRequest) -> Vec<JsonValue> {
    request
        .history
        .iter()
        .map(|message| {
            let role = match message.sender {
                MessageSender::User => "user",
                MessageSender::Agent => "model",
            };
            let mut parts = vec![json!({ "text": message.text })];
            if let Some(image) = &message.image {
                parts.push(json!({
                    "inlineData": { "mimeType": image.mime_type, "data": image.data_base64 }
                }));
            }
            json!({ "role": role, "parts": parts })
        })
        .collect()
}

fn generate_payload(request: &LlmRequest, with_search: bool) -> JsonValue {
    let mut payload = json!({ "contents": contents_from_history(request) });

    if let Some(system) = &request.system_instruction {
        if !system.is_empty() {
            payload["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }
    }

    if let Some(config) = request.output_format.as_ref() {
        if config.enabled && config.format == OutputFormat::Json {
            payload["generationConfig"] = json!({ "responseMimeType": "application/json" });
        }
    }

    if with_search {
        payload["tools"] = json!([{ "googleSearch": {} }]);
    } else if !request.tools.is_empty() {
        let declarations: Vec<JsonValue> = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameter_schema,
                })
            })
            .collect();
        payload["tools"] = json!([{ "functionDeclarations": declarations }]);
    }

    payload
}

fn parse_generate_response(body: &str) -> Result<LlmInferenceResponse, LlmProviderError> {
    let parsed: GeminiResponse = serde_json::from_str(body)?;
    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| LlmProviderError::UnexpectedResponseFormat("response carried no candidates".to_string()))?;

    let mut text = String::new();
    let mut thinking = String::new();
    if let Some(content) = &candidate.content {
        for part in &content.parts {
            if part.thought {
                thinking.push_str(&part.text);
            } else {
                text.push_str(&part.text);
            }
        }
    }

    let citations = candidate
        .grounding_metadata
        .map(citations_from_metadata)
        .unwrap_or_default();

    Ok(LlmInferenceResponse {
        text,
        thinking: if thinking.is_empty() { None } else { Some(thinking) },
        citations,
    })
}

fn citations_from_metadata(metadata: GroundingMetadata) -> Vec<Citation> {
    metadata
        .grounding_chunks
        .into_iter()
        .filter_map(|chunk| chunk.web)
        .map(|web| Citation {
            source: CitationSource::Web,
            uri: web.uri,
            title: web.title,
        })
        .collect()
}

fn extract_inline_image(body: &str) -> Result<GeneratedImage, LlmProviderError> {
    let parsed: GeminiResponse = serde_json::from_str(body)?;
    for candidate in parsed.candidates {
        if let Some(content) = candidate.content {
            for part in content.parts {
                if let Some(inline) = part.inline_data {
                    return Ok(GeneratedImage {
                        mime_type: inline.mime_type,
                        data_base64: inline.data,
                    });
                }
            }
        }
    }
    Err(LlmProviderError::UnexpectedResponseFormat(
        "response carried no inline image".to_string(),
    ))
}

async fn post_generate(
    client: &Client,
    url: &str,
    payload: &JsonValue,
) -> Result<String, LlmProviderError> {
    let res = client
        .post(url)
        .header("Content-Type", "application/json")
        .json(payload)
        .send()
        .await?;
    let status = res.status();
    let body = res.text().await?;
    if !status.is_success() {
        let message = serde_json::from_str::<GeminiErrorResponse>(&body)
            .map(|parsed| format!("{} - Status: {}", parsed.error.message, parsed.error.status))
            .unwrap_or(body);
        return Err(LlmProviderError::VendorError {
            status: status.as_u16(),
            message,
        });
    }
    Ok(body)
}

/// Incremental parse of Gemini's streaming wire format: one JSON array spread
/// across byte chunks, elements separated by commas. The buffer is rewrapped
/// as `[...]` on every attempt and drained once it parses.
fn process_chunk(
    chunk: &[u8],
    buffer: &mut String,
    out: &mut Vec<TextChunk>,
) -> Result<bool, LlmProviderError> {
    let chunk_str = String::from_utf8_lossy(chunk);
    buffer.push_str(&chunk_str);
    let mut is_done = false;

    let trimmed = buffer.trim_start().to_string();
    *buffer = trimmed;
    if buffer.starts_with(',') || buffer.starts_with('[') {
        buffer.remove(0);
    }
    if buffer.ends_with(']') {
        buffer.pop();
        is_done = true;
    }

    let json_str = format!("[{}]", buffer);
    match serde_json::from_str::<Vec<JsonValue>>(&json_str) {
        Ok(array) => {
            for value in array {
                if let Ok(error_response) = serde_json::from_value::<GeminiErrorResponse>(value.clone()) {
                    return Err(LlmProviderError::VendorError {
                        status: error_response.error.code as u16,
                        message: format!(
                            "{} - Status: {}",
                            error_response.error.message, error_response.error.status
                        ),
                    });
                }
                if let Ok(response) = serde_json::from_value::<GeminiResponse>(value) {
                    for candidate in response.candidates {
                        if let Some(content) = candidate.content {
                            for part in content.parts {
                                if part.text.is_empty() {
                                    continue;
                                }
                                if part.thought {
                                    out.push(TextChunk {
                                        text: String::new(),
                                        thinking: Some(part.text),
                                        error: None,
                                    });
                                } else {
                                    out.push(TextChunk::text(part.text));
                                }
                            }
                        }
                    }
                }
            }
            buffer.clear();
        }
        Err(err) => {
            deck_log(
                DeckLogOption::Provider,
                DeckLogLevel::Debug,
                format!("Stream buffer not yet parseable as JSON array: {:?}", err).as_str(),
            );
        }
    }

    Ok(is_done)
}

#[async_trait]
impl LlmService for Gemini {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn generate_content(
        &self,
        client: &Client,
        request: &LlmRequest,
    ) -> Result<LlmInferenceResponse, LlmProviderError> {
        let key = require_key(&request.credential)?;
        let url = format!("{}/models/{}:generateContent?key={}", GEMINI_API_BASE, request.model, key);
        let body = post_generate(client, &url, &generate_payload(request, false)).await?;
        parse_generate_response(&body)
    }

    async fn generate_content_with_search(
        &self,
        client: &Client,
        request: &LlmRequest,
    ) -> Result<LlmInferenceResponse, LlmProviderError> {
        let key = require_key(&request.credential)?;
        let url = format!("{}/models/{}:generateContent?key={}", GEMINI_API_BASE, request.model, key);
        let body = post_generate(client, &url, &generate_payload(request, true)).await?;
        parse_generate_response(&body)
    }

    async fn generate_content_stream(
        &self,
        client: &Client,
        request: &LlmRequest,
    ) -> Result<TextChunkStream, LlmProviderError> {
        let key = require_key(&request.credential)?;
        let url = format!(
            "{}/models/{}:streamGenerateContent?key={}",
            GEMINI_API_BASE, request.model, key
        );

        let res = client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&generate_payload(request, false))
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiErrorResponse>(&body)
                .map(|parsed| parsed.error.message)
                .unwrap_or(body);
            return Err(LlmProviderError::VendorError {
                status: status.as_u16(),
                message,
            });
        }

        let (sender, receiver) = mpsc::unbounded();
        tokio::spawn(async move {
            let mut stream = res.bytes_stream();
            let mut buffer = String::new();
            while let Some(item) = stream.next().await {
                match item {
                    Ok(bytes) => {
                        let mut chunks = Vec::new();
                        match process_chunk(&bytes, &mut buffer, &mut chunks) {
                            Ok(is_done) => {
                                for chunk in chunks {
                                    if sender.unbounded_send(chunk).is_err() {
                                        return;
                                    }
                                }
                                if is_done {
                                    return;
                                }
                            }
                            Err(err) => {
                                let _ = sender.unbounded_send(TextChunk::error(err.to_string()));
                                return;
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

    async fn generate_image(
        &self,
        client: &Client,
        request: &ImageRequest,
    ) -> Result<GeneratedImage, LlmProviderError> {
        let key = require_key(&request.credential)?;
        let url = format!("{}/models/{}:generateContent?key={}", GEMINI_API_BASE, request.model, key);
        let payload = json!({
            "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
            "generationConfig": { "responseModalities": ["TEXT", "IMAGE"] },
        });
        let body = post_generate(client, &url, &payload).await?;
        extract_inline_image(&body)
    }

    async fn edit_image(
        &self,
        client: &Client,
        request: &ImageEditRequest,
    ) -> Result<GeneratedImage, LlmProviderError> {
        let key = require_key(&request.credential)?;
        let url = format!("{}/models/{}:generateContent?key={}", GEMINI_API_BASE, request.model, key);
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": request.prompt },
                    { "inlineData": { "mimeType": request.image_mime_type, "data": request.image_base64 } }
                ]
            }],
            "generationConfig": { "responseModalities": ["TEXT", "IMAGE"] },
        });
        let body = post_generate(client, &url, &payload).await?;
        extract_inline_image(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_first_chunk() {
        let chunk = b"[{
            \"candidates\": [
                {
                    \"content\": {
                        \"parts\": [
                            {
                                \"text\": \"The\"
                            }
                        ],
                        \"role\": \"model\"
                    },
                    \"finishReason\": \"STOP\",
                    \"index\": 0
                }
            ]
        }";

        let mut buffer = String::new();
        let mut out = Vec::new();
        let is_done = process_chunk(chunk, &mut buffer, &mut out).unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "The");
        assert!(!is_done);
    }

    #[test]
    fn test_process_middle_and_last_chunk() {
        let mut buffer = String::new();
        let mut out = Vec::new();

        let middle = b",
        {
            \"candidates\": [
                { \"content\": { \"parts\": [{ \"text\": \" Roman Empire\" }], \"role\": \"model\" } }
            ]
        }";
        let is_done = process_chunk(middle, &mut buffer, &mut out).unwrap();
        assert!(!is_done);

        let last = b",
        {
            \"candidates\": [
                { \"content\": { \"parts\": [{ \"text\": \" fell.\" }], \"role\": \"model\" } }
            ]
        }]";
        let is_done = process_chunk(last, &mut buffer, &mut out).unwrap();
        assert!(is_done);

        let text: String = out.iter().map(|chunk| chunk.text.as_str()).collect();
        assert_eq!(text, " Roman Empire fell.");
    }

    #[test]
    fn test_process_split_json_reassembles() {
        let mut buffer = String::new();
        let mut out = Vec::new();

        let first_half = b"[{ \"candidates\": [ { \"content\": { \"par";
        let is_done = process_chunk(first_half, &mut buffer, &mut out).unwrap();
        assert!(!is_done);
        assert!(out.is_empty());

        let second_half = b"ts\": [{ \"text\": \"Hello\" }] } } ] }]";
        let is_done = process_chunk(second_half, &mut buffer, &mut out).unwrap();
        assert!(is_done);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "Hello");
    }

    #[test]
    fn test_process_thought_parts_become_thinking_chunks() {
        let chunk = b"[{
            \"candidates\": [
                { \"content\": { \"parts\": [{ \"text\": \"Weighing options\", \"thought\": true }] } }
            ]
        }";

        let mut buffer = String::new();
        let mut out = Vec::new();
        process_chunk(chunk, &mut buffer, &mut out).unwrap();

        assert_eq!(out.len(), 1);
        assert!(out[0].text.is_empty());
        assert_eq!(out[0].thinking.as_deref(), Some("Weighing options"));
    }

    #[test]
    fn test_process_error_response() {
        let chunk = b"[{
            \"error\": {
                \"code\": 503,
                \"message\": \"The model is overloaded. Please try again later.\",
                \"status\": \"UNAVAILABLE\"
            }
        }]";

        let mut buffer = String::new();
        let mut out = Vec::new();
        let result = process_chunk(chunk, &mut buffer, &mut out);

        match result {
            Err(LlmProviderError::VendorError { status, message }) => {
                assert_eq!(status, 503);
                assert!(message.contains("overloaded"));
                assert!(message.contains("UNAVAILABLE"));
            }
            other => panic!("expected vendor error, got {:?}", other),
        }
    }

    #[test]
    fn test_citations_extracted_from_grounding_metadata() {
        let body = "{
            \"candidates\": [
                {
                    \"content\": { \"parts\": [{ \"text\": \"It rained in Lisbon.\" }] },
                    \"groundingMetadata\": {
                        \"groundingChunks\": [
                            { \"web\": { \"uri\": \"https://example.com/wx\", \"title\": \"Lisbon weather\" } }
                        ]
                    }
                }
            ]
        }";

        let response = parse_generate_response(body).unwrap();
        assert_eq!(response.text, "It rained in Lisbon.");
        assert_eq!(response.citations.len(), 1);
        assert_eq!(response.citations[0].source, CitationSource::Web);
        assert_eq!(response.citations[0].uri, "https://example.com/wx");
    }

    #[test]
    fn test_search_payload_uses_google_search_tool() {
        let mut request = LlmRequest::new("key", "gemini-2.0-flash");
        request.history = vec![agentdeck_primitives::schemas::chat_message::ChatMessage::user("hi")];
        let payload = generate_payload(&request, true);
        assert!(payload["tools"][0].get("googleSearch").is_some());
    }
}
