use agentdeck_primitives::schemas::provider::ProviderKind;
use async_trait::async_trait;
use reqwest::multipart;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::shared::openai_api::{chat_payload, post_chat, post_chat_stream, vendor_error};
use super::{
    GeneratedImage, ImageEditRequest, ImageRequest, LlmInferenceResponse, LlmRequest, LlmService, TextChunkStream,
};
use crate::llm_provider::error::LlmProviderError;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

pub struct OpenAi;

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    b64_json: String,
}

fn require_key(request_credential: &str) -> Result<&str, LlmProviderError> {
    let key = request_credential.trim();
    if key.is_empty() {
        Err(LlmProviderError::ApiKeyNotSet)
    } else {
        Ok(key)
    }
}

fn parse_images_response(status: u16, body: &str) -> Result<GeneratedImage, LlmProviderError> {
    if !(200..300).contains(&status) {
        return Err(vendor_error(status, body));
    }
    let parsed: ImagesResponse = serde_json::from_str(body)?;
    let datum = parsed
        .data
        .into_iter()
        .next()
        .ok_or_else(|| LlmProviderError::UnexpectedResponseFormat("images response carried no data".to_string()))?;
    Ok(GeneratedImage {
        mime_type: "image/png".to_string(),
        data_base64: datum.b64_json,
    })
}

#[async_trait]
impl LlmService for OpenAi {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn generate_content(
        &self,
        client: &Client,
        request: &LlmRequest,
    ) -> Result<LlmInferenceResponse, LlmProviderError> {
        let key = require_key(&request.credential)?;
        let url = format!("{}/chat/completions", OPENAI_API_BASE);
        post_chat(client, &url, key, chat_payload(request, false)).await
    }

    async fn generate_content_stream(
        &self,
        client: &Client,
        request: &LlmRequest,
    ) -> Result<TextChunkStream, LlmProviderError> {
        let key = require_key(&request.credential)?;
        let url = format!("{}/chat/completions", OPENAI_API_BASE);
        post_chat_stream(client, &url, key, chat_payload(request, true)).await
    }

    async fn generate_image(
        &self,
        client: &Client,
        request: &ImageRequest,
    ) -> Result<GeneratedImage, LlmProviderError> {
        let key = require_key(&request.credential)?;
        let url = format!("{}/images/generations", OPENAI_API_BASE);
        let payload = json!({
            "model": request.model,
            "prompt": request.prompt,
            "response_format": "b64_json",
        });

        let res = client
            .post(&url)
            .bearer_auth(key)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;
        let status = res.status().as_u16();
        let body = res.text().await?;
        parse_images_response(status, &body)
    }

    async fn edit_image(
        &self,
        client: &Client,
        request: &ImageEditRequest,
    ) -> Result<GeneratedImage, LlmProviderError> {
        let key = require_key(&request.credential)?;
        let url = format!("{}/images/edits", OPENAI_API_BASE);

        let image_bytes = base64::decode(&request.image_base64)
            .map_err(|err| LlmProviderError::UnexpectedResponseFormat(format!("invalid image payload: {}", err)))?;
        let part = multipart::Part::bytes(image_bytes)
            .file_name("image.png")
            .mime_str(&request.image_mime_type)
            .map_err(|err| LlmProviderError::UnexpectedResponseFormat(format!("invalid image mime type: {}", err)))?;
        let form = multipart::Form::new()
            .text("model", request.model.clone())
            .text("prompt", request.prompt.clone())
            .text("response_format", "b64_json")
            .part("image", part);

        let res = client.post(&url).bearer_auth(key).multipart(form).send().await?;
        let status = res.status().as_u16();
        let body = res.text().await?;
        parse_images_response(status, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_reported_before_any_request() {
        assert!(matches!(require_key("  "), Err(LlmProviderError::ApiKeyNotSet)));
        assert_eq!(require_key("sk-live").unwrap(), "sk-live");
    }

    #[test]
    fn test_images_response_parse() {
        let body = "{\"data\":[{\"b64_json\":\"aGVsbG8=\"}]}";
        let image = parse_images_response(200, body).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data_base64, "aGVsbG8=");
    }

    #[test]
    fn test_images_error_status_becomes_vendor_error() {
        let body = "{\"error\":{\"message\":\"billing hard limit reached\"}}";
        match parse_images_response(400, body) {
            Err(LlmProviderError::VendorError { status, message }) => {
                assert_eq!(status, 400);
                assert!(message.contains("billing"));
            }
            other => panic!("unexpected result: {:?}", other.err()),
        }
    }
}
