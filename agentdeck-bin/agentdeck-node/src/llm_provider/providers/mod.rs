use std::fmt;
use std::pin::Pin;

use agentdeck_primitives::schemas::agent_prototype::{OutputFormatConfig, ToolDefinition};
use agentdeck_primitives::schemas::chat_message::{ChatMessage, Citation};
use agentdeck_primitives::schemas::provider::ProviderKind;
use async_trait::async_trait;
use futures::Stream;
use reqwest::Client;

use super::error::LlmProviderError;

pub mod claude;
pub mod deepseek;
pub mod gemini;
pub mod groq;
pub mod mistral;
pub mod ollama;
pub mod openai;
pub mod openrouter;
pub mod shared;
pub mod togetherai;
pub mod xai;

/// Operation names as the dispatcher reports them in unsupported-operation
/// errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmOperation {
    GenerateContent,
    GenerateContentStream,
    GenerateContentWithSearch,
    GenerateImage,
    EditImage,
}

impl fmt::Display for LlmOperation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            LlmOperation::GenerateContent => "generateContent",
            LlmOperation::GenerateContentStream => "generateContentStream",
            LlmOperation::GenerateContentWithSearch => "generateContentWithSearch",
            LlmOperation::GenerateImage => "generateImage",
            LlmOperation::EditImage => "editImage",
        };
        write!(f, "{}", name)
    }
}

/// Uniform text-generation request every vendor client accepts. The
/// credential is an API key, or the endpoint URL for local inference; it is
/// never logged.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub credential: String,
    pub model: String,
    pub system_instruction: Option<String>,
    pub history: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
    pub output_format: Option<OutputFormatConfig>,
}

impl LlmRequest {
    pub fn new(credential: impl Into<String>, model: impl Into<String>) -> Self {
        LlmRequest {
            credential: credential.into(),
            model: model.into(),
            system_instruction: None,
            history: Vec::new(),
            tools: Vec::new(),
            output_format: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LlmInferenceResponse {
    pub text: String,
    pub thinking: Option<String>,
    pub citations: Vec<Citation>,
}

impl LlmInferenceResponse {
    pub fn text_only(text: impl Into<String>) -> Self {
        LlmInferenceResponse {
            text: text.into(),
            thinking: None,
            citations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub credential: String,
    pub model: String,
    pub prompt: String,
}

#[derive(Debug, Clone)]
pub struct ImageEditRequest {
    pub credential: String,
    pub model: String,
    pub prompt: String,
    pub image_mime_type: String,
    pub image_base64: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub mime_type: String,
    pub data_base64: String,
}

/// One partial result of a streaming generation. A chunk with `error` set
/// terminates the stream from the consumer's point of view.
#[derive(Debug, Clone, Default)]
pub struct TextChunk {
    pub text: String,
    pub thinking: Option<String>,
    pub error: Option<String>,
}

impl TextChunk {
    pub fn text(text: impl Into<String>) -> Self {
        TextChunk {
            text: text.into(),
            ..TextChunk::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        TextChunk {
            error: Some(message.into()),
            ..TextChunk::default()
        }
    }
}

/// Lazy, finite, non-restartable sequence of partial generation results. May
/// legitimately yield zero chunks.
pub type TextChunkStream = Pin<Box<dyn Stream<Item = TextChunk> + Send>>;

/// Strategy interface over the vendor clients. `generate_content` is the one
/// operation every vendor has; everything else defaults to a structured
/// unsupported error so a vendor client only implements what its API offers.
#[async_trait]
pub trait LlmService: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn generate_content(
        &self,
        client: &Client,
        request: &LlmRequest,
    ) -> Result<LlmInferenceResponse, LlmProviderError>;

    async fn generate_content_stream(
        &self,
        _client: &Client,
        _request: &LlmRequest,
    ) -> Result<TextChunkStream, LlmProviderError> {
        Err(LlmProviderError::OperationNotSupported {
            operation: LlmOperation::GenerateContentStream,
            provider: self.kind(),
        })
    }

    async fn generate_content_with_search(
        &self,
        _client: &Client,
        _request: &LlmRequest,
    ) -> Result<LlmInferenceResponse, LlmProviderError> {
        Err(LlmProviderError::OperationNotSupported {
            operation: LlmOperation::GenerateContentWithSearch,
            provider: self.kind(),
        })
    }

    async fn generate_image(
        &self,
        _client: &Client,
        _request: &ImageRequest,
    ) -> Result<GeneratedImage, LlmProviderError> {
        Err(LlmProviderError::OperationNotSupported {
            operation: LlmOperation::GenerateImage,
            provider: self.kind(),
        })
    }

    async fn edit_image(
        &self,
        _client: &Client,
        _request: &ImageEditRequest,
    ) -> Result<GeneratedImage, LlmProviderError> {
        Err(LlmProviderError::OperationNotSupported {
            operation: LlmOperation::EditImage,
            provider: self.kind(),
        })
    }
}
