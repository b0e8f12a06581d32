use agentdeck_primitives::deck_utils::deck_logging::{deck_log, DeckLogLevel, DeckLogOption};
use agentdeck_primitives::schemas::chat_message::Citation;
use agentdeck_primitives::schemas::provider::ProviderKind;
use futures::stream;
use lazy_static::lazy_static;
use reqwest::Client;

lazy_static! {
    // One connection pool for every vendor call in the process.
    static ref HTTP_CLIENT: Client = Client::new();
}

use super::error::LlmProviderError;
use super::providers::claude::Claude;
use super::providers::deepseek::DeepSeek;
use super::providers::gemini::Gemini;
use super::providers::groq::Groq;
use super::providers::mistral::Mistral;
use super::providers::ollama::Ollama;
use super::providers::openai::OpenAi;
use super::providers::openrouter::OpenRouter;
use super::providers::togetherai::TogetherAi;
use super::providers::xai::Xai;
use super::providers::{
    GeneratedImage, ImageEditRequest, ImageRequest, LlmInferenceResponse, LlmRequest, LlmService, TextChunk,
    TextChunkStream,
};

/// Settled outcome of a text operation. Exactly one of `text` / `error` is
/// meaningful; failures are carried as a value, never as `Err`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextResult {
    pub text: Option<String>,
    pub thinking: Option<String>,
    pub citations: Vec<Citation>,
    pub error: Option<String>,
}

impl TextResult {
    fn from_response(response: LlmInferenceResponse) -> Self {
        TextResult {
            text: Some(response.text),
            thinking: response.thinking,
            citations: response.citations,
            error: None,
        }
    }

    fn from_error(err: LlmProviderError) -> Self {
        TextResult {
            text: None,
            thinking: None,
            citations: Vec::new(),
            error: Some(err.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Settled outcome of an image operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageResult {
    pub image: Option<GeneratedImage>,
    pub error: Option<String>,
}

impl ImageResult {
    fn from_image(image: GeneratedImage) -> Self {
        ImageResult {
            image: Some(image),
            error: None,
        }
    }

    fn from_error(err: LlmProviderError) -> Self {
        ImageResult {
            image: None,
            error: Some(err.to_string()),
        }
    }
}

/// Static strategy table. Every enum value has a client; resolving through
/// `Option` gives unresolved configs the documented default-provider
/// fallback instead of a failure.
fn service_for(provider: ProviderKind) -> &'static dyn LlmService {
    match provider {
        ProviderKind::Gemini => &Gemini,
        ProviderKind::OpenAi => &OpenAi,
        ProviderKind::Claude => &Claude,
        ProviderKind::Mistral => &Mistral,
        ProviderKind::Groq => &Groq,
        ProviderKind::DeepSeek => &DeepSeek,
        ProviderKind::TogetherAi => &TogetherAi,
        ProviderKind::OpenRouter => &OpenRouter,
        ProviderKind::Xai => &Xai,
        ProviderKind::Ollama => &Ollama,
    }
}

pub fn resolve(provider: Option<ProviderKind>) -> &'static dyn LlmService {
    service_for(provider.unwrap_or_default())
}

/// One uniform interface over the vendor clients. Vendor and transport
/// failures never escape as errors: each operation settles into a result the
/// UI can render directly.
pub struct ProviderDispatcher {
    client: Client,
}

impl Default for ProviderDispatcher {
    fn default() -> Self {
        ProviderDispatcher::new()
    }
}

impl ProviderDispatcher {
    pub fn new() -> Self {
        ProviderDispatcher {
            client: HTTP_CLIENT.clone(),
        }
    }

    pub async fn generate_content(&self, provider: ProviderKind, request: &LlmRequest) -> TextResult {
        match service_for(provider).generate_content(&self.client, request).await {
            Ok(response) => TextResult::from_response(response),
            Err(err) => {
                log_dispatch_error(provider, &err);
                TextResult::from_error(err)
            }
        }
    }

    pub async fn generate_content_with_search(&self, provider: ProviderKind, request: &LlmRequest) -> TextResult {
        match service_for(provider)
            .generate_content_with_search(&self.client, request)
            .await
        {
            Ok(response) => TextResult::from_response(response),
            Err(err) => {
                log_dispatch_error(provider, &err);
                TextResult::from_error(err)
            }
        }
    }

    /// The only streaming operation. A provider-side failure before the first
    /// byte degrades to a one-chunk stream carrying the error, so consumers
    /// have a single shape to handle.
    pub async fn generate_content_stream(&self, provider: ProviderKind, request: &LlmRequest) -> TextChunkStream {
        match service_for(provider).generate_content_stream(&self.client, request).await {
            Ok(chunk_stream) => chunk_stream,
            Err(err) => {
                log_dispatch_error(provider, &err);
                Box::pin(stream::iter(vec![TextChunk::error(err.to_string())]))
            }
        }
    }

    pub async fn generate_image(&self, provider: ProviderKind, request: &ImageRequest) -> ImageResult {
        match service_for(provider).generate_image(&self.client, request).await {
            Ok(image) => ImageResult::from_image(image),
            Err(err) => {
                log_dispatch_error(provider, &err);
                ImageResult::from_error(err)
            }
        }
    }

    pub async fn edit_image(&self, provider: ProviderKind, request: &ImageEditRequest) -> ImageResult {
        match service_for(provider).edit_image(&self.client, request).await {
            Ok(image) => ImageResult::from_image(image),
            Err(err) => {
                log_dispatch_error(provider, &err);
                ImageResult::from_error(err)
            }
        }
    }
}

fn log_dispatch_error(provider: ProviderKind, err: &LlmProviderError) {
    deck_log(
        DeckLogOption::Provider,
        DeckLogLevel::Error,
        format!("Dispatch to {} failed: {}", provider, err).as_str(),
    );
}
