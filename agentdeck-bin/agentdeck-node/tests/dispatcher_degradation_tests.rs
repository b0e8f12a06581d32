use agentdeck_node::llm_provider::dispatcher::ProviderDispatcher;
use agentdeck_node::llm_provider::providers::{ImageEditRequest, ImageRequest, LlmRequest};
use agentdeck_primitives::schemas::provider::{ProviderKind, ALL_PROVIDERS};
use futures::StreamExt;

// Calling an operation a vendor client does not implement must settle into a
// structured error value with the canonical message, for every provider.
#[tokio::test]
async fn unsupported_operations_return_error_values() {
    let dispatcher = ProviderDispatcher::new();

    let image_request = ImageRequest {
        credential: "key".to_string(),
        model: "whatever".to_string(),
        prompt: "a lighthouse".to_string(),
    };
    for provider in ALL_PROVIDERS {
        if matches!(provider, ProviderKind::OpenAi | ProviderKind::Gemini) {
            continue;
        }
        let result = dispatcher.generate_image(provider, &image_request).await;
        assert!(result.image.is_none());
        assert_eq!(
            result.error.as_deref(),
            Some(format!("generateImage is not supported by {}", provider).as_str())
        );
    }

    let edit_request = ImageEditRequest {
        credential: "key".to_string(),
        model: "whatever".to_string(),
        prompt: "add rain".to_string(),
        image_mime_type: "image/png".to_string(),
        image_base64: String::new(),
    };
    let result = dispatcher.edit_image(ProviderKind::Claude, &edit_request).await;
    assert_eq!(result.error.as_deref(), Some("editImage is not supported by claude"));
}

#[tokio::test]
async fn unsupported_search_is_reported_per_provider() {
    let dispatcher = ProviderDispatcher::new();
    let request = LlmRequest::new("key", "some-model");

    for provider in [ProviderKind::Claude, ProviderKind::Ollama, ProviderKind::Groq] {
        let result = dispatcher.generate_content_with_search(provider, &request).await;
        assert!(result.text.is_none());
        assert_eq!(
            result.error.as_deref(),
            Some(format!("generateContentWithSearch is not supported by {}", provider).as_str())
        );
    }
}

// The streaming operation degrades the same way: one error chunk, then the
// stream ends. The consumer never hangs waiting for a first byte.
#[tokio::test]
async fn failed_stream_start_yields_single_error_chunk() {
    let dispatcher = ProviderDispatcher::new();
    let request = LlmRequest::new("", "llama3.1");

    let mut chunk_stream = dispatcher
        .generate_content_stream(ProviderKind::Ollama, &request)
        .await;

    let first = chunk_stream.next().await.expect("exactly one chunk");
    assert_eq!(first.error.as_deref(), Some("URL is not set"));
    assert!(chunk_stream.next().await.is_none());
}

// Missing credentials are caught before any network traffic and settle as
// values.
#[tokio::test]
async fn missing_credentials_settle_as_errors() {
    let dispatcher = ProviderDispatcher::new();
    let request = LlmRequest::new("", "any-model");

    for provider in ALL_PROVIDERS {
        let result = dispatcher.generate_content(provider, &request).await;
        assert!(result.is_error(), "provider {} should refuse empty credential", provider);
    }
}
