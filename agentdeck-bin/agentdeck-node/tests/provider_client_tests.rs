use agentdeck_node::llm_provider::dispatcher::ProviderDispatcher;
use agentdeck_node::llm_provider::providers::LlmRequest;
use agentdeck_node::managers::local_detection::detect_local_models;
use agentdeck_node::storage::account_client::{masked_update, AccountClient};
use agentdeck_node::storage::StorageError;
use agentdeck_primitives::schemas::chat_message::ChatMessage;
use agentdeck_primitives::schemas::provider::ProviderKind;
use agentdeck_primitives::schemas::provider_settings::{default_settings_map, CREDENTIAL_MASK};
use futures::StreamExt;

fn ollama_request(endpoint: &str) -> LlmRequest {
    let mut request = LlmRequest::new(endpoint, "llama3.1");
    request.system_instruction = Some("You forecast weather.".to_string());
    request.history = vec![ChatMessage::user("Will it rain tomorrow?")];
    request
}

// The local provider speaks to whatever endpoint the credential points at,
// which lets the whole request/response path run against a mock server.
#[tokio::test]
async fn ollama_chat_round_trip() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{\"message\":{\"role\":\"assistant\",\"content\":\"Light rain expected.\"},\"done\":true}")
        .create_async()
        .await;

    let dispatcher = ProviderDispatcher::new();
    let result = dispatcher
        .generate_content(ProviderKind::Ollama, &ollama_request(&server.url()))
        .await;

    mock.assert_async().await;
    assert_eq!(result.error, None);
    assert_eq!(result.text.as_deref(), Some("Light rain expected."));
}

#[tokio::test]
async fn ollama_stream_concatenates_chunks() {
    let mut server = mockito::Server::new_async().await;
    let body = concat!(
        "{\"message\":{\"role\":\"assistant\",\"content\":\"Light \"},\"done\":false}\n",
        "{\"message\":{\"role\":\"assistant\",\"content\":\"rain.\"},\"done\":false}\n",
        "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n",
    );
    server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_header("content-type", "application/x-ndjson")
        .with_body(body)
        .create_async()
        .await;

    let dispatcher = ProviderDispatcher::new();
    let mut chunk_stream = dispatcher
        .generate_content_stream(ProviderKind::Ollama, &ollama_request(&server.url()))
        .await;

    let mut text = String::new();
    while let Some(chunk) = chunk_stream.next().await {
        assert!(chunk.error.is_none());
        text.push_str(&chunk.text);
    }
    assert_eq!(text, "Light rain.");
}

#[tokio::test]
async fn ollama_vendor_error_settles_as_value() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(404)
        .with_body("{\"error\":\"model 'llama3.1' not found\"}")
        .create_async()
        .await;

    let dispatcher = ProviderDispatcher::new();
    let result = dispatcher
        .generate_content(ProviderKind::Ollama, &ollama_request(&server.url()))
        .await;

    assert!(result.text.is_none());
    let error = result.error.unwrap();
    assert!(error.contains("404"), "error should carry the status: {}", error);
}

#[tokio::test]
async fn account_client_sends_masked_secrets() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("PUT", "/v1/provider-settings")
        .match_header("authorization", "Bearer token-9")
        .match_body(mockito::Matcher::PartialJsonString(format!(
            "{{\"openai\":{{\"credential\":\"{}\"}}}}",
            CREDENTIAL_MASK
        )))
        .with_status(204)
        .create_async()
        .await;

    let mut settings = default_settings_map();
    settings.get_mut(&ProviderKind::OpenAi).unwrap().credential = "sk-live-secret".to_string();

    let client = AccountClient::new(server.url());
    client
        .save_provider_settings("token-9", &masked_update(&settings))
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn account_client_reports_unexpected_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/provider-settings")
        .with_status(401)
        .create_async()
        .await;

    let client = AccountClient::new(server.url());
    let result = client.fetch_provider_settings("expired-token").await;
    assert!(matches!(result, Err(StorageError::UnexpectedStatus(401))));
}

#[tokio::test]
async fn local_detection_reads_installed_models() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{\"models\":[{\"name\":\"llama3.1\"},{\"name\":\"moondream\"}]}")
        .create_async()
        .await;

    let result = detect_local_models(&server.url()).await;
    assert!(result.detected);
    assert_eq!(result.models, vec!["llama3.1", "moondream"]);
}

#[tokio::test]
async fn local_detection_treats_non_200_as_not_detected() {
    let mut server = mockito::Server::new_async().await;
    server.mock("GET", "/api/tags").with_status(500).create_async().await;

    let result = detect_local_models(&server.url()).await;
    assert!(!result.detected);
    assert!(result.models.is_empty());
}
