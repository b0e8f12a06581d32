use std::path::PathBuf;

use agentdeck_node::engine::DeckEngine;
use agentdeck_node::storage::account_client::AccountClient;
use agentdeck_node::storage::device_store::DeviceStore;

const DEFAULT_ACCOUNT_API_URL: &str = "https://accounts.agentdeck.dev";

fn device_store_path() -> PathBuf {
    match std::env::var("AGENTDECK_HOME") {
        Ok(home) => PathBuf::from(home).join("device_store.json"),
        Err(_) => PathBuf::from("agentdeck_storage").join("device_store.json"),
    }
}

#[tokio::main]
pub async fn main() {
    let device_store = DeviceStore::new(device_store_path());
    let account_api_url =
        std::env::var("AGENTDECK_ACCOUNT_API").unwrap_or_else(|_| DEFAULT_ACCOUNT_API_URL.to_string());
    let account_client = AccountClient::new(account_api_url);

    let engine = DeckEngine::initialize(device_store, account_client).await;

    let settings = engine.provider_settings().await;
    let enabled: Vec<String> = settings
        .iter()
        .filter(|(_, provider_settings)| provider_settings.enabled)
        .map(|(provider, _)| provider.to_string())
        .collect();
    if enabled.is_empty() {
        println!("No providers enabled yet; add credentials in the builder settings.");
    } else {
        println!("Enabled providers: {}", enabled.join(", "));
    }

    let detection = engine.detect_local_models().await;
    if detection.detected {
        println!("Local inference detected ({} models).", detection.models.len());
    } else {
        println!("No local inference endpoint detected.");
    }
}
