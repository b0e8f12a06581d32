use std::time::Duration;

use agentdeck_primitives::deck_utils::deck_logging::{deck_log, DeckLogLevel, DeckLogOption};
use serde::Deserialize;

/// Probing a user-supplied endpoint must never hang the settings screen.
pub const DETECTION_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectedLocalModels {
    pub detected: bool,
    pub models: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

/// Probes a local Ollama-style endpoint for its installed models. Timeouts,
/// connection refusals and non-200 statuses all mean "not detected"; this
/// function has no error path.
pub async fn detect_local_models(endpoint: &str) -> DetectedLocalModels {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.is_empty() {
        return DetectedLocalModels::default();
    }

    let client = match reqwest::Client::builder().timeout(DETECTION_TIMEOUT).build() {
        Ok(client) => client,
        Err(_) => return DetectedLocalModels::default(),
    };

    let url = format!("{}/api/tags", endpoint);
    let response = match client.get(&url).send().await {
        Ok(response) => response,
        Err(err) => {
            deck_log(
                DeckLogOption::Provider,
                DeckLogLevel::Debug,
                format!("Local model detection failed: {}", err).as_str(),
            );
            return DetectedLocalModels::default();
        }
    };

    if !response.status().is_success() {
        return DetectedLocalModels::default();
    }

    match response.json::<TagsResponse>().await {
        Ok(tags) => DetectedLocalModels {
            detected: true,
            models: tags.models.into_iter().map(|entry| entry.name).collect(),
        },
        Err(_) => DetectedLocalModels::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_endpoint_is_not_detected() {
        let result = detect_local_models("   ").await;
        assert!(!result.detected);
        assert!(result.models.is_empty());
    }
}
