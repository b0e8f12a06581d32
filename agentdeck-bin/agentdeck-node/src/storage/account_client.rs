use agentdeck_primitives::schemas::preferences::Preferences;
use agentdeck_primitives::schemas::provider_settings::{ProviderSettingsMap, CREDENTIAL_MASK};
use reqwest::Client;

use super::StorageError;

/// REST client for the authenticated account store. Every call carries the
/// session's bearer credential.
///
/// Credential update convention on the settings route: a credential equal to
/// [`CREDENTIAL_MASK`] means "keep the stored secret, update the other
/// fields"; an empty credential means "delete the stored secret". The server
/// interprets the marker; this client only guarantees it never leaks a real
/// secret when the caller asked for a no-change save.
pub struct AccountClient {
    base_url: String,
    client: Client,
}

impl AccountClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        AccountClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub async fn fetch_provider_settings(&self, bearer: &str) -> Result<ProviderSettingsMap, StorageError> {
        let url = format!("{}/v1/provider-settings", self.base_url);
        let res = self.client.get(&url).bearer_auth(bearer).send().await?;
        if !res.status().is_success() {
            return Err(StorageError::UnexpectedStatus(res.status().as_u16()));
        }
        Ok(res.json().await?)
    }

    pub async fn save_provider_settings(
        &self,
        bearer: &str,
        settings: &ProviderSettingsMap,
    ) -> Result<(), StorageError> {
        let url = format!("{}/v1/provider-settings", self.base_url);
        let res = self
            .client
            .put(&url)
            .bearer_auth(bearer)
            .json(settings)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(StorageError::UnexpectedStatus(res.status().as_u16()));
        }
        Ok(())
    }

    pub async fn fetch_preferences(&self, bearer: &str) -> Result<Preferences, StorageError> {
        let url = format!("{}/v1/preferences", self.base_url);
        let res = self.client.get(&url).bearer_auth(bearer).send().await?;
        if !res.status().is_success() {
            return Err(StorageError::UnexpectedStatus(res.status().as_u16()));
        }
        Ok(res.json().await?)
    }

    pub async fn save_preferences(&self, bearer: &str, preferences: &Preferences) -> Result<(), StorageError> {
        let url = format!("{}/v1/preferences", self.base_url);
        let res = self
            .client
            .put(&url)
            .bearer_auth(bearer)
            .json(preferences)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(StorageError::UnexpectedStatus(res.status().as_u16()));
        }
        Ok(())
    }
}

/// Builds the settings payload for a save that changes everything except the
/// secrets: every stored credential is replaced by the mask marker so the
/// server keeps what it has.
pub fn masked_update(settings: &ProviderSettingsMap) -> ProviderSettingsMap {
    settings
        .iter()
        .map(|(provider, provider_settings)| (*provider, provider_settings.masked()))
        .collect()
}

/// True when a credential field of an update payload asks the server to keep
/// the existing secret.
pub fn keeps_existing_secret(credential: &str) -> bool {
    credential.contains(CREDENTIAL_MASK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentdeck_primitives::schemas::provider::ProviderKind;
    use agentdeck_primitives::schemas::provider_settings::default_settings_map;

    #[test]
    fn test_masked_update_hides_every_secret() {
        let mut settings = default_settings_map();
        settings.get_mut(&ProviderKind::OpenAi).unwrap().credential = "sk-live-1234".to_string();

        let payload = masked_update(&settings);
        let openai = payload.get(&ProviderKind::OpenAi).unwrap();
        assert_eq!(openai.credential, CREDENTIAL_MASK);
        assert!(keeps_existing_secret(&openai.credential));

        // Empty credentials stay empty: that is the delete request.
        let groq = payload.get(&ProviderKind::Groq).unwrap();
        assert_eq!(groq.credential, "");
        assert!(!keeps_existing_secret(&groq.credential));
    }

    #[test]
    fn test_base_url_trailing_slash_is_normalized() {
        let client = AccountClient::new("https://accounts.example.com/");
        assert_eq!(client.base_url, "https://accounts.example.com");
    }
}
