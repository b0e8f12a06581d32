use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::capability::Capability;
use super::provider::{ProviderKind, ALL_PROVIDERS};

/// Marker the account API uses in update payloads for "keep the stored
/// secret". An empty credential in an update means "delete the secret".
/// The marker is compared, never persisted.
pub const CREDENTIAL_MASK: &str = "********";

pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434";

/// Per-provider configuration: whether the provider may be used at all, the
/// credential (API key, or endpoint URL for local inference), and per
/// capability permission toggles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub enabled: bool,
    #[serde(default)]
    pub credential: String,
    #[serde(default)]
    pub permissions: HashMap<Capability, bool>,
}

impl ProviderSettings {
    pub fn disabled() -> Self {
        ProviderSettings {
            enabled: false,
            credential: String::new(),
            permissions: HashMap::new(),
        }
    }

    /// Capability toggle lookup. Capabilities the user never touched stay
    /// permitted; the provider support table is the authority on whether the
    /// capability exists for the vendor at all.
    pub fn is_permitted(&self, capability: Capability) -> bool {
        self.permissions.get(&capability).copied().unwrap_or(true)
    }

    pub fn has_credential(&self) -> bool {
        !self.credential.trim().is_empty()
    }

    /// Copy suitable for display or for an account update that does not
    /// change the secret: a non-empty credential is replaced by the mask.
    pub fn masked(&self) -> ProviderSettings {
        let mut masked = self.clone();
        if masked.has_credential() {
            masked.credential = CREDENTIAL_MASK.to_string();
        }
        masked
    }
}

pub type ProviderSettingsMap = HashMap<ProviderKind, ProviderSettings>;

/// Hardcoded defaults used when storage is missing or unreadable: every
/// provider present and disabled, with the local provider pre-pointed at the
/// conventional endpoint.
pub fn default_settings_map() -> ProviderSettingsMap {
    let mut map = HashMap::new();
    for provider in ALL_PROVIDERS {
        let mut settings = ProviderSettings::disabled();
        if provider.is_local() {
            settings.credential = DEFAULT_OLLAMA_ENDPOINT.to_string();
        }
        map.insert(provider, settings);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_map_covers_every_provider() {
        let map = default_settings_map();
        assert_eq!(map.len(), ALL_PROVIDERS.len());
        for provider in ALL_PROVIDERS {
            let settings = map.get(&provider).unwrap();
            assert!(!settings.enabled);
        }
        assert_eq!(
            map.get(&ProviderKind::Ollama).unwrap().credential,
            DEFAULT_OLLAMA_ENDPOINT
        );
    }

    #[test]
    fn test_masked_replaces_only_non_empty_credentials() {
        let mut settings = ProviderSettings::disabled();
        assert_eq!(settings.masked().credential, "");

        settings.credential = "sk-live-1234".to_string();
        assert_eq!(settings.masked().credential, CREDENTIAL_MASK);
    }

    #[test]
    fn test_unconfigured_capability_is_permitted() {
        let mut settings = ProviderSettings::disabled();
        assert!(settings.is_permitted(Capability::Chat));
        settings.permissions.insert(Capability::Chat, false);
        assert!(!settings.is_permitted(Capability::Chat));
    }
}
