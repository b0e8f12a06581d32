use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use agentdeck_primitives::deck_utils::deck_logging::{deck_log, DeckLogLevel, DeckLogOption};
use agentdeck_primitives::schemas::preferences::Preferences;
use agentdeck_primitives::schemas::provider_settings::{default_settings_map, ProviderSettingsMap};
use serde_json::Value as JsonValue;

use super::StorageError;

/// Fixed keys under which guest-mode state is stored.
pub mod keys {
    pub const PROVIDER_SETTINGS: &str = "agentdeck.provider_settings";
    pub const PREFERENCES: &str = "agentdeck.preferences";
}

/// Guest-mode storage: one local JSON file holding values under fixed keys.
/// Reads are synchronous and never fail outward; missing or corrupt data
/// falls back to hardcoded defaults so startup cannot be blocked by a bad
/// file.
pub struct DeviceStore {
    path: PathBuf,
}

impl DeviceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DeviceStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> HashMap<String, JsonValue> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return HashMap::new(),
        };
        match serde_json::from_str(&raw) {
            Ok(map) => map,
            Err(err) => {
                deck_log(
                    DeckLogOption::Storage,
                    DeckLogLevel::Error,
                    format!("Device store is corrupt, using defaults: {}", err).as_str(),
                );
                HashMap::new()
            }
        }
    }

    /// Reads one key. `None` covers the missing-file, missing-key and
    /// corrupt-value cases alike.
    pub fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let map = self.read_all();
        let value = map.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                deck_log(
                    DeckLogOption::Storage,
                    DeckLogLevel::Error,
                    format!("Value under {} is corrupt, using defaults: {}", key, err).as_str(),
                );
                None
            }
        }
    }

    /// Writes one key, preserving every other key in the file.
    pub fn set<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let mut map = self.read_all();
        map.insert(key.to_string(), serde_json::to_value(value)?);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&map)?)?;
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let mut map = self.read_all();
        let removed = map.remove(key).is_some();
        if removed {
            fs::write(&self.path, serde_json::to_string_pretty(&map)?)?;
        }
        Ok(removed)
    }

    pub fn load_provider_settings(&self) -> ProviderSettingsMap {
        self.get(keys::PROVIDER_SETTINGS).unwrap_or_else(default_settings_map)
    }

    pub fn save_provider_settings(&self, settings: &ProviderSettingsMap) -> Result<(), StorageError> {
        self.set(keys::PROVIDER_SETTINGS, settings)
    }

    pub fn load_preferences(&self) -> Preferences {
        self.get(keys::PREFERENCES).unwrap_or_default()
    }

    pub fn save_preferences(&self, preferences: &Preferences) -> Result<(), StorageError> {
        self.set(keys::PREFERENCES, preferences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentdeck_primitives::schemas::capability::Capability;
    use agentdeck_primitives::schemas::provider::ProviderKind;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> DeviceStore {
        DeviceStore::new(dir.path().join("device_store.json"))
    }

    #[test]
    fn test_get_set_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.set("test.value", &42u32).unwrap();
        assert_eq!(store.get::<u32>("test.value"), Some(42));
        assert_eq!(store.get::<u32>("test.other"), None);

        store.set("test.value", &7u32).unwrap();
        assert_eq!(store.get::<u32>("test.value"), Some(7));

        assert!(store.delete("test.value").unwrap());
        assert!(!store.delete("test.value").unwrap());
    }

    #[test]
    fn test_set_preserves_other_keys() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.set("a", &"first").unwrap();
        store.set("b", &"second").unwrap();
        assert_eq!(store.get::<String>("a").as_deref(), Some("first"));
        assert_eq!(store.get::<String>("b").as_deref(), Some("second"));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let settings = store.load_provider_settings();
        assert_eq!(settings, default_settings_map());
        assert_eq!(store.load_preferences(), Preferences::default());
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("device_store.json");
        fs::write(&path, "{not json at all").unwrap();

        let store = DeviceStore::new(&path);
        assert_eq!(store.load_provider_settings(), default_settings_map());

        // Writing after corruption starts a fresh file rather than failing.
        store.set("test.value", &1u32).unwrap();
        assert_eq!(store.get::<u32>("test.value"), Some(1));
    }

    #[test]
    fn test_provider_settings_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut settings = default_settings_map();
        let gemini = settings.get_mut(&ProviderKind::Gemini).unwrap();
        gemini.enabled = true;
        gemini.credential = "AIza-test".to_string();
        gemini.permissions.insert(Capability::WebSearch, false);

        store.save_provider_settings(&settings).unwrap();
        assert_eq!(store.load_provider_settings(), settings);
    }
}
