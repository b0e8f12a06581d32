use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveMode {
    Local,
    Account,
}

/// User preferences carried beside the provider settings. Reloaded, never
/// merged, on auth transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub locale: String,
    pub save_mode: SaveMode,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            locale: "en".to_string(),
            save_mode: SaveMode::Local,
        }
    }
}
