use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// One supported LLM vendor/backend. Serialized as its lowercase wire name
/// ("gemini", "openai", ...) so configs stay readable and stable across
/// releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    Claude,
    Mistral,
    Groq,
    DeepSeek,
    TogetherAi,
    OpenRouter,
    Xai,
    Ollama,
}

pub const ALL_PROVIDERS: [ProviderKind; 10] = [
    ProviderKind::Gemini,
    ProviderKind::OpenAi,
    ProviderKind::Claude,
    ProviderKind::Mistral,
    ProviderKind::Groq,
    ProviderKind::DeepSeek,
    ProviderKind::TogetherAi,
    ProviderKind::OpenRouter,
    ProviderKind::Xai,
    ProviderKind::Ollama,
];

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Claude => "claude",
            ProviderKind::Mistral => "mistral",
            ProviderKind::Groq => "groq",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::TogetherAi => "togetherai",
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::Xai => "xai",
            ProviderKind::Ollama => "ollama",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "Google Gemini",
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Claude => "Anthropic Claude",
            ProviderKind::Mistral => "Mistral",
            ProviderKind::Groq => "Groq",
            ProviderKind::DeepSeek => "DeepSeek",
            ProviderKind::TogetherAi => "Together AI",
            ProviderKind::OpenRouter => "OpenRouter",
            ProviderKind::Xai => "xAI Grok",
            ProviderKind::Ollama => "Ollama",
        }
    }

    /// Local-inference providers take an endpoint URL as their credential
    /// instead of an API key.
    pub fn is_local(&self) -> bool {
        matches!(self, ProviderKind::Ollama)
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini-2.0-flash",
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Claude => "claude-3-5-sonnet-latest",
            ProviderKind::Mistral => "mistral-small-latest",
            ProviderKind::Groq => "llama-3.3-70b-versatile",
            ProviderKind::DeepSeek => "deepseek-chat",
            ProviderKind::TogetherAi => "meta-llama/Llama-3.3-70B-Instruct-Turbo",
            ProviderKind::OpenRouter => "openrouter/auto",
            ProviderKind::Xai => "grok-2-latest",
            ProviderKind::Ollama => "llama3.1",
        }
    }

    /// Lenient parse for values read back from storage: unknown names fall
    /// back to the default provider instead of failing the whole load.
    pub fn parse_lossy(s: &str) -> ProviderKind {
        ProviderKind::from_str(s).unwrap_or_default()
    }
}

impl Default for ProviderKind {
    fn default() -> Self {
        ProviderKind::Gemini
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "openai" => Ok(ProviderKind::OpenAi),
            "claude" => Ok(ProviderKind::Claude),
            "mistral" => Ok(ProviderKind::Mistral),
            "groq" => Ok(ProviderKind::Groq),
            "deepseek" => Ok(ProviderKind::DeepSeek),
            "togetherai" => Ok(ProviderKind::TogetherAi),
            "openrouter" => Ok(ProviderKind::OpenRouter),
            "xai" => Ok(ProviderKind::Xai),
            "ollama" => Ok(ProviderKind::Ollama),
            _ => Err(()),
        }
    }
}

impl Serialize for ProviderKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

struct ProviderKindVisitor;

impl<'de> Visitor<'de> for ProviderKindVisitor {
    type Value = ProviderKind;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a string naming a supported provider")
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        ProviderKind::from_str(value).map_err(|_| {
            de::Error::unknown_variant(
                value,
                &[
                    "gemini",
                    "openai",
                    "claude",
                    "mistral",
                    "groq",
                    "deepseek",
                    "togetherai",
                    "openrouter",
                    "xai",
                    "ollama",
                ],
            )
        })
    }
}

impl<'de> Deserialize<'de> for ProviderKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(ProviderKindVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_provider_string_round_trip() {
        for provider in ALL_PROVIDERS {
            let encoded = serde_json::to_string(&provider).unwrap();
            let decoded: ProviderKind = serde_json::from_str(&encoded).unwrap();
            assert_eq!(decoded, provider);
        }
    }

    #[test]
    fn test_provider_unknown_variant_fails() {
        let result = serde_json::from_str::<ProviderKind>("\"watson\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_provider_parse_lossy_falls_back_to_default() {
        assert_eq!(ProviderKind::parse_lossy("openai"), ProviderKind::OpenAi);
        assert_eq!(ProviderKind::parse_lossy("watson"), ProviderKind::Gemini);
    }

    #[test]
    fn test_provider_usable_as_map_key() {
        let mut map = HashMap::new();
        map.insert(ProviderKind::Ollama, true);
        let encoded = serde_json::to_string(&map).unwrap();
        assert_eq!(encoded, "{\"ollama\":true}");
        let decoded: HashMap<ProviderKind, bool> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.get(&ProviderKind::Ollama), Some(&true));
    }
}
