use agentdeck_primitives::schemas::capability::Capability;
use agentdeck_primitives::schemas::provider::ProviderKind;
use agentdeck_primitives::schemas::provider_settings::ProviderSettingsMap;

use crate::llm_provider::error::LlmProviderError;
use crate::llm_provider::providers::LlmOperation;

/// Closed per-provider capability table. The rows mirror what the vendor
/// clients actually implement; a capability absent here is refused before a
/// request is ever built, so UI visibility and request construction can't
/// drift apart.
pub struct ProviderCapabilitiesManager;

impl ProviderCapabilitiesManager {
    pub fn provider_capabilities(provider: ProviderKind) -> Vec<Capability> {
        match provider {
            ProviderKind::Gemini => vec![
                Capability::Chat,
                Capability::TextCompletion,
                Capability::Streaming,
                Capability::FunctionCalling,
                Capability::StructuredOutput,
                Capability::CodeGeneration,
                Capability::ImageGeneration,
                Capability::ImageEditing,
                Capability::ImageAnalysis,
                Capability::WebSearch,
                Capability::MapGrounding,
                Capability::Thinking,
                Capability::HistorySummarization,
                Capability::Embeddings,
                Capability::AudioTranscription,
                Capability::VideoAnalysis,
                Capability::DocumentAnalysis,
                Capability::Translation,
            ],
            ProviderKind::OpenAi => vec![
                Capability::Chat,
                Capability::TextCompletion,
                Capability::Streaming,
                Capability::FunctionCalling,
                Capability::StructuredOutput,
                Capability::CodeGeneration,
                Capability::ImageGeneration,
                Capability::ImageEditing,
                Capability::ImageAnalysis,
                Capability::Thinking,
                Capability::HistorySummarization,
                Capability::Embeddings,
                Capability::AudioTranscription,
                Capability::AudioGeneration,
                Capability::Translation,
            ],
            ProviderKind::Claude => vec![
                Capability::Chat,
                Capability::TextCompletion,
                Capability::Streaming,
                Capability::FunctionCalling,
                Capability::StructuredOutput,
                Capability::CodeGeneration,
                Capability::ImageAnalysis,
                Capability::Thinking,
                Capability::HistorySummarization,
                Capability::DocumentAnalysis,
                Capability::Translation,
            ],
            ProviderKind::Mistral => vec![
                Capability::Chat,
                Capability::TextCompletion,
                Capability::Streaming,
                Capability::FunctionCalling,
                Capability::StructuredOutput,
                Capability::CodeGeneration,
                Capability::HistorySummarization,
                Capability::Embeddings,
                Capability::Translation,
            ],
            ProviderKind::Groq => vec![
                Capability::Chat,
                Capability::TextCompletion,
                Capability::Streaming,
                Capability::FunctionCalling,
                Capability::StructuredOutput,
                Capability::CodeGeneration,
                Capability::HistorySummarization,
                Capability::AudioTranscription,
                Capability::Translation,
            ],
            ProviderKind::DeepSeek => vec![
                Capability::Chat,
                Capability::TextCompletion,
                Capability::Streaming,
                Capability::FunctionCalling,
                Capability::StructuredOutput,
                Capability::CodeGeneration,
                Capability::Thinking,
                Capability::HistorySummarization,
                Capability::Translation,
            ],
            ProviderKind::TogetherAi => vec![
                Capability::Chat,
                Capability::TextCompletion,
                Capability::Streaming,
                Capability::FunctionCalling,
                Capability::StructuredOutput,
                Capability::CodeGeneration,
                Capability::HistorySummarization,
                Capability::Embeddings,
                Capability::Translation,
            ],
            ProviderKind::OpenRouter => vec![
                Capability::Chat,
                Capability::TextCompletion,
                Capability::Streaming,
                Capability::FunctionCalling,
                Capability::StructuredOutput,
                Capability::CodeGeneration,
                Capability::ImageAnalysis,
                Capability::Thinking,
                Capability::HistorySummarization,
                Capability::Translation,
            ],
            ProviderKind::Xai => vec![
                Capability::Chat,
                Capability::TextCompletion,
                Capability::Streaming,
                Capability::FunctionCalling,
                Capability::StructuredOutput,
                Capability::CodeGeneration,
                Capability::ImageAnalysis,
                Capability::WebSearch,
                Capability::Thinking,
                Capability::HistorySummarization,
                Capability::Translation,
            ],
            ProviderKind::Ollama => vec![
                Capability::Chat,
                Capability::TextCompletion,
                Capability::Streaming,
                Capability::CodeGeneration,
                Capability::ImageAnalysis,
                Capability::HistorySummarization,
                Capability::Embeddings,
                Capability::Translation,
            ],
        }
    }

    pub fn supports(provider: ProviderKind, capability: Capability) -> bool {
        Self::provider_capabilities(provider).contains(&capability)
    }

    /// The capability flag an operation needs before the dispatcher is
    /// allowed to build a request for it.
    pub fn operation_capability(operation: LlmOperation) -> Capability {
        match operation {
            LlmOperation::GenerateContent => Capability::Chat,
            LlmOperation::GenerateContentStream => Capability::Streaming,
            LlmOperation::GenerateContentWithSearch => Capability::WebSearch,
            LlmOperation::GenerateImage => Capability::ImageGeneration,
            LlmOperation::EditImage => Capability::ImageEditing,
        }
    }

    /// Settings-aware gate: provider enabled, capability supported by the
    /// vendor, and not toggled off by the user.
    pub fn ensure_permitted(
        settings: &ProviderSettingsMap,
        provider: ProviderKind,
        capability: Capability,
    ) -> Result<(), LlmProviderError> {
        let provider_settings = settings
            .get(&provider)
            .ok_or(LlmProviderError::ProviderDisabled(provider))?;
        if !provider_settings.enabled {
            return Err(LlmProviderError::ProviderDisabled(provider));
        }
        if !Self::supports(provider, capability) || !provider_settings.is_permitted(capability) {
            return Err(LlmProviderError::CapabilityNotPermitted { provider, capability });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentdeck_primitives::schemas::provider::ALL_PROVIDERS;
    use agentdeck_primitives::schemas::provider_settings::{default_settings_map, ProviderSettings};

    #[test]
    fn test_every_provider_can_chat_and_stream() {
        for provider in ALL_PROVIDERS {
            assert!(ProviderCapabilitiesManager::supports(provider, Capability::Chat));
            assert!(ProviderCapabilitiesManager::supports(provider, Capability::Streaming));
        }
    }

    #[test]
    fn test_image_editing_is_limited_to_image_vendors() {
        assert!(ProviderCapabilitiesManager::supports(ProviderKind::OpenAi, Capability::ImageEditing));
        assert!(ProviderCapabilitiesManager::supports(ProviderKind::Gemini, Capability::ImageEditing));
        assert!(!ProviderCapabilitiesManager::supports(ProviderKind::Groq, Capability::ImageEditing));
        assert!(!ProviderCapabilitiesManager::supports(ProviderKind::Ollama, Capability::ImageEditing));
    }

    #[test]
    fn test_map_grounding_is_gemini_only() {
        for provider in ALL_PROVIDERS {
            let expected = provider == ProviderKind::Gemini;
            assert_eq!(
                ProviderCapabilitiesManager::supports(provider, Capability::MapGrounding),
                expected
            );
        }
    }

    #[test]
    fn test_operations_map_to_their_gate_capability() {
        assert_eq!(
            ProviderCapabilitiesManager::operation_capability(LlmOperation::GenerateContentStream),
            Capability::Streaming
        );
        assert_eq!(
            ProviderCapabilitiesManager::operation_capability(LlmOperation::EditImage),
            Capability::ImageEditing
        );
    }

    #[test]
    fn test_disabled_provider_is_refused() {
        let settings = default_settings_map();
        let result = ProviderCapabilitiesManager::ensure_permitted(&settings, ProviderKind::Gemini, Capability::Chat);
        assert!(matches!(result, Err(LlmProviderError::ProviderDisabled(ProviderKind::Gemini))));
    }

    #[test]
    fn test_user_toggle_overrides_supported_capability() {
        let mut settings = default_settings_map();
        let gemini = settings.get_mut(&ProviderKind::Gemini).unwrap();
        gemini.enabled = true;
        gemini.permissions.insert(Capability::WebSearch, false);

        assert!(
            ProviderCapabilitiesManager::ensure_permitted(&settings, ProviderKind::Gemini, Capability::Chat).is_ok()
        );
        assert!(matches!(
            ProviderCapabilitiesManager::ensure_permitted(&settings, ProviderKind::Gemini, Capability::WebSearch),
            Err(LlmProviderError::CapabilityNotPermitted { .. })
        ));
    }

    #[test]
    fn test_unsupported_capability_refused_even_when_enabled() {
        let mut settings = ProviderSettingsMap::new();
        settings.insert(
            ProviderKind::Groq,
            ProviderSettings {
                enabled: true,
                credential: "gsk-test".to_string(),
                permissions: Default::default(),
            },
        );
        assert!(matches!(
            ProviderCapabilitiesManager::ensure_permitted(&settings, ProviderKind::Groq, Capability::ImageGeneration),
            Err(LlmProviderError::CapabilityNotPermitted { .. })
        ));
    }
}
