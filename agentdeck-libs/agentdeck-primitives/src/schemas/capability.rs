use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of request capabilities. A capability gates both what the
/// builder UI offers for an agent and what the engine is willing to put in a
/// vendor request, so new entries require a matching row in the provider
/// capability table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Chat,
    TextCompletion,
    Streaming,
    FunctionCalling,
    StructuredOutput,
    CodeGeneration,
    ImageGeneration,
    ImageEditing,
    ImageAnalysis,
    WebSearch,
    MapGrounding,
    Thinking,
    HistorySummarization,
    Embeddings,
    AudioTranscription,
    AudioGeneration,
    VideoAnalysis,
    VideoGeneration,
    DocumentAnalysis,
    Translation,
}

pub const ALL_CAPABILITIES: [Capability; 20] = [
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
    Capability::AudioGeneration,
    Capability::VideoAnalysis,
    Capability::VideoGeneration,
    Capability::DocumentAnalysis,
    Capability::Translation,
];

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Chat => "chat",
            Capability::TextCompletion => "text_completion",
            Capability::Streaming => "streaming",
            Capability::FunctionCalling => "function_calling",
            Capability::StructuredOutput => "structured_output",
            Capability::CodeGeneration => "code_generation",
            Capability::ImageGeneration => "image_generation",
            Capability::ImageEditing => "image_editing",
            Capability::ImageAnalysis => "image_analysis",
            Capability::WebSearch => "web_search",
            Capability::MapGrounding => "map_grounding",
            Capability::Thinking => "thinking",
            Capability::HistorySummarization => "history_summarization",
            Capability::Embeddings => "embeddings",
            Capability::AudioTranscription => "audio_transcription",
            Capability::AudioGeneration => "audio_generation",
            Capability::VideoAnalysis => "video_analysis",
            Capability::VideoGeneration => "video_generation",
            Capability::DocumentAnalysis => "document_analysis",
            Capability::Translation => "translation",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_serde_matches_as_str() {
        for capability in ALL_CAPABILITIES {
            let encoded = serde_json::to_string(&capability).unwrap();
            assert_eq!(encoded, format!("\"{}\"", capability.as_str()));
            let decoded: Capability = serde_json::from_str(&encoded).unwrap();
            assert_eq!(decoded, capability);
        }
    }

    #[test]
    fn test_capability_set_is_closed() {
        assert!(serde_json::from_str::<Capability>("\"telepathy\"").is_err());
    }
}
