use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use super::capability::Capability;
use super::provider::ProviderKind;

/// A tool the agent may call. Parameter and output schemas are free-form JSON
/// so the builder form can hold whatever shape the vendor expects; they are
/// validated to be objects before a prototype is saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_schema")]
    pub parameter_schema: JsonValue,
    #[serde(default = "empty_schema")]
    pub output_schema: JsonValue,
}

fn empty_schema() -> JsonValue {
    serde_json::json!({})
}

#[derive(Debug, Error, PartialEq)]
pub enum SchemaValidationError {
    #[error("tool name must not be empty")]
    EmptyToolName,
    #[error("parameter schema for tool `{0}` must be a JSON object")]
    ParameterSchemaNotAnObject(String),
    #[error("output schema for tool `{0}` must be a JSON object")]
    OutputSchemaNotAnObject(String),
}

impl ToolDefinition {
    pub fn validate(&self) -> Result<(), SchemaValidationError> {
        if self.name.trim().is_empty() {
            return Err(SchemaValidationError::EmptyToolName);
        }
        if !self.parameter_schema.is_object() {
            return Err(SchemaValidationError::ParameterSchemaNotAnObject(
                self.name.clone(),
            ));
        }
        if !self.output_schema.is_object() {
            return Err(SchemaValidationError::OutputSchemaNotAnObject(self.name.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Json,
    Xml,
    Yaml,
    Markdown,
    Code,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputFormatConfig {
    pub enabled: bool,
    pub format: OutputFormat,
    /// Only meaningful for `OutputFormat::Code`.
    #[serde(default)]
    pub language: Option<String>,
}

impl Default for OutputFormatConfig {
    fn default() -> Self {
        OutputFormatConfig {
            enabled: false,
            format: OutputFormat::Json,
            language: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryUnit {
    Characters,
    Words,
    Tokens,
    Sentences,
    Messages,
}

/// History-summarization settings. When enabled, conversations exceeding
/// `limit` (measured in `unit`) are compacted through the synthesis
/// provider/model, which may differ from the agent's own provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarizationConfig {
    pub enabled: bool,
    pub provider: ProviderKind,
    pub model: String,
    pub unit: SummaryUnit,
    pub limit: u32,
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        let provider = ProviderKind::default();
        SummarizationConfig {
            enabled: false,
            provider,
            model: provider.default_model().to_string(),
            unit: SummaryUnit::Messages,
            limit: 30,
        }
    }
}

/// A reusable agent template. Instances are cloned from it at placement time
/// and never written back by prototype edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPrototype {
    pub prototype_id: String,
    pub name: String,
    #[serde(default)]
    pub role: String,
    pub provider: ProviderKind,
    pub model: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    #[serde(default)]
    pub output_format: OutputFormatConfig,
    #[serde(default)]
    pub summarization: SummarizationConfig,
}

impl AgentPrototype {
    pub fn new(name: impl Into<String>, provider: ProviderKind, model: impl Into<String>) -> Self {
        AgentPrototype {
            prototype_id: Uuid::new_v4().to_string(),
            name: name.into(),
            role: String::new(),
            provider,
            model: model.into(),
            system_prompt: String::new(),
            capabilities: vec![Capability::Chat],
            tools: Vec::new(),
            output_format: OutputFormatConfig::default(),
            summarization: SummarizationConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<(), SchemaValidationError> {
        for tool in &self.tools {
            tool.validate()?;
        }
        Ok(())
    }
}

/// Partial update applied to a prototype record, and only to the prototype
/// record. Fields left `None` keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrototypePatch {
    pub name: Option<String>,
    pub role: Option<String>,
    pub provider: Option<ProviderKind>,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub capabilities: Option<Vec<Capability>>,
    pub tools: Option<Vec<ToolDefinition>>,
    pub output_format: Option<OutputFormatConfig>,
    pub summarization: Option<SummarizationConfig>,
}

impl PrototypePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.role.is_none()
            && self.provider.is_none()
            && self.model.is_none()
            && self.system_prompt.is_none()
            && self.capabilities.is_none()
            && self.tools.is_none()
            && self.output_format.is_none()
            && self.summarization.is_none()
    }
}

impl AgentPrototype {
    pub fn apply_patch(&mut self, patch: PrototypePatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(provider) = patch.provider {
            self.provider = provider;
        }
        if let Some(model) = patch.model {
            self.model = model;
        }
        if let Some(system_prompt) = patch.system_prompt {
            self.system_prompt = system_prompt;
        }
        if let Some(capabilities) = patch.capabilities {
            self.capabilities = capabilities;
        }
        if let Some(tools) = patch.tools {
            self.tools = tools;
        }
        if let Some(output_format) = patch.output_format {
            self.output_format = output_format;
        }
        if let Some(summarization) = patch.summarization {
            self.summarization = summarization;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prototype_deserialize_with_defaults() {
        let json_data = json!({
            "prototype_id": "p1",
            "name": "Weather Bot",
            "provider": "gemini",
            "model": "gemini-2.0-flash"
        });

        let prototype: AgentPrototype = serde_json::from_value(json_data).unwrap();
        assert_eq!(prototype.name, "Weather Bot");
        assert_eq!(prototype.provider, ProviderKind::Gemini);
        assert!(prototype.tools.is_empty());
        assert!(!prototype.output_format.enabled);
        assert!(!prototype.summarization.enabled);
    }

    #[test]
    fn test_tool_validation_rejects_non_object_schema() {
        let tool = ToolDefinition {
            name: "get_weather".to_string(),
            description: String::new(),
            parameter_schema: json!(["not", "an", "object"]),
            output_schema: json!({}),
        };
        assert_eq!(
            tool.validate(),
            Err(SchemaValidationError::ParameterSchemaNotAnObject(
                "get_weather".to_string()
            ))
        );
    }

    #[test]
    fn test_tool_validation_rejects_empty_name() {
        let tool = ToolDefinition {
            name: "  ".to_string(),
            description: String::new(),
            parameter_schema: json!({}),
            output_schema: json!({}),
        };
        assert_eq!(tool.validate(), Err(SchemaValidationError::EmptyToolName));
    }

    #[test]
    fn test_patch_only_touches_named_fields() {
        let mut prototype = AgentPrototype::new("Weather Bot", ProviderKind::Gemini, "gemini-2.0-flash");
        let original_model = prototype.model.clone();

        prototype.apply_patch(PrototypePatch {
            name: Some("Weather Bot v2".to_string()),
            ..PrototypePatch::default()
        });

        assert_eq!(prototype.name, "Weather Bot v2");
        assert_eq!(prototype.model, original_model);
    }

    #[test]
    fn test_empty_patch_detection() {
        assert!(PrototypePatch::default().is_empty());
        let patch = PrototypePatch {
            model: Some("gemini-2.5-pro".to_string()),
            ..PrototypePatch::default()
        };
        assert!(!patch.is_empty());
    }
}
