use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::agent_prototype::{AgentPrototype, OutputFormatConfig, SummarizationConfig, ToolDefinition};
use super::canvas_node::Position;
use super::capability::Capability;
use super::chat_message::ChatMessage;
use super::provider::ProviderKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskItem {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkItem {
    pub id: String,
    pub target_node_id: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorEntry {
    pub fn now(message: impl Into<String>) -> Self {
        ErrorEntry {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// The full configuration blob an instance owns: the prototype-shaped config
/// fields plus the four runtime fields that belong to the instance alone.
/// The runtime fields default to empty on deserialize so a save payload that
/// omits them still parses; the manager then force-restores the instance's
/// own values for them regardless of what the payload carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceConfiguration {
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
    // Runtime fields below. Never sourced from a configuration save payload.
    #[serde(default)]
    pub chat_log: Vec<ChatMessage>,
    #[serde(default)]
    pub error_log: Vec<ErrorEntry>,
    #[serde(default)]
    pub tasks: Vec<TaskItem>,
    #[serde(default)]
    pub links: Vec<LinkItem>,
}

impl InstanceConfiguration {
    /// Deep copy of the prototype's config-relevant fields, with empty
    /// runtime state.
    pub fn from_prototype(prototype: &AgentPrototype) -> Self {
        InstanceConfiguration {
            name: prototype.name.clone(),
            role: prototype.role.clone(),
            provider: prototype.provider,
            model: prototype.model.clone(),
            system_prompt: prototype.system_prompt.clone(),
            capabilities: prototype.capabilities.clone(),
            tools: prototype.tools.clone(),
            output_format: prototype.output_format.clone(),
            summarization: prototype.summarization.clone(),
            chat_log: Vec::new(),
            error_log: Vec::new(),
            tasks: Vec::new(),
            links: Vec::new(),
        }
    }
}

/// A deployed copy of a prototype. Owns its configuration outright; after
/// creation the only writes that reach it are writes addressed to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInstance {
    pub instance_id: String,
    pub prototype_id: String,
    pub name: String,
    pub position: Position,
    pub configuration: InstanceConfiguration,
}

impl AgentInstance {
    pub fn from_prototype(prototype: &AgentPrototype, position: Position, name_override: Option<String>) -> Self {
        let mut configuration = InstanceConfiguration::from_prototype(prototype);
        if let Some(name) = name_override {
            configuration.name = name;
        }
        AgentInstance {
            instance_id: Uuid::new_v4().to_string(),
            prototype_id: prototype.prototype_id.clone(),
            name: configuration.name.clone(),
            position,
            configuration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_clone_copies_prototype_fields() {
        let mut prototype = AgentPrototype::new("Weather Bot", ProviderKind::OpenAi, "gpt-4o-mini");
        prototype.system_prompt = "You forecast weather.".to_string();

        let instance = AgentInstance::from_prototype(&prototype, Position::new(4.0, 2.0), None);
        assert_eq!(instance.prototype_id, prototype.prototype_id);
        assert_eq!(instance.name, "Weather Bot");
        assert_eq!(instance.configuration.system_prompt, "You forecast weather.");
        assert!(instance.configuration.chat_log.is_empty());
    }

    #[test]
    fn test_instance_name_override() {
        let prototype = AgentPrototype::new("Weather Bot", ProviderKind::OpenAi, "gpt-4o-mini");
        let instance =
            AgentInstance::from_prototype(&prototype, Position::default(), Some("Fog Watcher".to_string()));
        assert_eq!(instance.name, "Fog Watcher");
        assert_eq!(instance.configuration.name, "Fog Watcher");
    }

    #[test]
    fn test_configuration_payload_without_runtime_fields_parses_empty() {
        let config: InstanceConfiguration = serde_json::from_str(
            "{\"name\":\"a\",\"provider\":\"groq\",\"model\":\"llama-3.3-70b-versatile\"}",
        )
        .unwrap();
        assert!(config.chat_log.is_empty());
        assert!(config.error_log.is_empty());
        assert!(config.tasks.is_empty());
        assert!(config.links.is_empty());
    }
}
