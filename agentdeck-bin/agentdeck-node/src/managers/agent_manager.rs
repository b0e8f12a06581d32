use std::fmt;
use std::sync::Arc;

use agentdeck_primitives::deck_utils::deck_logging::{deck_log, DeckLogLevel, DeckLogOption};
use agentdeck_primitives::schemas::agent_instance::{AgentInstance, ErrorEntry, InstanceConfiguration};
use agentdeck_primitives::schemas::agent_prototype::{AgentPrototype, PrototypePatch, SchemaValidationError};
use agentdeck_primitives::schemas::canvas_node::{CanvasNode, Position};
use agentdeck_primitives::schemas::chat_message::ChatMessage;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::state::design_state::DesignState;

#[derive(Debug)]
pub enum AgentManagerError {
    PrototypeNotFound(String),
    InstanceNotFound(String),
    NodeNotFound(String),
    MessageNotFound(String),
    NodeBusy(String),
    InvalidToolSchema(SchemaValidationError),
}

impl fmt::Display for AgentManagerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AgentManagerError::PrototypeNotFound(id) => write!(f, "Prototype not found: {}", id),
            AgentManagerError::InstanceNotFound(id) => write!(f, "Instance not found: {}", id),
            AgentManagerError::NodeNotFound(id) => write!(f, "Canvas node not found: {}", id),
            AgentManagerError::MessageNotFound(id) => write!(f, "Chat message not found: {}", id),
            AgentManagerError::NodeBusy(id) => write!(f, "Node already has a request in flight: {}", id),
            AgentManagerError::InvalidToolSchema(err) => write!(f, "Invalid tool schema: {}", err),
        }
    }
}

impl std::error::Error for AgentManagerError {}

impl From<SchemaValidationError> for AgentManagerError {
    fn from(err: SchemaValidationError) -> Self {
        AgentManagerError::InvalidToolSchema(err)
    }
}

/// How many deployed copies a prototype edit will *not* touch. Counts only
/// instances present on the canvas; storage orphans are excluded.
#[derive(Debug, Clone, PartialEq)]
pub struct PrototypeImpact {
    pub prototype_id: String,
    pub instance_count: usize,
    pub instance_ids: Vec<String>,
}

/// CRUD over prototypes, instances and canvas nodes, enforcing the
/// non-affectation rule between templates and their deployed copies.
#[derive(Clone)]
pub struct AgentManager {
    design: Arc<RwLock<DesignState>>,
}

impl AgentManager {
    pub fn new(design: Arc<RwLock<DesignState>>) -> Self {
        AgentManager { design }
    }

    pub async fn create_prototype(&self, prototype: AgentPrototype) -> Result<AgentPrototype, AgentManagerError> {
        prototype.validate()?;
        let mut design = self.design.write().await;
        design
            .prototypes
            .insert(prototype.prototype_id.clone(), prototype.clone());
        deck_log(
            DeckLogOption::Agents,
            DeckLogLevel::Info,
            format!("Created prototype {}", prototype.prototype_id).as_str(),
        );
        Ok(prototype)
    }

    pub async fn get_prototype(&self, prototype_id: &str) -> Option<AgentPrototype> {
        self.design.read().await.prototypes.get(prototype_id).cloned()
    }

    pub async fn list_prototypes(&self) -> Vec<AgentPrototype> {
        let design = self.design.read().await;
        let mut prototypes: Vec<AgentPrototype> = design.prototypes.values().cloned().collect();
        prototypes.sort_by(|a, b| a.name.cmp(&b.name));
        prototypes
    }

    /// Applies the patch to the prototype record and nothing else. Instances
    /// cloned from this prototype are deliberately left untouched, whatever
    /// the patch contains.
    pub async fn update_prototype(
        &self,
        prototype_id: &str,
        patch: PrototypePatch,
    ) -> Result<AgentPrototype, AgentManagerError> {
        if let Some(tools) = &patch.tools {
            for tool in tools {
                tool.validate()?;
            }
        }
        let mut design = self.design.write().await;
        let prototype = design
            .prototypes
            .get_mut(prototype_id)
            .ok_or_else(|| AgentManagerError::PrototypeNotFound(prototype_id.to_string()))?;
        prototype.apply_patch(patch);
        Ok(prototype.clone())
    }

    /// Removes the prototype and cascades to every instance and canvas node
    /// referencing it.
    pub async fn delete_prototype(&self, prototype_id: &str) -> Result<(), AgentManagerError> {
        let mut design = self.design.write().await;
        if design.prototypes.remove(prototype_id).is_none() {
            return Err(AgentManagerError::PrototypeNotFound(prototype_id.to_string()));
        }

        let doomed_instances: Vec<String> = design
            .instances
            .values()
            .filter(|instance| instance.prototype_id == prototype_id)
            .map(|instance| instance.instance_id.clone())
            .collect();
        for instance_id in &doomed_instances {
            design.instances.remove(instance_id);
        }
        design
            .canvas_nodes
            .retain(|_, node| !doomed_instances.contains(&node.instance_id));

        deck_log(
            DeckLogOption::Agents,
            DeckLogLevel::Info,
            format!(
                "Deleted prototype {} and {} instances",
                prototype_id,
                doomed_instances.len()
            )
            .as_str(),
        );
        Ok(())
    }

    /// Clones the prototype's config fields into a fresh instance and places
    /// it on the canvas. The clone is deep: later edits on either side stay
    /// on their side.
    pub async fn create_instance(
        &self,
        prototype_id: &str,
        position: Position,
        name_override: Option<String>,
    ) -> Result<(AgentInstance, CanvasNode), AgentManagerError> {
        let mut design = self.design.write().await;
        let prototype = design
            .prototypes
            .get(prototype_id)
            .ok_or_else(|| AgentManagerError::PrototypeNotFound(prototype_id.to_string()))?;

        let instance = AgentInstance::from_prototype(prototype, position, name_override);
        let node = CanvasNode {
            node_id: Uuid::new_v4().to_string(),
            instance_id: instance.instance_id.clone(),
            position,
        };
        design.instances.insert(instance.instance_id.clone(), instance.clone());
        design.canvas_nodes.insert(node.node_id.clone(), node.clone());
        Ok((instance, node))
    }

    pub async fn get_instance(&self, instance_id: &str) -> Option<AgentInstance> {
        self.design.read().await.instances.get(instance_id).cloned()
    }

    pub async fn get_canvas_node(&self, node_id: &str) -> Option<CanvasNode> {
        self.design.read().await.canvas_nodes.get(node_id).cloned()
    }

    /// Last-writer-wins replacement of the instance's configuration, except
    /// for the four runtime fields, which are force-restored from the
    /// instance's own pre-call values. Whatever the payload carried for them
    /// is discarded.
    pub async fn update_instance_config(
        &self,
        instance_id: &str,
        new_config: InstanceConfiguration,
    ) -> Result<AgentInstance, AgentManagerError> {
        for tool in &new_config.tools {
            tool.validate()?;
        }
        let mut design = self.design.write().await;
        let instance = design
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| AgentManagerError::InstanceNotFound(instance_id.to_string()))?;

        let mut config = new_config;
        config.chat_log = instance.configuration.chat_log.clone();
        config.error_log = instance.configuration.error_log.clone();
        config.tasks = instance.configuration.tasks.clone();
        config.links = instance.configuration.links.clone();

        instance.name = config.name.clone();
        instance.configuration = config;
        Ok(instance.clone())
    }

    pub async fn delete_instance(&self, instance_id: &str) -> Result<(), AgentManagerError> {
        let mut design = self.design.write().await;
        if design.instances.remove(instance_id).is_none() {
            return Err(AgentManagerError::InstanceNotFound(instance_id.to_string()));
        }
        design.canvas_nodes.retain(|_, node| node.instance_id != instance_id);
        Ok(())
    }

    /// Detaches a node from the canvas without deleting its instance,
    /// leaving the instance as a storage orphan.
    pub async fn remove_canvas_node(&self, node_id: &str) -> Result<(), AgentManagerError> {
        let mut design = self.design.write().await;
        design
            .canvas_nodes
            .remove(node_id)
            .map(|_| ())
            .ok_or_else(|| AgentManagerError::NodeNotFound(node_id.to_string()))
    }

    pub async fn prototype_impact(&self, prototype_id: &str) -> Result<PrototypeImpact, AgentManagerError> {
        let design = self.design.read().await;
        if !design.prototypes.contains_key(prototype_id) {
            return Err(AgentManagerError::PrototypeNotFound(prototype_id.to_string()));
        }

        let on_canvas = design.instance_ids_on_canvas();
        let mut instance_ids: Vec<String> = design
            .instances
            .values()
            .filter(|instance| instance.prototype_id == prototype_id && on_canvas.contains(&instance.instance_id))
            .map(|instance| instance.instance_id.clone())
            .collect();
        instance_ids.sort();

        Ok(PrototypeImpact {
            prototype_id: prototype_id.to_string(),
            instance_count: instance_ids.len(),
            instance_ids,
        })
    }

    /// Appends to the instance's conversation. Config fields are untouched;
    /// callers append agent replies only after the request has settled.
    pub async fn append_chat_message(
        &self,
        instance_id: &str,
        message: ChatMessage,
    ) -> Result<(), AgentManagerError> {
        let mut design = self.design.write().await;
        let instance = design
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| AgentManagerError::InstanceNotFound(instance_id.to_string()))?;
        instance.configuration.chat_log.push(message);
        Ok(())
    }

    pub async fn replace_chat_log(
        &self,
        instance_id: &str,
        chat_log: Vec<ChatMessage>,
    ) -> Result<(), AgentManagerError> {
        let mut design = self.design.write().await;
        let instance = design
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| AgentManagerError::InstanceNotFound(instance_id.to_string()))?;
        instance.configuration.chat_log = chat_log;
        Ok(())
    }

    pub async fn append_error(&self, instance_id: &str, message: &str) -> Result<(), AgentManagerError> {
        let mut design = self.design.write().await;
        let instance = design
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| AgentManagerError::InstanceNotFound(instance_id.to_string()))?;
        instance.configuration.error_log.push(ErrorEntry::now(message));
        Ok(())
    }

    /// The one permitted post-append mutation of a chat message.
    pub async fn mark_message_error(&self, instance_id: &str, message_id: &str) -> Result<(), AgentManagerError> {
        let mut design = self.design.write().await;
        let instance = design
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| AgentManagerError::InstanceNotFound(instance_id.to_string()))?;
        let message = instance
            .configuration
            .chat_log
            .iter_mut()
            .find(|message| message.id == message_id)
            .ok_or_else(|| AgentManagerError::MessageNotFound(message_id.to_string()))?;
        message.is_error = true;
        Ok(())
    }
}
