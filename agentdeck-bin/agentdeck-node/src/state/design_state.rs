use std::collections::{HashMap, HashSet};

use agentdeck_primitives::schemas::agent_instance::AgentInstance;
use agentdeck_primitives::schemas::agent_prototype::AgentPrototype;
use agentdeck_primitives::schemas::canvas_node::CanvasNode;
use agentdeck_primitives::schemas::preferences::Preferences;
use agentdeck_primitives::schemas::provider_settings::ProviderSettingsMap;

/// Session-scoped store: everything the user designed (prototypes, deployed
/// instances, canvas placement) plus the provider settings and preferences
/// loaded for the current auth context. Runtime request tracking lives in
/// `RuntimeState`, not here.
#[derive(Debug, Default)]
pub struct DesignState {
    pub prototypes: HashMap<String, AgentPrototype>,
    pub instances: HashMap<String, AgentInstance>,
    pub canvas_nodes: HashMap<String, CanvasNode>,
    pub provider_settings: ProviderSettingsMap,
    pub preferences: Preferences,
}

impl DesignState {
    /// Drops the designed workspace. Settings and preferences are replaced
    /// separately because they come from storage, not from the user session.
    pub fn clear_workspace(&mut self) {
        self.prototypes.clear();
        self.instances.clear();
        self.canvas_nodes.clear();
    }

    pub fn is_workspace_empty(&self) -> bool {
        self.prototypes.is_empty() && self.instances.is_empty() && self.canvas_nodes.is_empty()
    }

    /// Instance ids that are actually placed on the canvas. Instances missing
    /// from this set are storage orphans.
    pub fn instance_ids_on_canvas(&self) -> HashSet<String> {
        self.canvas_nodes
            .values()
            .map(|node| node.instance_id.clone())
            .collect()
    }
}
