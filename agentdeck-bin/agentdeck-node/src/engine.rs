use std::sync::Arc;

use agentdeck_primitives::deck_utils::deck_logging::{deck_log, DeckLogLevel, DeckLogOption};
use agentdeck_primitives::schemas::agent_instance::AgentInstance;
use agentdeck_primitives::schemas::capability::Capability;
use agentdeck_primitives::schemas::chat_message::ChatMessage;
use agentdeck_primitives::schemas::preferences::Preferences;
use agentdeck_primitives::schemas::provider_settings::{default_settings_map, ProviderSettingsMap};
use tokio::sync::RwLock;

use crate::llm_provider::dispatcher::ProviderDispatcher;
use crate::llm_provider::providers::LlmRequest;
use crate::managers::agent_manager::{AgentManager, AgentManagerError};
use crate::managers::capability_manager::ProviderCapabilitiesManager;
use crate::managers::local_detection::{detect_local_models, DetectedLocalModels};
use crate::managers::summarizer;
use crate::state::auth::AuthSession;
use crate::state::design_state::DesignState;
use crate::state::runtime_state::RuntimeState;
use crate::storage::account_client::AccountClient;
use crate::storage::device_store::DeviceStore;
use crate::storage::StorageError;

/// The engine behind the builder UI: design/runtime state, the provider
/// dispatcher, and the storage clients for both security contexts.
pub struct DeckEngine {
    design: Arc<RwLock<DesignState>>,
    runtime: RuntimeState,
    dispatcher: ProviderDispatcher,
    device_store: DeviceStore,
    account_client: AccountClient,
    auth: RwLock<AuthSession>,
}

impl DeckEngine {
    /// Boots in guest mode with settings and preferences loaded from the
    /// device store. Corrupt or missing storage falls back to defaults and
    /// never blocks startup.
    pub async fn initialize(device_store: DeviceStore, account_client: AccountClient) -> Self {
        let mut design = DesignState::default();
        design.provider_settings = device_store.load_provider_settings();
        design.preferences = device_store.load_preferences();

        deck_log(DeckLogOption::Node, DeckLogLevel::Info, "Engine initialized in guest mode");
        DeckEngine {
            design: Arc::new(RwLock::new(design)),
            runtime: RuntimeState::new(),
            dispatcher: ProviderDispatcher::new(),
            device_store,
            account_client,
            auth: RwLock::new(AuthSession::Guest),
        }
    }

    pub fn agent_manager(&self) -> AgentManager {
        AgentManager::new(Arc::clone(&self.design))
    }

    pub fn runtime(&self) -> &RuntimeState {
        &self.runtime
    }

    pub fn dispatcher(&self) -> &ProviderDispatcher {
        &self.dispatcher
    }

    pub async fn auth_session(&self) -> AuthSession {
        self.auth.read().await.clone()
    }

    pub async fn provider_settings(&self) -> ProviderSettingsMap {
        self.design.read().await.provider_settings.clone()
    }

    pub async fn preferences(&self) -> Preferences {
        self.design.read().await.preferences.clone()
    }

    /// Loads settings and preferences from the source matching the given
    /// session. Account fetch failures degrade to defaults: the transition
    /// must complete either way, and stale guest data must not survive it.
    async fn load_for_auth_state(&self, session: &AuthSession) -> (ProviderSettingsMap, Preferences) {
        match session {
            AuthSession::Guest => (
                self.device_store.load_provider_settings(),
                self.device_store.load_preferences(),
            ),
            AuthSession::Account { bearer, .. } => {
                let settings = match self.account_client.fetch_provider_settings(bearer).await {
                    Ok(settings) => settings,
                    Err(err) => {
                        deck_log(
                            DeckLogOption::Auth,
                            DeckLogLevel::Error,
                            format!("Account settings fetch failed, using defaults: {}", err).as_str(),
                        );
                        default_settings_map()
                    }
                };
                let preferences = match self.account_client.fetch_preferences(bearer).await {
                    Ok(preferences) => preferences,
                    Err(_) => Preferences::default(),
                };
                (settings, preferences)
            }
        }
    }

    /// Auth state changed. The whole in-memory world is discarded and
    /// rebuilt from the new context's source, unconditionally: no diffing,
    /// no merging, no skip path. This is what keeps guest secrets and
    /// account secrets from ever meeting.
    pub async fn handle_auth_transition(&self, new_session: AuthSession) {
        {
            let mut auth = self.auth.write().await;
            *auth = new_session.clone();
        }

        let (settings, preferences) = self.load_for_auth_state(&new_session).await;

        {
            let mut design = self.design.write().await;
            design.clear_workspace();
            design.provider_settings = settings;
            design.preferences = preferences;
        }
        self.runtime.clear();

        deck_log(
            DeckLogOption::Auth,
            DeckLogLevel::Info,
            format!(
                "Auth transition complete, authenticated: {}",
                new_session.is_authenticated()
            )
            .as_str(),
        );
    }

    /// Replaces the in-memory settings and persists them to the source for
    /// the current auth context.
    pub async fn update_provider_settings(&self, settings: ProviderSettingsMap) -> Result<(), StorageError> {
        let session = self.auth_session().await;
        match &session {
            AuthSession::Guest => self.device_store.save_provider_settings(&settings)?,
            AuthSession::Account { bearer, .. } => {
                self.account_client.save_provider_settings(bearer, &settings).await?
            }
        }
        self.design.write().await.provider_settings = settings;
        Ok(())
    }

    /// Probes the configured local-inference endpoint. Failure shapes into
    /// "not detected", never an error.
    pub async fn detect_local_models(&self) -> DetectedLocalModels {
        let endpoint = {
            let design = self.design.read().await;
            design
                .provider_settings
                .get(&agentdeck_primitives::schemas::provider::ProviderKind::Ollama)
                .map(|settings| settings.credential.clone())
                .unwrap_or_default()
        };
        detect_local_models(&endpoint).await
    }

    /// One chat turn against the node's instance. The user message is
    /// appended first; the agent (or error) message is appended only after
    /// the vendor call settles, which is what keeps per-node conversations
    /// in append order.
    pub async fn send_chat_message(&self, node_id: &str, text: &str) -> Result<ChatMessage, AgentManagerError> {
        if !self.runtime.begin_request(node_id) {
            return Err(AgentManagerError::NodeBusy(node_id.to_string()));
        }
        let result = self.run_chat_turn(node_id, text).await;
        self.runtime.finish_request(node_id);
        result
    }

    async fn run_chat_turn(&self, node_id: &str, text: &str) -> Result<ChatMessage, AgentManagerError> {
        let manager = self.agent_manager();
        let node = manager
            .get_canvas_node(node_id)
            .await
            .ok_or_else(|| AgentManagerError::NodeNotFound(node_id.to_string()))?;

        let user_message = ChatMessage::user(text);
        manager
            .append_chat_message(&node.instance_id, user_message)
            .await?;

        // Snapshot everything the request needs; settings are read-only for
        // the duration of the call.
        let (instance, settings) = {
            let design = self.design.read().await;
            let instance = design
                .instances
                .get(&node.instance_id)
                .cloned()
                .ok_or_else(|| AgentManagerError::InstanceNotFound(node.instance_id.clone()))?;
            (instance, design.provider_settings.clone())
        };

        let agent_message = match self.run_inference(&instance, &settings).await {
            Ok(message) => message,
            Err(error_text) => {
                manager.append_error(&node.instance_id, &error_text).await?;
                ChatMessage::agent_error(error_text)
            }
        };
        manager
            .append_chat_message(&node.instance_id, agent_message.clone())
            .await?;

        self.compact_history_if_needed(&manager, &node.instance_id).await?;
        Ok(agent_message)
    }

    /// Runs the actual vendor call. Returns the reply message on success and
    /// the renderable error text otherwise; nothing here throws past the
    /// dispatcher.
    async fn run_inference(
        &self,
        instance: &AgentInstance,
        settings: &ProviderSettingsMap,
    ) -> Result<ChatMessage, String> {
        let config = &instance.configuration;
        let provider = config.provider;

        ProviderCapabilitiesManager::ensure_permitted(settings, provider, Capability::Chat)
            .map_err(|err| err.to_string())?;

        let credential = settings
            .get(&provider)
            .map(|provider_settings| provider_settings.credential.clone())
            .unwrap_or_default();

        let mut request = LlmRequest::new(credential, config.model.clone());
        if !config.system_prompt.is_empty() {
            request.system_instruction = Some(config.system_prompt.clone());
        }
        request.history = config.chat_log.clone();
        request.tools = config.tools.clone();
        request.output_format = Some(config.output_format.clone());

        let use_search = config.capabilities.contains(&Capability::WebSearch)
            && ProviderCapabilitiesManager::ensure_permitted(settings, provider, Capability::WebSearch).is_ok();

        let result = if use_search {
            self.dispatcher.generate_content_with_search(provider, &request).await
        } else {
            self.dispatcher.generate_content(provider, &request).await
        };

        if let Some(error) = result.error {
            return Err(error);
        }

        let mut message = ChatMessage::agent(result.text.unwrap_or_default());
        message.thinking = result.thinking;
        message.citations = result.citations;
        Ok(message)
    }

    async fn compact_history_if_needed(
        &self,
        manager: &AgentManager,
        instance_id: &str,
    ) -> Result<(), AgentManagerError> {
        let (summarization, chat_log, settings) = {
            let design = self.design.read().await;
            let instance = match design.instances.get(instance_id) {
                Some(instance) => instance,
                None => return Ok(()),
            };
            (
                instance.configuration.summarization.clone(),
                instance.configuration.chat_log.clone(),
                design.provider_settings.clone(),
            )
        };

        if let Some(compacted) =
            summarizer::maybe_summarize(&self.dispatcher, &settings, &summarization, &chat_log).await
        {
            manager.replace_chat_log(instance_id, compacted).await?;
        }
        Ok(())
    }
}
