pub mod agent_instance;
pub mod agent_prototype;
pub mod canvas_node;
pub mod capability;
pub mod chat_message;
pub mod preferences;
pub mod provider;
pub mod provider_settings;
