use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSender {
    User,
    Agent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub mime_type: String,
    pub data_base64: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationSource {
    Web,
    Map,
}

/// A grounding citation attached to an agent reply, e.g. from a
/// search-grounded generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub source: CitationSource,
    pub uri: String,
    #[serde(default)]
    pub title: String,
}

/// One entry of a node conversation. Conversations are append-only; the only
/// post-append mutation the engine performs is flipping `is_error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender: MessageSender,
    pub text: String,
    #[serde(default)]
    pub image: Option<ImagePayload>,
    #[serde(default)]
    pub thinking: Option<String>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        ChatMessage {
            id: Uuid::new_v4().to_string(),
            sender: MessageSender::User,
            text: text.into(),
            image: None,
            thinking: None,
            is_error: false,
            citations: Vec::new(),
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        ChatMessage {
            id: Uuid::new_v4().to_string(),
            sender: MessageSender::Agent,
            text: text.into(),
            image: None,
            thinking: None,
            is_error: false,
            citations: Vec::new(),
        }
    }

    pub fn agent_error(text: impl Into<String>) -> Self {
        ChatMessage {
            is_error: true,
            ..ChatMessage::agent(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_defaults_deserialize() {
        let message: ChatMessage = serde_json::from_str(
            "{\"id\":\"m1\",\"sender\":\"user\",\"text\":\"hello\"}",
        )
        .unwrap();
        assert_eq!(message.sender, MessageSender::User);
        assert!(message.image.is_none());
        assert!(!message.is_error);
        assert!(message.citations.is_empty());
    }

    #[test]
    fn test_agent_error_constructor_sets_flag() {
        let message = ChatMessage::agent_error("boom");
        assert_eq!(message.sender, MessageSender::Agent);
        assert!(message.is_error);
    }
}
