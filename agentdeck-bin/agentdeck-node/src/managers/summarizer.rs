use agentdeck_primitives::deck_utils::deck_logging::{deck_log, DeckLogLevel, DeckLogOption};
use agentdeck_primitives::schemas::agent_prototype::{SummarizationConfig, SummaryUnit};
use agentdeck_primitives::schemas::chat_message::{ChatMessage, MessageSender};
use agentdeck_primitives::schemas::provider_settings::ProviderSettingsMap;

use crate::llm_provider::dispatcher::ProviderDispatcher;
use crate::llm_provider::providers::LlmRequest;

/// Number of most-recent messages kept verbatim when older history is folded
/// into a synthetic summary message.
const KEEP_RECENT_MESSAGES: usize = 6;

const SUMMARY_SYSTEM_PROMPT: &str =
    "You compress chat transcripts. Summarize the conversation so far into a short paragraph \
     that preserves facts, decisions and open questions. Reply with the summary only.";

/// Measures a conversation in the unit the summarization config is keyed by.
/// Tokens are estimated; this drives a threshold, not billing.
pub fn measure(unit: SummaryUnit, messages: &[ChatMessage]) -> usize {
    match unit {
        SummaryUnit::Messages => messages.len(),
        SummaryUnit::Characters => messages.iter().map(|message| message.text.chars().count()).sum(),
        SummaryUnit::Words => messages
            .iter()
            .map(|message| message.text.split_whitespace().count())
            .sum(),
        SummaryUnit::Tokens => {
            let characters: usize = messages.iter().map(|message| message.text.chars().count()).sum();
            characters / 4
        }
        SummaryUnit::Sentences => messages
            .iter()
            .map(|message| {
                message
                    .text
                    .chars()
                    .filter(|c| matches!(c, '.' | '!' | '?'))
                    .count()
                    .max(1)
            })
            .sum(),
    }
}

pub fn is_over_limit(config: &SummarizationConfig, messages: &[ChatMessage]) -> bool {
    config.enabled && measure(config.unit, messages) > config.limit as usize
}

fn transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|message| {
            let speaker = match message.sender {
                MessageSender::User => "User",
                MessageSender::Agent => "Agent",
            };
            format!("{}: {}", speaker, message.text)
        })
        .collect::<Vec<String>>()
        .join("\n")
}

/// Compacts an over-limit conversation through the synthesis provider/model.
/// Returns the replacement log, or `None` when the conversation is under the
/// limit, too short to fold, or the synthesis call failed (the original log
/// is then left as is).
pub async fn maybe_summarize(
    dispatcher: &ProviderDispatcher,
    settings: &ProviderSettingsMap,
    config: &SummarizationConfig,
    chat_log: &[ChatMessage],
) -> Option<Vec<ChatMessage>> {
    if !is_over_limit(config, chat_log) {
        return None;
    }
    if chat_log.len() <= KEEP_RECENT_MESSAGES {
        return None;
    }

    let credential = settings
        .get(&config.provider)
        .filter(|provider_settings| provider_settings.enabled)
        .map(|provider_settings| provider_settings.credential.clone())?;

    let split = chat_log.len() - KEEP_RECENT_MESSAGES;
    let (older, recent) = chat_log.split_at(split);

    let mut request = LlmRequest::new(credential, config.model.clone());
    request.system_instruction = Some(SUMMARY_SYSTEM_PROMPT.to_string());
    request.history = vec![ChatMessage::user(transcript(older))];

    let result = dispatcher.generate_content(config.provider, &request).await;
    if let Some(error) = result.error {
        deck_log(
            DeckLogOption::Agents,
            DeckLogLevel::Error,
            format!("History summarization failed: {}", error).as_str(),
        );
        return None;
    }

    let summary_text = result.text.unwrap_or_default();
    if summary_text.is_empty() {
        return None;
    }

    let mut replacement = Vec::with_capacity(recent.len() + 1);
    replacement.push(ChatMessage::agent(format!(
        "Summary of earlier conversation: {}",
        summary_text
    )));
    replacement.extend_from_slice(recent);
    Some(replacement)
}
