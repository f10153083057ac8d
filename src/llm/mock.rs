//! Offline model used when no provider is configured

use super::LanguageModel;
use crate::types::ConversationTurn;
use crate::Result;
use async_trait::async_trait;

/// Deterministic stand-in that echoes what it was given
#[derive(Debug, Default, Clone)]
pub struct MockModel;

impl MockModel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn generate(
        &self,
        question: &str,
        context: &str,
        history: &[ConversationTurn],
    ) -> Result<String> {
        let history_str = history
            .iter()
            .map(|turn| {
                if turn.has_assistant() {
                    format!("User: {}\nAssistant: {}", turn.user, turn.assistant)
                } else {
                    format!("User: {}", turn.user)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        let history_str = if history_str.is_empty() {
            "(no history)".to_string()
        } else {
            history_str
        };

        Ok(format!(
            "[MOCK ANSWER]\nConversation so far:\n{}\n\nQuestion: {}\nContext word count: {}\n(Configure a model provider to get real answers.)",
            history_str,
            question,
            context.split_whitespace().count()
        ))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
