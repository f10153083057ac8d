//! Language model port
//!
//! Agents only see the [`LanguageModel`] trait. The chat client and the
//! offline mock are the two implementations shipped with the crate.

mod client;
mod mock;

pub use client::{ChatClient, ParsedResponse};
pub use mock::MockModel;

use crate::config::LlmSettings;
use crate::types::ConversationTurn;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// Capability to turn (question, context, history) into an answer.
///
/// Implementations must accept an empty context and an empty history. A
/// missing credential is reported as a readable answer string, not an error.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(
        &self,
        question: &str,
        context: &str,
        history: &[ConversationTurn],
    ) -> Result<String>;

    /// Model identifier for logs
    fn name(&self) -> &str;
}

/// Generate, substituting a readable degraded answer when the model call fails.
pub async fn generate_or_degrade(
    model: &dyn LanguageModel,
    question: &str,
    context: &str,
    history: &[ConversationTurn],
) -> String {
    match model.generate(question, context, history).await {
        Ok(answer) => answer,
        Err(e) => {
            warn!("Generation with {} failed: {}", model.name(), e);
            degraded_answer(&e.to_string())
        }
    }
}

/// Text substituted for an answer when generation fails
pub fn degraded_answer(reason: &str) -> String {
    format!("The language model is currently unavailable ({reason}). Please try again later.")
}

/// Build the model selected by the configuration
pub fn build_language_model(settings: &LlmSettings) -> Result<Arc<dyn LanguageModel>> {
    if settings.is_mock() {
        return Ok(Arc::new(MockModel::new()));
    }
    let provider = settings.provider()?;
    let client = ChatClient::new(
        &settings.provider_id,
        provider,
        &settings.model,
        settings.temperature,
    )?;
    Ok(Arc::new(client))
}
