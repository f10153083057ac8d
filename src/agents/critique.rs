//! Self-critique of grounded answers

use super::context::{ContextBuilder, NO_CRITIQUE};
use crate::llm::{generate_or_degrade, LanguageModel};
use crate::types::{AnalysisOutcome, AnswerMode, CritiqueOutcome};
use std::sync::Arc;
use tracing::debug;

pub struct CritiqueAgent {
    model: Arc<dyn LanguageModel>,
}

impl CritiqueAgent {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Grounded answers are reviewed against the exact context they were
    /// built from; direct answers pass through with a fixed note.
    pub async fn critique(&self, outcome: AnalysisOutcome) -> CritiqueOutcome {
        match outcome {
            AnalysisOutcome::Direct(direct) => CritiqueOutcome {
                question: direct.question,
                answer: direct.answer,
                critique: NO_CRITIQUE.to_string(),
                context: Vec::new(),
                mode: AnswerMode::Direct,
                history: direct.history,
            },
            AnalysisOutcome::Grounded(grounded) => {
                let question = ContextBuilder::critique_question(&grounded.answer);
                let context = ContextBuilder::new(&grounded.context).for_critique();
                debug!("Critiquing grounded answer against {} passages", grounded.context.len());

                // Critique is a meta-task: the full history is fine here
                let critique = generate_or_degrade(
                    self.model.as_ref(),
                    &question,
                    &context,
                    &grounded.history,
                )
                .await;

                CritiqueOutcome {
                    question: grounded.question,
                    answer: grounded.answer,
                    critique,
                    context: grounded.context,
                    mode: AnswerMode::Grounded,
                    history: grounded.history,
                }
            }
        }
    }
}
