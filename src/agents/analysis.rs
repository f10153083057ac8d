//! Answer mode selection and grounded prompting

use super::context::ContextBuilder;
use crate::llm::{generate_or_degrade, LanguageModel};
use crate::types::{AnalysisOutcome, ConversationTurn, DirectAnswer, GroundedAnswer, SearchResult};
use std::sync::Arc;
use tracing::debug;

pub struct AnalysisAgent {
    model: Arc<dyn LanguageModel>,
}

impl AnalysisAgent {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Answer directly when there is neither document nor memory context,
    /// otherwise answer strictly from that context.
    pub async fn analyze(
        &self,
        question: &str,
        doc_results: Vec<SearchResult>,
        mem_results: Vec<SearchResult>,
        has_context: bool,
        has_memory: bool,
        history: &[ConversationTurn],
    ) -> AnalysisOutcome {
        if !has_context && !has_memory {
            debug!("Answering directly with {} history turns", history.len());
            let answer = generate_or_degrade(self.model.as_ref(), question, "", history).await;
            return AnalysisOutcome::Direct(DirectAnswer {
                question: question.to_string(),
                history: Self::append_turn(history, question, &answer),
                answer,
            });
        }

        let context = ContextBuilder::new(&doc_results)
            .with_memories(&mem_results)
            .for_grounded_answer();
        let grounded_history = Self::grounded_history(history);
        debug!(
            "Answering grounded: {} documents, {} memories, context length {}",
            doc_results.len(),
            mem_results.len(),
            context.len()
        );

        let answer =
            generate_or_degrade(self.model.as_ref(), question, &context, &grounded_history).await;

        let mut combined = doc_results;
        combined.extend(mem_results);

        AnalysisOutcome::Grounded(GroundedAnswer {
            question: question.to_string(),
            history: Self::append_turn(history, question, &answer),
            answer,
            context: combined,
        })
    }

    /// User-only copy of the history, so earlier (possibly ungrounded)
    /// answers cannot leak into a grounded one.
    pub fn grounded_history(history: &[ConversationTurn]) -> Vec<ConversationTurn> {
        history
            .iter()
            .filter(|turn| !turn.user.is_empty())
            .map(|turn| ConversationTurn::user_only(turn.user.clone()))
            .collect()
    }

    fn append_turn(
        history: &[ConversationTurn],
        question: &str,
        answer: &str,
    ) -> Vec<ConversationTurn> {
        let mut updated = history.to_vec();
        updated.push(ConversationTurn::new(question, answer));
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::REFUSAL_SENTENCE;
    use crate::types::{AnswerMode, Passage, PassageMetadata};
    use crate::Result;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Records every call and answers with a fixed string
    #[derive(Default)]
    struct RecordingModel {
        calls: Mutex<Vec<(String, String, Vec<ConversationTurn>)>>,
    }

    #[async_trait]
    impl LanguageModel for RecordingModel {
        async fn generate(
            &self,
            question: &str,
            context: &str,
            history: &[ConversationTurn],
        ) -> Result<String> {
            self.calls.lock().unwrap().push((
                question.to_string(),
                context.to_string(),
                history.to_vec(),
            ));
            Ok("recorded answer".to_string())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn result(text: &str) -> SearchResult {
        SearchResult::new(
            Passage {
                id: text.to_string(),
                text: text.to_string(),
                metadata: PassageMetadata::document("d.txt", 0),
            },
            None,
        )
    }

    fn history() -> Vec<ConversationTurn> {
        vec![
            ConversationTurn::new("Hi", "Hello! Paris is lovely."),
            ConversationTurn::new("Thanks", "Anytime."),
        ]
    }

    #[tokio::test]
    async fn test_direct_uses_full_history() {
        let model = Arc::new(RecordingModel::default());
        let agent = AnalysisAgent::new(model.clone());
        let input = history();

        let outcome = agent
            .analyze("How are you?", vec![], vec![], false, false, &input)
            .await;

        assert_eq!(outcome.mode(), AnswerMode::Direct);
        assert!(outcome.context().is_empty());
        let calls = model.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, "");
        assert_eq!(calls[0].2, input);
        assert_eq!(outcome.history().len(), 3);
        assert_eq!(
            outcome.history()[2],
            ConversationTurn::new("How are you?", "recorded answer")
        );
    }

    #[tokio::test]
    async fn test_grounded_hides_prior_answers() {
        let model = Arc::new(RecordingModel::default());
        let agent = AnalysisAgent::new(model.clone());
        let input = history();

        let outcome = agent
            .analyze(
                "Who is Ada?",
                vec![result("Ada Lovelace was a mathematician")],
                vec![],
                true,
                false,
                &input,
            )
            .await;

        assert_eq!(outcome.mode(), AnswerMode::Grounded);
        let calls = model.calls.lock().unwrap();
        let (_, context, seen_history) = &calls[0];
        assert!(context.contains("do not contain this information"));
        assert!(context.contains(REFUSAL_SENTENCE));
        assert!(context.contains("DOCUMENT CONTEXT:\nAda Lovelace was a mathematician"));
        assert_eq!(seen_history.len(), 2);
        assert!(seen_history.iter().all(|t| !t.has_assistant()));

        // The returned history keeps the real assistant turns
        assert_eq!(&outcome.history()[..2], &input[..]);
        assert_eq!(outcome.history()[2].assistant, "recorded answer");
    }

    #[tokio::test]
    async fn test_grounded_context_orders_documents_then_memory() {
        let model = Arc::new(RecordingModel::default());
        let agent = AnalysisAgent::new(model);

        let outcome = agent
            .analyze(
                "Where do I live?",
                vec![result("doc one")],
                vec![result("I live in Lisbon")],
                true,
                true,
                &[],
            )
            .await;

        let texts: Vec<&str> = outcome.context().iter().map(|r| r.text()).collect();
        assert_eq!(texts, vec!["doc one", "I live in Lisbon"]);
    }

    #[tokio::test]
    async fn test_memory_alone_triggers_grounding() {
        let model = Arc::new(RecordingModel::default());
        let agent = AnalysisAgent::new(model.clone());

        let outcome = agent
            .analyze(
                "Where do I live?",
                vec![],
                vec![result("I live in Lisbon")],
                false,
                true,
                &[],
            )
            .await;

        assert_eq!(outcome.mode(), AnswerMode::Grounded);
        let calls = model.calls.lock().unwrap();
        assert!(calls[0].1.contains("MEMORY CONTEXT:"));
        assert!(!calls[0].1.contains("DOCUMENT CONTEXT:"));
    }

    #[test]
    fn test_grounded_history_drops_empty_user_turns() {
        let input = vec![
            ConversationTurn::new("", "orphan answer"),
            ConversationTurn::new("q", "a"),
        ];
        assert_eq!(
            AnalysisAgent::grounded_history(&input),
            vec![ConversationTurn::user_only("q")]
        );
    }
}
