//! One request/response cycle:
//! retrieve documents + search memory (concurrently) -> analyze -> critique

use super::{validate_question, AnalysisAgent, CritiqueAgent, RetrievalAgent};
use crate::index::PassageIndex;
use crate::llm::LanguageModel;
use crate::types::{ConversationTurn, PipelineResponse, SearchResult};
use crate::Result;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Orchestrator {
    retrieval: RetrievalAgent,
    analysis: AnalysisAgent,
    critique: CritiqueAgent,
    index: Arc<dyn PassageIndex>,
    k: usize,
}

impl Orchestrator {
    pub fn new(index: Arc<dyn PassageIndex>, model: Arc<dyn LanguageModel>, k: usize) -> Self {
        Self {
            retrieval: RetrievalAgent::new(index.clone(), k),
            analysis: AnalysisAgent::new(model.clone()),
            critique: CritiqueAgent::new(model),
            index,
            k,
        }
    }

    /// Answer `question` given the caller's history. The history is not
    /// modified; the response carries a copy with one turn appended.
    pub async fn answer(
        &self,
        question: &str,
        history: &[ConversationTurn],
    ) -> Result<PipelineResponse> {
        let question = validate_question(question)?;

        // Independent lookups; both must finish before analysis
        let (retrieval, mem_results) =
            tokio::join!(self.retrieval.retrieve(question), self.search_memory(question));
        let has_memory = !mem_results.is_empty();

        if retrieval.has_context && !retrieval.context_matches_query {
            info!("Retrieved documents do not mention the question's subject");
        }

        let analysis = self
            .analysis
            .analyze(
                question,
                retrieval.results,
                mem_results,
                retrieval.has_context,
                has_memory,
                history,
            )
            .await;

        let response = self.critique.critique(analysis).await;
        info!(
            "Answered in {} mode with {} context passages",
            response.mode,
            response.context.len()
        );
        Ok(response)
    }

    async fn search_memory(&self, question: &str) -> Vec<SearchResult> {
        match self.index.search_memory(question, self.k).await {
            Ok(results) => results,
            Err(e) => {
                warn!("Memory search failed, continuing without memory: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::NO_CRITIQUE;
    use crate::index::LocalIndex;
    use crate::llm::MockModel;
    use crate::types::{AnswerMode, Passage, PassageMetadata};
    use crate::RagCrewError;

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let orchestrator = Orchestrator::new(
            Arc::new(LocalIndex::in_memory()),
            Arc::new(MockModel::new()),
            5,
        );
        let result = orchestrator.answer("   ", &[]).await;
        assert!(matches!(result, Err(RagCrewError::EmptyQuestion)));
    }

    #[tokio::test]
    async fn test_direct_when_nothing_found() {
        let orchestrator = Orchestrator::new(
            Arc::new(LocalIndex::in_memory()),
            Arc::new(MockModel::new()),
            5,
        );
        let response = orchestrator.answer("Hello, how are you?", &[]).await.unwrap();
        assert_eq!(response.mode, AnswerMode::Direct);
        assert!(response.context.is_empty());
        assert_eq!(response.critique, NO_CRITIQUE);
        assert_eq!(response.history.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_hit_grounds_answer() {
        let index = Arc::new(LocalIndex::in_memory());
        index
            .store_memory("My cat is called Pixel", PassageMetadata::user_fact())
            .await
            .unwrap();
        index
            .replace_documents(vec![Passage {
                id: "x_0".to_string(),
                text: "Nothing relevant here".to_string(),
                metadata: PassageMetadata::document("x.txt", 0),
            }])
            .await
            .unwrap();

        let orchestrator = Orchestrator::new(index, Arc::new(MockModel::new()), 5);
        let response = orchestrator
            .answer("What is my cat called?", &[])
            .await
            .unwrap();

        assert_eq!(response.mode, AnswerMode::Grounded);
        assert_eq!(response.context.len(), 1);
        assert_eq!(response.context[0].passage.metadata.source, "memory");
        assert_ne!(response.critique, NO_CRITIQUE);
    }
}
