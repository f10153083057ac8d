//! Process-wide pipeline context
//!
//! Built once at startup and shared by whatever frontend drives it. Owns the
//! index and model handles and wires them into the agent crew.

use crate::agents::{validate_question, MemoryGate, Orchestrator};
use crate::config::RagCrewConfig;
use crate::index::{LocalIndex, PassageIndex};
use crate::llm::{build_language_model, LanguageModel};
use crate::loader::DocumentLoader;
use crate::types::{ConversationTurn, PipelineResponse};
use crate::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub struct RagPipeline {
    config: RagCrewConfig,
    index: Arc<dyn PassageIndex>,
    model: Arc<dyn LanguageModel>,
    orchestrator: Orchestrator,
    memory_gate: MemoryGate,
}

impl RagPipeline {
    /// Open the on-disk index and build the configured model
    pub async fn open(config: RagCrewConfig) -> Result<Self> {
        config.validate()?;
        let index: Arc<dyn PassageIndex> = Arc::new(LocalIndex::open(&config.data_dir).await?);
        let model = build_language_model(&config.llm)?;
        Ok(Self::with_components(config, index, model))
    }

    /// Assemble a pipeline from already-built collaborators
    pub fn with_components(
        config: RagCrewConfig,
        index: Arc<dyn PassageIndex>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        info!(
            "Pipeline ready: model={}, top_k={}",
            model.name(),
            config.top_k
        );
        Self {
            orchestrator: Orchestrator::new(index.clone(), model.clone(), config.top_k),
            memory_gate: MemoryGate::new(index.clone()),
            config,
            index,
            model,
        }
    }

    pub fn config(&self) -> &RagCrewConfig {
        &self.config
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Top-level entry point for frontends.
    ///
    /// The memory gate runs alongside the orchestrator: a fact stated in this
    /// question may or may not be visible to this question's memory search,
    /// but it is stored by the time this returns.
    pub async fn answer_question(
        &self,
        question: &str,
        history: &[ConversationTurn],
    ) -> Result<PipelineResponse> {
        let question = validate_question(question)?;

        let (_, response) = tokio::join!(
            self.memory_gate.remember_if_fact(question),
            self.orchestrator.answer(question, history)
        );
        response
    }

    /// Reload every document from the docs directory; returns the chunk count
    pub async fn reindex_documents(&self) -> Result<usize> {
        let passages = self.loader()?.load().await?;
        self.index.replace_documents(passages).await
    }

    /// Copy files into the docs directory and reindex; returns the chunk count
    pub async fn import_documents(&self, files: &[PathBuf]) -> Result<usize> {
        let copied = self.loader()?.import(files).await?;
        info!("Imported {} files", copied);
        self.reindex_documents().await
    }

    /// Persist index state before exit
    pub async fn shutdown(&self) -> Result<()> {
        self.index.flush().await
    }

    fn loader(&self) -> Result<DocumentLoader> {
        DocumentLoader::new(
            self.config.docs_dir.clone(),
            self.config.chunk_size,
            self.config.chunk_overlap,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockModel;
    use crate::types::AnswerMode;
    use tempfile::TempDir;

    async fn pipeline(temp_dir: &TempDir) -> RagPipeline {
        let config = RagCrewConfig::new(temp_dir.path().to_path_buf()).with_chunking(50, 5);
        RagPipeline::open(config).await.unwrap()
    }

    #[tokio::test]
    async fn test_open_uses_mock_by_default() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(&temp_dir).await;
        assert_eq!(pipeline.model_name(), "mock");
    }

    #[tokio::test]
    async fn test_reindex_then_grounded_answer() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(&temp_dir).await;
        let docs = &pipeline.config().docs_dir;
        std::fs::create_dir_all(docs).unwrap();
        std::fs::write(docs.join("ada.txt"), "Ada Lovelace was a mathematician").unwrap();

        assert_eq!(pipeline.reindex_documents().await.unwrap(), 1);

        let response = pipeline.answer_question("Who is Ada?", &[]).await.unwrap();
        assert_eq!(response.mode, AnswerMode::Grounded);
        assert_eq!(response.context[0].passage.id, "ada.txt_0");
    }

    #[tokio::test]
    async fn test_fact_is_remembered_for_later_questions() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(&temp_dir).await;

        let first = pipeline
            .answer_question("I love sailing on weekends", &[])
            .await
            .unwrap();
        assert_eq!(first.history.len(), 1);

        let second = pipeline
            .answer_question("What do I do on weekends?", &first.history)
            .await
            .unwrap();
        assert_eq!(second.mode, AnswerMode::Grounded);
        assert_eq!(second.context[0].text(), "I love sailing on weekends");
        assert_eq!(second.history.len(), 2);
        // Caller's history is untouched
        assert_eq!(first.history.len(), 1);
    }

    #[tokio::test]
    async fn test_import_documents() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(&temp_dir).await;
        let upload = temp_dir.path().join("upload.txt");
        std::fs::write(&upload, "Grace Hopper wrote compilers").unwrap();

        let chunks = pipeline.import_documents(&[upload]).await.unwrap();
        assert_eq!(chunks, 1);
        pipeline.shutdown().await.unwrap();
        assert!(pipeline.config().data_dir.join("documents.jsonl").exists());
    }
}
