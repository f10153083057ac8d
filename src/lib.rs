//! ragcrew - multi-agent retrieval-augmented question answering
//!
//! A question flows through a small crew of agents:
//! - retrieval: searches documents and re-ranks passages that mention the question's subject
//! - memory gate: remembers durable user facts in a separate collection
//! - analysis: answers directly or strictly grounded in retrieved context
//! - critique: asks the model to check grounded answers against their context

pub mod agents;
pub mod config;
pub mod index;
pub mod llm;
pub mod loader;
pub mod pipeline;
pub mod session;
pub mod types;

pub use agents::{AnalysisAgent, CritiqueAgent, MemoryGate, Orchestrator, RetrievalAgent};
pub use config::RagCrewConfig;
pub use index::{LocalIndex, PassageIndex};
pub use llm::{ChatClient, LanguageModel, MockModel};
pub use pipeline::RagPipeline;
pub use types::{
    AnalysisOutcome, AnswerMode, ConversationTurn, Passage, PassageMetadata, PipelineResponse,
    RetrievalOutcome, SearchResult,
};

/// Result type for ragcrew operations
pub type Result<T> = std::result::Result<T, RagCrewError>;

/// Errors that can occur in ragcrew
#[derive(Debug, thiserror::Error)]
pub enum RagCrewError {
    #[error("Question must not be empty")]
    EmptyQuestion,

    #[error("Index error: {0}")]
    Index(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Document loading error: {0}")]
    Loader(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}
