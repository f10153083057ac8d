//! The agent crew
//!
//! Each agent owns one decision of the request cycle; the [`Orchestrator`]
//! sequences them.

mod analysis;
mod context;
mod critique;
mod memory_gate;
mod orchestrator;
mod retrieval;

pub use analysis::AnalysisAgent;
pub use context::{
    ContextBuilder, DOCUMENT_HEADER, GROUNDING_INSTRUCTION, MEMORY_HEADER, NO_CRITIQUE,
    PASSAGE_SEPARATOR, REFUSAL_SENTENCE, SECTION_DELIMITER,
};
pub use critique::CritiqueAgent;
pub use memory_gate::{MemoryGate, MEMORY_MARKERS, MIN_FACT_TOKENS};
pub use orchestrator::Orchestrator;
pub use retrieval::{boost_entity_matches, extract_entity, RetrievalAgent, STOP_PHRASES};

use crate::{RagCrewError, Result};

/// Reject blank questions before any external call is made
pub fn validate_question(question: &str) -> Result<&str> {
    if question.trim().is_empty() {
        return Err(RagCrewError::EmptyQuestion);
    }
    Ok(question)
}
