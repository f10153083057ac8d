//! Context and prompt text for model calls

use crate::types::SearchResult;

/// Sentence the model must reply with when the context lacks the answer
pub const REFUSAL_SENTENCE: &str = "The provided documents do not contain this information.";

/// Strict-grounding instruction placed before every grounded context
pub const GROUNDING_INSTRUCTION: &str = "You must answer the question using ONLY the information \
explicitly stated in the provided context below.\n\n\
If the answer is NOT present in the context, reply with:\n\
'The provided documents do not contain this information.'\n\n\
Do NOT use any external knowledge, assumptions, or prior training data.";

pub const DOCUMENT_HEADER: &str = "DOCUMENT CONTEXT:";
pub const MEMORY_HEADER: &str = "MEMORY CONTEXT:";

/// Between passages inside one section
pub const PASSAGE_SEPARATOR: &str = "\n\n---\n\n";

/// Between the document and memory sections
pub const SECTION_DELIMITER: &str = "\n\n====\n\n";

/// Critique attached to answers that used no context
pub const NO_CRITIQUE: &str = "No critique. Answered using general LLM (no document context).";

/// Builds context strings for model calls
pub struct ContextBuilder<'a> {
    documents: &'a [SearchResult],
    memories: &'a [SearchResult],
}

impl<'a> ContextBuilder<'a> {
    pub fn new(documents: &'a [SearchResult]) -> Self {
        Self {
            documents,
            memories: &[],
        }
    }

    /// Add long-term memory results
    pub fn with_memories(mut self, memories: &'a [SearchResult]) -> Self {
        self.memories = memories;
        self
    }

    /// Join passage texts with the passage separator
    pub fn join_passages(results: &[SearchResult]) -> String {
        results
            .iter()
            .map(SearchResult::text)
            .collect::<Vec<_>>()
            .join(PASSAGE_SEPARATOR)
    }

    /// Grounding instruction followed by the non-empty sections
    pub fn for_grounded_answer(&self) -> String {
        let mut sections = Vec::new();
        if !self.documents.is_empty() {
            sections.push(format!(
                "{DOCUMENT_HEADER}\n{}",
                Self::join_passages(self.documents)
            ));
        }
        if !self.memories.is_empty() {
            sections.push(format!(
                "{MEMORY_HEADER}\n{}",
                Self::join_passages(self.memories)
            ));
        }

        format!(
            "{GROUNDING_INSTRUCTION}\n\n{}",
            sections.join(SECTION_DELIMITER)
        )
    }

    /// Context passed alongside the critique question
    pub fn for_critique(&self) -> String {
        let mut all = self.documents.to_vec();
        all.extend_from_slice(self.memories);
        format!("Context used to answer:\n\n{}", Self::join_passages(&all))
    }

    /// Question asking the model to review an answer
    pub fn critique_question(answer: &str) -> String {
        format!("Evaluate the following answer for correctness and faithfulness:\n\n{answer}")
    }
}
