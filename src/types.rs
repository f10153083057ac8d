//! Data model shared by the agents, the index and the frontends

use serde::{Deserialize, Serialize};

/// Metadata source tag used for remembered user facts
pub const MEMORY_SOURCE: &str = "memory";

/// Metadata kind tag used for remembered user facts
pub const USER_FACT_KIND: &str = "user_fact";

/// A chunk of text owned by the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: String,
    pub text: String,
    pub metadata: PassageMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassageMetadata {
    /// File name for documents, `"memory"` for remembered facts
    pub source: String,

    /// Position of the chunk inside its source document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,

    /// Kind tag for memory facts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl PassageMetadata {
    /// Metadata for the `index`-th chunk of a document
    pub fn document(source: impl Into<String>, index: usize) -> Self {
        Self {
            source: source.into(),
            chunk_index: Some(index),
            kind: None,
        }
    }

    /// Metadata attached to every remembered user fact
    pub fn user_fact() -> Self {
        Self {
            source: MEMORY_SOURCE.to_string(),
            chunk_index: None,
            kind: Some(USER_FACT_KIND.to_string()),
        }
    }

    /// Short human-readable label, e.g. `notes.txt (chunk 3)`
    pub fn label(&self) -> String {
        match self.chunk_index {
            Some(idx) => format!("{} (chunk {})", self.source, idx),
            None => self.source.clone(),
        }
    }
}

/// A passage returned by a search, with its distance to the query if known
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub passage: Passage,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
}

impl SearchResult {
    pub fn new(passage: Passage, distance: Option<f32>) -> Self {
        Self { passage, distance }
    }

    pub fn text(&self) -> &str {
        &self.passage.text
    }
}

/// One question/answer exchange.
///
/// An empty `assistant` marks a user-only turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub user: String,
    #[serde(default)]
    pub assistant: String,
}

impl ConversationTurn {
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
        }
    }

    pub fn user_only(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: String::new(),
        }
    }

    pub fn has_assistant(&self) -> bool {
        !self.assistant.is_empty()
    }
}

/// Result of the retrieval step for one question
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalOutcome {
    pub question: String,
    pub results: Vec<SearchResult>,
    pub has_context: bool,
    pub context_matches_query: bool,
}

impl RetrievalOutcome {
    pub fn empty(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            results: Vec::new(),
            has_context: false,
            context_matches_query: false,
        }
    }
}

/// How an answer was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerMode {
    /// Model's own knowledge, no external context
    Direct,
    /// Document and/or memory context with strict grounding
    Grounded,
}

impl std::fmt::Display for AnswerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnswerMode::Direct => write!(f, "direct"),
            AnswerMode::Grounded => write!(f, "grounded"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectAnswer {
    pub question: String,
    pub answer: String,
    pub history: Vec<ConversationTurn>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroundedAnswer {
    pub question: String,
    pub answer: String,
    /// Document results first, then memory results
    pub context: Vec<SearchResult>,
    pub history: Vec<ConversationTurn>,
}

/// Output of the analysis step
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Direct(DirectAnswer),
    Grounded(GroundedAnswer),
}

impl AnalysisOutcome {
    pub fn mode(&self) -> AnswerMode {
        match self {
            AnalysisOutcome::Direct(_) => AnswerMode::Direct,
            AnalysisOutcome::Grounded(_) => AnswerMode::Grounded,
        }
    }

    pub fn question(&self) -> &str {
        match self {
            AnalysisOutcome::Direct(d) => &d.question,
            AnalysisOutcome::Grounded(g) => &g.question,
        }
    }

    pub fn answer(&self) -> &str {
        match self {
            AnalysisOutcome::Direct(d) => &d.answer,
            AnalysisOutcome::Grounded(g) => &g.answer,
        }
    }

    /// Context used for grounding; always empty for direct answers
    pub fn context(&self) -> &[SearchResult] {
        match self {
            AnalysisOutcome::Direct(_) => &[],
            AnalysisOutcome::Grounded(g) => &g.context,
        }
    }

    pub fn history(&self) -> &[ConversationTurn] {
        match self {
            AnalysisOutcome::Direct(d) => &d.history,
            AnalysisOutcome::Grounded(g) => &g.history,
        }
    }
}

/// Final response handed back to a frontend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResponse {
    pub question: String,
    pub answer: String,
    pub critique: String,
    pub context: Vec<SearchResult>,
    pub mode: AnswerMode,
    pub history: Vec<ConversationTurn>,
}

/// Critique step output has the same shape as the external response
pub type CritiqueOutcome = PipelineResponse;

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(text: &str) -> SearchResult {
        SearchResult::new(
            Passage {
                id: "doc_0".to_string(),
                text: text.to_string(),
                metadata: PassageMetadata::document("doc.txt", 0),
            },
            Some(0.25),
        )
    }

    #[test]
    fn test_direct_outcome_has_no_context() {
        let outcome = AnalysisOutcome::Direct(DirectAnswer {
            question: "q".to_string(),
            answer: "a".to_string(),
            history: vec![ConversationTurn::new("q", "a")],
        });
        assert_eq!(outcome.mode(), AnswerMode::Direct);
        assert!(outcome.context().is_empty());
        assert_eq!(outcome.history().len(), 1);
    }

    #[test]
    fn test_search_result_serializes_flat() {
        let value = serde_json::to_value(passage("Ada Lovelace")).unwrap();
        assert_eq!(value["text"], "Ada Lovelace");
        assert_eq!(value["metadata"]["source"], "doc.txt");
        assert_eq!(value["metadata"]["chunk_index"], 0);
        assert!(value["metadata"].get("kind").is_none());
    }

    #[test]
    fn test_mode_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&AnswerMode::Grounded).unwrap(),
            "\"grounded\""
        );
        assert_eq!(AnswerMode::Direct.to_string(), "direct");
    }

    #[test]
    fn test_user_fact_metadata() {
        let meta = PassageMetadata::user_fact();
        assert_eq!(meta.source, MEMORY_SOURCE);
        assert_eq!(meta.kind.as_deref(), Some(USER_FACT_KIND));
        assert_eq!(meta.label(), "memory");
        assert_eq!(PassageMetadata::document("a.txt", 2).label(), "a.txt (chunk 2)");
    }

    #[test]
    fn test_turn_without_assistant_deserializes() {
        let turn: ConversationTurn = serde_json::from_str(r#"{"user": "hi"}"#).unwrap();
        assert!(!turn.has_assistant());
    }
}
