//! Document retrieval with entity-aware re-ranking
//!
//! Vector-style search happily returns passages about a *similar* subject
//! (ask about one person, get passages about another). The agent extracts
//! the question's subject and checks it lexically: passages that mention it
//! move to the front, and a result set that never mentions it is flagged as
//! off-topic.

use crate::index::PassageIndex;
use crate::types::{RetrievalOutcome, SearchResult};
use std::sync::Arc;
use tracing::{debug, warn};

/// Leading phrases removed from a question to expose its subject.
/// Applied in order, each removing every occurrence.
pub const STOP_PHRASES: &[&str] = &[
    "who is",
    "who was",
    "tell me about",
    "provide information about",
    "can you",
    "please",
    "explain",
    "describe",
    "a person called",
    "what is",
    "what are",
    "give me information about",
];

/// Characters trimmed from both ends of the extracted subject, besides whitespace
const TRIM_PUNCTUATION: &[char] = &['?', '.', ',', ':'];

/// Extract the main subject of a question (lower-cased). May be empty.
pub fn extract_entity(question: &str) -> String {
    let mut q = question.to_lowercase();
    for phrase in STOP_PHRASES {
        q = q.replace(phrase, "");
    }
    q.trim_matches(|c: char| c.is_whitespace() || TRIM_PUNCTUATION.contains(&c))
        .to_string()
}

/// Stable partition: results mentioning `entity` first, the rest after,
/// each group in its original order.
pub fn boost_entity_matches(results: Vec<SearchResult>, entity: &str) -> Vec<SearchResult> {
    if entity.is_empty() {
        return results;
    }
    let entity = entity.to_lowercase();
    let (mut boosted, others): (Vec<_>, Vec<_>) = results
        .into_iter()
        .partition(|r| mentions(r, &entity));
    boosted.extend(others);
    boosted
}

fn mentions(result: &SearchResult, entity: &str) -> bool {
    result.text().to_lowercase().contains(entity)
}

pub struct RetrievalAgent {
    index: Arc<dyn PassageIndex>,
    k: usize,
}

impl RetrievalAgent {
    pub fn new(index: Arc<dyn PassageIndex>, k: usize) -> Self {
        Self { index, k }
    }

    pub async fn retrieve(&self, question: &str) -> RetrievalOutcome {
        let results = match self.index.search_documents(question, self.k).await {
            Ok(results) => results,
            Err(e) => {
                warn!("Document search failed, continuing without documents: {}", e);
                Vec::new()
            }
        };

        if results.is_empty() {
            debug!("No documents for {:?}", question);
            return RetrievalOutcome::empty(question);
        }

        let entity = extract_entity(question);
        let results = boost_entity_matches(results, &entity);

        // A general question with no subject may be addressed by any passage
        let context_matches_query =
            entity.is_empty() || results.iter().any(|r| mentions(r, &entity));

        debug!(
            "Retrieved {} passages, entity={:?}, matches_query={}",
            results.len(),
            entity,
            context_matches_query
        );

        RetrievalOutcome {
            question: question.to_string(),
            results,
            has_context: true,
            context_matches_query,
        }
    }
}
