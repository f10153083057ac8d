//! Long-term memory gate
//!
//! Cheap heuristic for "this utterance states a fact about someone":
//! at least four words and a declarative marker. Accepted utterances are
//! stored verbatim in the memory collection.

use crate::index::PassageIndex;
use crate::types::PassageMetadata;
use std::sync::Arc;
use tracing::{debug, warn};

/// Utterances shorter than this many words are never remembered
pub const MIN_FACT_TOKENS: usize = 4;

/// Declarative markers; the surrounding spaces keep them from matching inside words
pub const MEMORY_MARKERS: &[&str] = &[
    " is ", " am ", " are ", " have ", " has ", " lives ", " love ", " likes ", " work ", " live ",
];

pub struct MemoryGate {
    index: Arc<dyn PassageIndex>,
}

impl MemoryGate {
    pub fn new(index: Arc<dyn PassageIndex>) -> Self {
        Self { index }
    }

    pub fn should_remember(text: &str) -> bool {
        if text.split_whitespace().count() < MIN_FACT_TOKENS {
            return false;
        }
        let lower = text.to_lowercase();
        MEMORY_MARKERS.iter().any(|marker| lower.contains(marker))
    }

    /// Store `text` as a user fact. Failures are logged, never returned.
    pub async fn remember(&self, text: &str) -> bool {
        match self
            .index
            .store_memory(text, PassageMetadata::user_fact())
            .await
        {
            Ok(()) => {
                debug!("Remembered user fact: {:?}", text);
                true
            }
            Err(e) => {
                warn!("Failed to store memory (ignored): {}", e);
                false
            }
        }
    }

    /// Remember `text` if it looks like a fact; returns whether it was stored
    pub async fn remember_if_fact(&self, text: &str) -> bool {
        if !Self::should_remember(text) {
            return false;
        }
        self.remember(text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::LocalIndex;
    use crate::types::{Passage, SearchResult};
    use crate::{RagCrewError, Result};
    use async_trait::async_trait;

    struct BrokenIndex;

    #[async_trait]
    impl PassageIndex for BrokenIndex {
        async fn search_documents(&self, _: &str, _: usize) -> Result<Vec<SearchResult>> {
            Ok(Vec::new())
        }

        async fn search_memory(&self, _: &str, _: usize) -> Result<Vec<SearchResult>> {
            Ok(Vec::new())
        }

        async fn store_memory(&self, _: &str, _: PassageMetadata) -> Result<()> {
            Err(RagCrewError::Index("disk full".to_string()))
        }

        async fn replace_documents(&self, _: Vec<Passage>) -> Result<usize> {
            Ok(0)
        }
    }

    #[test]
    fn test_token_boundary() {
        assert!(!MemoryGate::should_remember("I am busy"));
        assert!(MemoryGate::should_remember("I am a teacher"));
    }

    #[test]
    fn test_requires_marker() {
        assert!(!MemoryGate::should_remember("What time does it start?"));
        assert!(MemoryGate::should_remember("My sister LIVES in Porto now"));
        // "is" inside a word does not count
        assert!(!MemoryGate::should_remember("this island looks lovely today"));
    }

    #[test]
    fn test_remember_stores_user_fact() {
        let index = Arc::new(LocalIndex::in_memory());
        let gate = MemoryGate::new(index.clone());

        let stored = tokio_test::block_on(gate.remember_if_fact("I work at the observatory"));
        assert!(stored);

        let hits = tokio_test::block_on(index.search_memory("observatory", 5)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].passage.metadata, PassageMetadata::user_fact());
        assert_eq!(hits[0].text(), "I work at the observatory");
    }

    #[test]
    fn test_rejected_text_is_not_stored() {
        let index = Arc::new(LocalIndex::in_memory());
        let gate = MemoryGate::new(index.clone());
        assert!(!tokio_test::block_on(gate.remember_if_fact("Hello there")));
        assert_eq!(tokio_test::block_on(index.memory_count()), 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_swallowed() {
        let gate = MemoryGate::new(Arc::new(BrokenIndex));
        assert!(!gate.remember_if_fact("I am a retired sailor").await);
    }
}
