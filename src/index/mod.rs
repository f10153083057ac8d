//! Passage index port
//!
//! Two collections live behind one index: documents (replaced wholesale on
//! reindex) and long-term memory (append-only user facts).

mod local;

pub use local::LocalIndex;

use crate::types::{Passage, PassageMetadata, SearchResult};
use crate::Result;
use async_trait::async_trait;

/// Capability to search documents and memory, and to store new passages.
///
/// A blank query yields an empty result, never an error.
#[async_trait]
pub trait PassageIndex: Send + Sync {
    /// Search the document collection, closest first
    async fn search_documents(&self, query: &str, k: usize) -> Result<Vec<SearchResult>>;

    /// Search the long-term memory collection, closest first
    async fn search_memory(&self, query: &str, k: usize) -> Result<Vec<SearchResult>>;

    /// Store one memory passage. Visible to searches issued after this returns.
    async fn store_memory(&self, text: &str, metadata: PassageMetadata) -> Result<()>;

    /// Replace the whole document collection; returns the number indexed
    async fn replace_documents(&self, passages: Vec<Passage>) -> Result<usize>;

    /// Persist pending state; called on shutdown
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
