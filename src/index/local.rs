//! In-process lexical passage store persisted as JSON Lines.
//!
//! Scoring is plain term overlap: the fraction of distinct query terms that
//! appear in a passage. There are no embeddings here; swap in a real vector
//! store through [`PassageIndex`] for semantic search.
//!
//! Directory layout:
//!   {dir}/documents.jsonl
//!   {dir}/memory.jsonl

use super::PassageIndex;
use crate::types::{Passage, PassageMetadata, SearchResult};
use crate::Result;
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

const DOCUMENTS_FILE: &str = "documents.jsonl";
const MEMORY_FILE: &str = "memory.jsonl";

pub struct LocalIndex {
    documents: RwLock<Vec<Passage>>,
    memory: RwLock<Vec<Passage>>,
    /// `None` keeps everything in memory only
    dir: Option<PathBuf>,
}

impl LocalIndex {
    /// Index that never touches the disk
    pub fn in_memory() -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
            memory: RwLock::new(Vec::new()),
            dir: None,
        }
    }

    /// Open (or create) an index persisted under `dir`
    pub async fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).await?;

        let documents = Self::load_collection(&dir.join(DOCUMENTS_FILE)).await?;
        let memory = Self::load_collection(&dir.join(MEMORY_FILE)).await?;
        info!(
            "Opened index at {:?}: {} document chunks, {} memories",
            dir,
            documents.len(),
            memory.len()
        );

        Ok(Self {
            documents: RwLock::new(documents),
            memory: RwLock::new(memory),
            dir: Some(dir.to_path_buf()),
        })
    }

    pub async fn document_count(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn memory_count(&self) -> usize {
        self.memory.read().await.len()
    }

    async fn load_collection(path: &Path) -> Result<Vec<Passage>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(path).await?;
        let mut passages = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Passage>(line) {
                Ok(passage) => passages.push(passage),
                Err(e) => warn!("Skipping malformed line {} in {:?}: {}", line_no + 1, path, e),
            }
        }
        Ok(passages)
    }

    async fn write_collection(path: &Path, passages: &[Passage]) -> Result<()> {
        let mut content = String::new();
        for passage in passages {
            content.push_str(&serde_json::to_string(passage)?);
            content.push('\n');
        }
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn append_line(path: &Path, passage: &Passage) -> Result<()> {
        let mut line = serde_json::to_string(passage)?;
        line.push('\n');
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Lower-case word terms of a text
    fn terms(text: &str) -> HashSet<String> {
        static WORD_RE: OnceLock<Regex> = OnceLock::new();
        let re = WORD_RE.get_or_init(|| Regex::new(r"\w+").expect("valid word regex"));
        re.find_iter(&text.to_lowercase())
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Rank passages by term overlap with the query, closest first.
    /// Ties keep collection order.
    fn rank(passages: &[Passage], query: &str, k: usize) -> Vec<SearchResult> {
        let query_terms = Self::terms(query);
        if query_terms.is_empty() || k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(f32, &Passage)> = passages
            .iter()
            .filter_map(|passage| {
                let passage_terms = Self::terms(&passage.text);
                let matched = query_terms
                    .iter()
                    .filter(|term| passage_terms.contains(*term))
                    .count();
                if matched == 0 {
                    return None;
                }
                let score = matched as f32 / query_terms.len() as f32;
                Some((1.0 - score, passage))
            })
            .collect();

        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored
            .into_iter()
            .take(k)
            .map(|(distance, passage)| SearchResult::new(passage.clone(), Some(distance)))
            .collect()
    }
}

#[async_trait]
impl PassageIndex for LocalIndex {
    async fn search_documents(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        let documents = self.documents.read().await;
        let results = Self::rank(&documents, query, k);
        debug!("Document search returned {} of {}", results.len(), documents.len());
        Ok(results)
    }

    async fn search_memory(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        let memory = self.memory.read().await;
        let results = Self::rank(&memory, query, k);
        debug!("Memory search returned {} of {}", results.len(), memory.len());
        Ok(results)
    }

    async fn store_memory(&self, text: &str, metadata: PassageMetadata) -> Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }
        let passage = Passage {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            metadata,
        };

        // Hold the write lock across the append so readers never see a fact
        // that is not yet on disk.
        let mut memory = self.memory.write().await;
        if let Some(dir) = &self.dir {
            Self::append_line(&dir.join(MEMORY_FILE), &passage).await?;
        }
        memory.push(passage);
        Ok(())
    }

    async fn replace_documents(&self, passages: Vec<Passage>) -> Result<usize> {
        let mut documents = self.documents.write().await;
        if let Some(dir) = &self.dir {
            Self::write_collection(&dir.join(DOCUMENTS_FILE), &passages).await?;
        }
        *documents = passages;
        info!("Indexed {} document chunks", documents.len());
        Ok(documents.len())
    }

    async fn flush(&self) -> Result<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let documents = self.documents.read().await;
        let memory = self.memory.read().await;
        Self::write_collection(&dir.join(DOCUMENTS_FILE), &documents).await?;
        Self::write_collection(&dir.join(MEMORY_FILE), &memory).await?;
        debug!("Flushed index to {:?}", dir);
        Ok(())
    }
}
