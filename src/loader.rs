//! Document loading and chunking
//!
//! Text and PDF files in the docs directory are split into overlapping word
//! windows. Each window becomes one passage with id `{file_name}_{chunk_index}`.

use crate::types::{Passage, PassageMetadata};
use crate::{RagCrewError, Result};
use encoding_rs::{Encoding, WINDOWS_1252};
use glob::{glob_with, MatchOptions};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// File extensions picked up from the docs directory
const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "pdf"];

pub struct DocumentLoader {
    docs_dir: PathBuf,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl DocumentLoader {
    pub fn new(docs_dir: PathBuf, chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(RagCrewError::Config(format!(
                "invalid chunking: size={chunk_size}, overlap={chunk_overlap}"
            )));
        }
        Ok(Self {
            docs_dir,
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn docs_dir(&self) -> &Path {
        &self.docs_dir
    }

    /// Load and chunk every supported file, in file-name order
    pub async fn load(&self) -> Result<Vec<Passage>> {
        fs::create_dir_all(&self.docs_dir).await?;

        let mut passages = Vec::new();
        for path in self.discover()? {
            let file_name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };

            let raw_text = if has_extension(&path, "pdf") {
                Self::read_pdf(&path).await?
            } else {
                Self::read_text(&path).await?
            };
            debug!("Loaded {}, text length = {}", file_name, raw_text.len());
            if raw_text.trim().is_empty() {
                warn!("Empty or unreadable file: {}", file_name);
                continue;
            }

            let chunks = chunk_text(&raw_text, self.chunk_size, self.chunk_overlap);
            debug!("{}: {} chunks", file_name, chunks.len());
            for (idx, chunk) in chunks.into_iter().enumerate() {
                passages.push(Passage {
                    id: format!("{}_{}", file_name, idx),
                    text: chunk,
                    metadata: PassageMetadata::document(file_name.clone(), idx),
                });
            }
        }

        info!(
            "Loaded {} chunks from {:?}",
            passages.len(),
            self.docs_dir
        );
        Ok(passages)
    }

    /// Copy files into the docs directory; returns how many were copied
    pub async fn import(&self, files: &[PathBuf]) -> Result<usize> {
        fs::create_dir_all(&self.docs_dir).await?;

        let mut copied = 0;
        for file in files {
            if !Self::is_supported(file) {
                warn!("Skipping unsupported file: {:?}", file);
                continue;
            }
            let name = file.file_name().ok_or_else(|| {
                RagCrewError::Loader(format!("not a file path: {}", file.display()))
            })?;
            fs::copy(file, self.docs_dir.join(name)).await?;
            copied += 1;
        }
        Ok(copied)
    }

    fn discover(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for ext in SUPPORTED_EXTENSIONS {
            let pattern = self.docs_dir.join(format!("*.{ext}"));
            let pattern = pattern.to_string_lossy();
            let options = MatchOptions {
                case_sensitive: false,
                ..MatchOptions::new()
            };
            let entries = glob_with(&pattern, options)
                .map_err(|e| RagCrewError::Loader(format!("bad glob pattern {pattern}: {e}")))?;
            for entry in entries {
                match entry {
                    Ok(path) if path.is_file() => paths.push(path),
                    Ok(_) => {}
                    Err(e) => warn!("Cannot read {:?}: {}", e.path(), e),
                }
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn is_supported(path: &Path) -> bool {
        SUPPORTED_EXTENSIONS
            .iter()
            .any(|ext| has_extension(path, ext))
    }

    async fn read_text(path: &Path) -> Result<String> {
        let bytes = fs::read(path).await?;
        match decode_text(&bytes) {
            Some(text) => Ok(text),
            None => {
                debug!("{:?} is not UTF-8 or UTF-16, decoding as Latin-1", path);
                let (text, _) = WINDOWS_1252.decode_without_bom_handling(&bytes);
                Ok(text.into_owned())
            }
        }
    }

    /// Extract PDF text; an unreadable PDF yields empty text rather than an error
    async fn read_pdf(path: &Path) -> Result<String> {
        let bytes = fs::read(path).await?;
        let extracted =
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes)).await;

        match extracted {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => {
                warn!("Could not read PDF {:?}: {}", path, e);
                Ok(String::new())
            }
            // pdf-extract panics on some malformed inputs
            Err(e) => {
                warn!("PDF extraction aborted for {:?}: {}", path, e);
                Ok(String::new())
            }
        }
    }
}

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}

/// Decode UTF-8, or UTF-16 with a byte-order mark. None if neither applies.
fn decode_text(bytes: &[u8]) -> Option<String> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return Some(text.into_owned());
    }
    std::str::from_utf8(bytes).ok().map(str::to_string)
}

/// Split text into windows of `size` words, consecutive windows sharing `overlap` words.
///
/// An overlap of `size` or more is clamped to `size - 1` so every window advances.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    if size == 0 {
        return Vec::new();
    }
    let overlap = overlap.min(size - 1);
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let end = (start + size).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end >= words.len() {
            break;
        }
        start = end - overlap;
    }

    chunks
}
