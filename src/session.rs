//! Chat session persistence.
//!
//! The pipeline itself is stateless across requests; a frontend that wants
//! to resume a conversation saves the returned history here.
//!
//! Directory layout:
//!   {sessions_dir}/{session_id}.json

use crate::types::ConversationTurn;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub saved_at: DateTime<Utc>,
    pub history: Vec<ConversationTurn>,
}

pub struct SessionStore {
    sessions_dir: PathBuf,
}

impl SessionStore {
    /// Create a new session store. Creates the directory if needed.
    pub async fn new(home: &Path) -> Result<Self> {
        let sessions_dir = home.join("sessions");
        fs::create_dir_all(&sessions_dir).await?;
        Ok(Self { sessions_dir })
    }

    pub async fn save(&self, session_id: &str, history: &[ConversationTurn]) -> Result<()> {
        let snapshot = SessionSnapshot {
            session_id: session_id.to_string(),
            saved_at: Utc::now(),
            history: history.to_vec(),
        };

        let path = self.session_path(session_id);
        let content = serde_json::to_string_pretty(&snapshot)?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;

        debug!("Saved session {} ({} turns)", session_id, history.len());
        Ok(())
    }

    /// Returns None if no readable session exists.
    pub async fn load(&self, session_id: &str) -> Result<Option<SessionSnapshot>> {
        let path = self.session_path(session_id);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await?;
        match serde_json::from_str::<SessionSnapshot>(&content) {
            Ok(snapshot) => {
                info!(
                    "Loaded session {} ({} turns)",
                    session_id,
                    snapshot.history.len()
                );
                Ok(Some(snapshot))
            }
            Err(e) => {
                warn!("Failed to parse session file for {}: {}", session_id, e);
                Ok(None)
            }
        }
    }

    /// List all saved session ids, sorted
    pub async fn list_sessions(&self) -> Result<Vec<String>> {
        let mut sessions = Vec::new();
        let mut entries = fs::read_dir(&self.sessions_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(id) = name.strip_suffix(".json") {
                    sessions.push(id.to_string());
                }
            }
        }
        sessions.sort();
        Ok(sessions)
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        // Sanitize session_id for use as filename
        let safe_id: String = session_id
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.sessions_dir.join(format!("{}.json", safe_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = SessionStore::new(temp_dir.path()).await.unwrap();
        let history = vec![ConversationTurn::new("Who is Ada?", "A mathematician.")];

        store.save("work", &history).await.unwrap();
        let snapshot = store.load("work").await.unwrap().unwrap();

        assert_eq!(snapshot.session_id, "work");
        assert_eq!(snapshot.history, history);
    }

    #[tokio::test]
    async fn test_missing_and_corrupt_sessions() {
        let temp_dir = TempDir::new().unwrap();
        let store = SessionStore::new(temp_dir.path()).await.unwrap();
        assert!(store.load("nope").await.unwrap().is_none());

        std::fs::write(temp_dir.path().join("sessions/bad.json"), "{").unwrap();
        assert!(store.load("bad").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ids_are_sanitized_and_listed() {
        let temp_dir = TempDir::new().unwrap();
        let store = SessionStore::new(temp_dir.path()).await.unwrap();
        store.save("../escape", &[]).await.unwrap();
        store.save("b", &[]).await.unwrap();

        assert_eq!(store.list_sessions().await.unwrap(), vec!["___escape", "b"]);
    }
}
