//! Configuration for ragcrew
//!
//! Settings come from four layers, highest precedence first:
//!   1. CLI flags (applied by the binary through the `with_*` builders)
//!   2. environment variables (`LLM_PROVIDER`, `LLM_MODEL`, `CHUNK_SIZE`, `CHUNK_OVERLAP`)
//!   3. `config.toml` in the ragcrew home directory
//!   4. built-in defaults
//!
//! Model providers are resolved from a provider table: built-in providers
//! (mock, openai, nvidia, ollama) are merged with user-defined
//! `[model_providers.*]` entries, and user entries win.

use crate::{RagCrewError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default number of passages fetched per search
pub const DEFAULT_TOP_K: usize = 5;
/// Default chunk size in words
pub const DEFAULT_CHUNK_SIZE: usize = 800;
/// Default chunk overlap in words
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;
/// Default provider; answers offline without credentials
pub const DEFAULT_PROVIDER: &str = "mock";
pub const DEFAULT_MODEL: &str = "mistralai/mixtral-8x22b-instruct-v0.1";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

const CONFIG_FILE_NAME: &str = "config.toml";

/// Partial `config.toml`. Every field is optional.
#[derive(Debug, Default, Deserialize)]
struct ConfigToml {
    provider: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    top_k: Option<usize>,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    docs_dir: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    model_providers: Option<HashMap<String, ModelProviderConfig>>,
}

/// An OpenAI-compatible model provider
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ModelProviderConfig {
    /// Provider display name
    pub name: Option<String>,

    /// Base URL for the API, without the `/chat/completions` suffix
    pub base_url: Option<String>,

    /// Environment variable holding the API key
    pub env_key: Option<String>,

    /// Additional static HTTP headers
    pub http_headers: Option<HashMap<String, String>>,

    /// Additional HTTP headers sourced from environment variables
    pub env_http_headers: Option<HashMap<String, String>>,
}

impl ModelProviderConfig {
    /// Static headers plus env-sourced headers, skipping blank values
    pub fn resolve_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::new();

        if let Some(static_headers) = &self.http_headers {
            for (name, value) in static_headers {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    headers.push((name.clone(), trimmed.to_string()));
                }
            }
        }

        if let Some(env_headers) = &self.env_http_headers {
            for (name, env_var) in env_headers {
                if let Ok(value) = std::env::var(env_var) {
                    let trimmed = value.trim();
                    if !trimmed.is_empty() {
                        headers.push((name.clone(), trimmed.to_string()));
                    }
                }
            }
        }

        headers
    }
}

/// Returns the built-in model providers.
fn built_in_model_providers() -> HashMap<String, ModelProviderConfig> {
    let mut map = HashMap::new();

    map.insert(
        "mock".to_string(),
        ModelProviderConfig {
            name: Some("Mock (offline)".to_string()),
            ..Default::default()
        },
    );

    map.insert(
        "openai".to_string(),
        ModelProviderConfig {
            name: Some("OpenAI".to_string()),
            base_url: Some(
                std::env::var("OPENAI_BASE_URL")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            ),
            env_key: Some("OPENAI_API_KEY".to_string()),
            http_headers: None,
            env_http_headers: Some(HashMap::from([
                (
                    "OpenAI-Organization".to_string(),
                    "OPENAI_ORGANIZATION".to_string(),
                ),
                ("OpenAI-Project".to_string(), "OPENAI_PROJECT".to_string()),
            ])),
        },
    );

    map.insert(
        "nvidia".to_string(),
        ModelProviderConfig {
            name: Some("NVIDIA".to_string()),
            base_url: Some(
                std::env::var("NVIDIA_BASE_URL")
                    .unwrap_or_else(|_| "https://integrate.api.nvidia.com/v1".to_string()),
            ),
            env_key: Some("NVIDIA_API_KEY".to_string()),
            http_headers: None,
            env_http_headers: None,
        },
    );

    map.insert(
        "ollama".to_string(),
        ModelProviderConfig {
            name: Some("Ollama".to_string()),
            base_url: Some(std::env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| {
                let port = std::env::var("OLLAMA_PORT").unwrap_or_else(|_| "11434".to_string());
                format!("http://localhost:{}/v1", port)
            })),
            env_key: None,
            http_headers: None,
            env_http_headers: None,
        },
    );

    map
}

/// Language model selection
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Key into the providers table
    pub provider_id: String,

    pub model: String,

    pub temperature: f32,

    /// Built-in providers merged with user-defined ones
    pub providers: HashMap<String, ModelProviderConfig>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider_id: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            providers: built_in_model_providers(),
        }
    }
}

impl LlmSettings {
    pub fn is_mock(&self) -> bool {
        self.provider_id == "mock"
    }

    /// Look up the selected provider
    pub fn provider(&self) -> Result<&ModelProviderConfig> {
        self.providers.get(&self.provider_id).ok_or_else(|| {
            RagCrewError::Config(format!(
                "model provider '{}' is not defined (known: {})",
                self.provider_id,
                self.known_providers().join(", ")
            ))
        })
    }

    fn known_providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// Configuration for a ragcrew pipeline
#[derive(Debug, Clone)]
pub struct RagCrewConfig {
    /// Home directory holding `config.toml`, documents and index data
    pub home: PathBuf,

    /// Where the index collections are persisted
    pub data_dir: PathBuf,

    /// Where source documents are read from
    pub docs_dir: PathBuf,

    /// Passages fetched per search, for documents and memory alike
    pub top_k: usize,

    /// Chunk window in words
    pub chunk_size: usize,

    /// Words shared by consecutive chunks
    pub chunk_overlap: usize,

    pub llm: LlmSettings,
}

impl RagCrewConfig {
    pub fn new(home: PathBuf) -> Self {
        Self {
            data_dir: home.join("data"),
            docs_dir: home.join("docs"),
            home,
            top_k: DEFAULT_TOP_K,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            llm: LlmSettings::default(),
        }
    }

    /// Load `config.toml` from `home` (if present) and apply environment overrides.
    ///
    /// Not validated here: callers layer CLI overrides on top and validate last.
    pub async fn load(home: &Path) -> Result<Self> {
        let mut config = Self::new(home.to_path_buf());

        let config_file = home.join(CONFIG_FILE_NAME);
        if config_file.exists() {
            let content = tokio::fs::read_to_string(&config_file).await?;
            let parsed: ConfigToml = toml::from_str(&content)?;
            config.apply_file(parsed);
        }

        config.apply_env(|key| std::env::var(key).ok());

        info!(
            "Config resolved: provider='{}', model='{}', top_k={}, chunk={}/{}, docs={:?}",
            config.llm.provider_id,
            config.llm.model,
            config.top_k,
            config.chunk_size,
            config.chunk_overlap,
            config.docs_dir
        );

        Ok(config)
    }

    fn apply_file(&mut self, file: ConfigToml) {
        // Merge user-defined providers into built-in (user can override)
        if let Some(user_providers) = file.model_providers {
            for (key, prov) in user_providers {
                self.llm.providers.insert(key, prov);
            }
        }
        if let Some(provider) = file.provider {
            self.llm.provider_id = provider;
        }
        if let Some(model) = file.model {
            self.llm.model = model;
        }
        if let Some(temperature) = file.temperature {
            self.llm.temperature = temperature;
        }
        if let Some(top_k) = file.top_k {
            self.top_k = top_k;
        }
        if let Some(size) = file.chunk_size {
            self.chunk_size = size;
        }
        if let Some(overlap) = file.chunk_overlap {
            self.chunk_overlap = overlap;
        }
        // Relative paths are resolved against the home directory
        if let Some(dir) = file.docs_dir {
            self.docs_dir = self.home.join(dir);
        }
        if let Some(dir) = file.data_dir {
            self.data_dir = self.home.join(dir);
        }
    }

    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("LLM_PROVIDER").filter(|v| !v.trim().is_empty()) {
            self.llm.provider_id = provider.trim().to_string();
        }
        if let Some(model) = lookup("LLM_MODEL").filter(|v| !v.trim().is_empty()) {
            self.llm.model = model.trim().to_string();
        }
        for (key, slot) in [
            ("CHUNK_SIZE", &mut self.chunk_size),
            ("CHUNK_OVERLAP", &mut self.chunk_overlap),
        ] {
            if let Some(raw) = lookup(key) {
                match raw.trim().parse::<usize>() {
                    Ok(value) => *slot = value,
                    Err(_) => warn!("Ignoring non-numeric {}={:?}", key, raw),
                }
            }
        }
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(RagCrewError::Config("top_k must be at least 1".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(RagCrewError::Config(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagCrewError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        self.llm.provider()?;
        Ok(())
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_chunking(mut self, size: usize, overlap: usize) -> Self {
        self.chunk_size = size;
        self.chunk_overlap = overlap;
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.llm.provider_id = provider.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.llm.model = model.into();
        self
    }
}

/// Resolve the ragcrew home directory: `RAGCREW_HOME`, else `~/.ragcrew`.
pub fn default_home() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("RAGCREW_HOME") {
        return Ok(PathBuf::from(home));
    }

    let home = dirs::home_dir()
        .ok_or_else(|| RagCrewError::Config("Could not find home directory".to_string()))?;
    Ok(home.join(".ragcrew"))
}
