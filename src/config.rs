//! TOML configuration parsing and validation.
//!
//! Every section is optional; missing values fall back to the defaults
//! below. [`Config::minimal`] is the configuration used when no file exists.
//!
//! ```toml
//! [storage]
//! path = "./data/teapot.sqlite"
//!
//! [chunking]
//! max_words = 512
//!
//! [retrieval]
//! rag_top_k = 5
//! memory_top_k = 3
//!
//! [generation]
//! provider = "ollama"            # or "echo"
//! model = "teapotllm"
//! endpoint = "http://127.0.0.1:11434"
//!
//! [tools]
//! web_search = true
//! calculator = true
//!
//! [server]
//! bind = "127.0.0.1:3000"
//! static_dir = "./docs/chat"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use teapot_core::chunk::DEFAULT_MAX_WORDS;
use teapot_core::retrieval::{RetrievalParams, DEFAULT_MEMORY_TOP_K, DEFAULT_RAG_TOP_K};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./data/teapot.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_words")]
    pub max_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_words: DEFAULT_MAX_WORDS,
        }
    }
}

fn default_max_words() -> usize {
    DEFAULT_MAX_WORDS
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_rag_top_k")]
    pub rag_top_k: usize,
    #[serde(default = "default_memory_top_k")]
    pub memory_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            rag_top_k: DEFAULT_RAG_TOP_K,
            memory_top_k: DEFAULT_MEMORY_TOP_K,
        }
    }
}

fn default_rag_top_k() -> usize {
    DEFAULT_RAG_TOP_K
}
fn default_memory_top_k() -> usize {
    DEFAULT_MEMORY_TOP_K
}

impl RetrievalConfig {
    pub fn params(&self) -> RetrievalParams {
        RetrievalParams {
            rag_top_k: self.rag_top_k,
            memory_top_k: self.memory_top_k,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_generation_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Text placed in the system block of every prompt.
    #[serde(default)]
    pub system_prompt: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            endpoint: default_generation_endpoint(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            system_prompt: String::new(),
        }
    }
}

fn default_provider() -> String {
    "echo".to_string()
}
fn default_model() -> String {
    "teapotai/teapotllm".to_string()
}
fn default_generation_endpoint() -> String {
    "http://127.0.0.1:11434".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}

/// Which prompt blocks are filled for each message.
#[derive(Debug, Deserialize, Clone)]
pub struct ToolsConfig {
    #[serde(default)]
    pub web_search: bool,
    #[serde(default)]
    pub calculator: bool,
    #[serde(default)]
    pub weather: bool,
    #[serde(default = "default_true")]
    pub memory: bool,
    #[serde(default = "default_true")]
    pub rag: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            web_search: false,
            calculator: false,
            weather: false,
            memory: true,
            rag: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Upstream web-search API proxied by `GET /api/search`.
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    /// Environment variable holding the upstream subscription token.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// The `/api/search` URL the chat flow calls for its web block.
    #[serde(default = "default_proxy_url")]
    pub proxy_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            api_key_env: default_api_key_env(),
            proxy_url: default_proxy_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_search_endpoint() -> String {
    "https://api.search.brave.com/res/v1/web/search".to_string()
}
fn default_api_key_env() -> String {
    "BRAVE_API_KEY".to_string()
}
fn default_proxy_url() -> String {
    "http://127.0.0.1:3000/api/search".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Directory served at `/` when set.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            static_dir: None,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

impl Config {
    /// All-default configuration, used when no config file is present.
    pub fn minimal() -> Self {
        Self::default()
    }
}

/// Read, parse, and validate a TOML config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Like [`load_config`], but a missing file yields [`Config::minimal`].
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::minimal())
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_words == 0 {
        anyhow::bail!("chunking.max_words must be > 0");
    }

    if config.retrieval.rag_top_k < 1 {
        anyhow::bail!("retrieval.rag_top_k must be >= 1");
    }
    if config.retrieval.memory_top_k < 1 {
        anyhow::bail!("retrieval.memory_top_k must be >= 1");
    }

    match config.generation.provider.as_str() {
        "echo" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be echo or ollama.",
            other
        ),
    }

    if config.generation.model.trim().is_empty() {
        anyhow::bail!("generation.model must not be empty");
    }

    Ok(())
}
