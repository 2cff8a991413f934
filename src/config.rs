use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::CleanupMode;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub sync: SyncConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Directory of PDF files, read recursively.
    pub source_path: PathBuf,
    /// Vector-store collection; also part of the record-manager namespace.
    pub collection_name: String,
    /// Directory holding the vector store and the record ledger.
    pub vectorstore_path: PathBuf,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_cleanup")]
    pub cleanup: String,
    /// Permit `full` cleanup to sweep a non-empty namespace from an empty
    /// batch. Off by default: a transient mount failure must not look like an
    /// intentionally empty corpus.
    #[serde(default)]
    pub allow_empty_sweep: bool,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_cleanup() -> String {
    "full".to_string()
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*.pdf".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-large".to_string()
}
fn default_dims() -> usize {
    3072
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Cap on distinct sources surfaced with an answer.
    #[serde(default = "default_max_context_sources")]
    pub max_context_sources: usize,
    /// Number of chunks retrieved per question when `--k` is not given.
    #[serde(default = "default_k")]
    pub default_k: usize,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            max_context_sources: default_max_context_sources(),
            default_k: default_k(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_max_context_sources() -> usize {
    10
}
fn default_k() -> usize {
    4
}
fn default_llm_timeout_secs() -> u64 {
    60
}

impl Config {
    /// Record-manager namespace: `"<backend>/<collection>"`.
    pub fn namespace(&self) -> String {
        format!("sqlite/{}", self.sync.collection_name)
    }

    pub fn cleanup_mode(&self) -> CleanupMode {
        // Validated in load_config / validate.
        CleanupMode::parse(&self.sync.cleanup).unwrap_or(CleanupMode::Full)
    }

    /// Validate numeric and enum fields. Called at load time so bad values
    /// fail before any indexing runs.
    pub fn validate(&self) -> Result<()> {
        if self.sync.chunk_size == 0 {
            anyhow::bail!("sync.chunk_size must be > 0");
        }
        if self.sync.chunk_overlap >= self.sync.chunk_size {
            anyhow::bail!("sync.chunk_overlap must be smaller than sync.chunk_size");
        }
        if CleanupMode::parse(&self.sync.cleanup).is_none() {
            anyhow::bail!(
                "Unknown cleanup mode: '{}'. Must be none, incremental, full, or scoped_full.",
                self.sync.cleanup
            );
        }
        if self.sync.collection_name.trim().is_empty() {
            anyhow::bail!("sync.collection_name must not be empty");
        }
        if self.embedding.dims == 0 {
            anyhow::bail!("embedding.dims must be > 0");
        }
        if self.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }
        if self.llm.max_context_sources == 0 {
            anyhow::bail!("llm.max_context_sources must be > 0");
        }
        if self.llm.default_k == 0 {
            anyhow::bail!("llm.default_k must be > 0");
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}
