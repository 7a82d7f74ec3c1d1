//! TOML configuration for the whole pipeline.
//!
//! Every key is optional; an empty file yields the defaults:
//!
//! ```toml
//! corpus_dir = "data"
//!
//! [chunking]
//! chunk_size = 1000
//! overlap = 200
//!
//! [retrieval]
//! top_k = 3
//!
//! [loader]
//! failure_policy = "skip"        # or "abort"
//! embed_batch_size = 16
//! max_concurrent_requests = 4
//!
//! [embedder]
//! kind = "hashing"               # or "fastembed", "gemini"
//! # model = "embedding-001"
//! # dimension = 768
//! api_key_env = "GEMINI_API_KEY"
//!
//! [embedder.retry]
//! max_retries = 3
//! initial_backoff_ms = 500
//! ```

use crate::error::{RetrievalError, Result};
use crate::retrieval::chunking_strategy::{ChunkingConfig, ChunkingStrategy};
use crate::retrieval::corpus_loader::LoaderConfig;
use serde::{Deserialize, Serialize};
use sift_embed::EmbedConfig;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Chunks returned when a query does not ask for a specific number
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiftConfig {
    /// Directory holding the corpus documents
    pub corpus_dir: PathBuf,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub loader: LoaderConfig,
    pub embedder: EmbedConfig,
}

impl Default for SiftConfig {
    fn default() -> Self {
        Self {
            corpus_dir: PathBuf::from("data"),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            loader: LoaderConfig::default(),
            embedder: EmbedConfig::default(),
        }
    }
}

impl SiftConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| RetrievalError::configuration(format!("invalid configuration: {e}")))
    }

    /// Read a configuration file. The result is not yet validated.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            RetrievalError::configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn with_corpus_dir(mut self, corpus_dir: impl Into<PathBuf>) -> Self {
        self.corpus_dir = corpus_dir.into();
        self
    }

    /// Reject any setting that would make a later operation fail.
    pub fn validate(&self) -> Result<()> {
        if self.corpus_dir.as_os_str().is_empty() {
            return Err(RetrievalError::configuration("corpus_dir must not be empty"));
        }
        if self.retrieval.top_k == 0 {
            return Err(RetrievalError::configuration("top_k must be at least 1"));
        }
        ChunkingStrategy::new(self.chunking.clone())?;
        self.loader.validate()?;
        self.embedder.validate()?;
        Ok(())
    }
}
