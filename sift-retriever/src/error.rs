//! Error types for corpus loading, indexing and retrieval

use sift_context::SplitError;
use sift_embed::{EmbedError, ModelIdentity};
use std::path::PathBuf;

/// Result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Error type for all retrieval operations.
///
/// Configuration errors (bad sizes, mismatched dimensions or models, `k == 0`)
/// are fatal for the operation that hit them. Embedding failures come from the
/// provider after its own retries are exhausted. Per-document read failures
/// only surface here under the abort policy; otherwise they are collected in
/// the build report. An empty index is not an error.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid chunking configuration: {source}")]
    Chunking {
        #[from]
        source: SplitError,
    },

    #[error("Vector dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding model mismatch: index was built with {index}, embedder is {embedder}")]
    ModelMismatch {
        index: ModelIdentity,
        embedder: ModelIdentity,
    },

    #[error("Embedding failure: {source}")]
    Embedding {
        #[from]
        source: EmbedError,
    },

    #[error("Failed to read document {}: {reason}", path.display())]
    DocumentRead { path: PathBuf, reason: String },

    #[error("Corpus source unavailable at {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl RetrievalError {
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn invalid_request<S: Into<String>>(message: S) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Whether this error stems from configuration rather than data or the
    /// embedding provider being unavailable.
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Configuration { .. }
            | Self::Chunking { .. }
            | Self::DimensionMismatch { .. }
            | Self::ModelMismatch { .. } => true,
            Self::Embedding { source } => matches!(
                source,
                EmbedError::InvalidConfig { .. } | EmbedError::DimensionMismatch { .. }
            ),
            _ => false,
        }
    }
}
