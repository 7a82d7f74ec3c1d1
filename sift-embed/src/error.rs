//! Error types for the embedding system

/// Result type for embedding operations.
///
/// This is a convenience type alias that uses [`EmbedError`] as the error type.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type for all embedding operations.
///
/// Covers configuration problems, model loading failures, and failures of the
/// embedding collaborator itself. Failures are always reported, never papered
/// over with zero vectors.
///
/// # Error Categories
///
/// - **Configuration Errors**: invalid settings, unknown models, missing keys
/// - **Initialization Errors**: failures while loading a local model
/// - **Embedding Failures**: the provider could not produce vectors; split into
///   transient ([`EmbedError::Unavailable`]) and permanent
///   ([`EmbedError::EmbeddingFailure`]) so callers know what to retry
/// - **IO / Task Errors**: file system and `spawn_blocking` failures
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// Error when provider configuration is invalid
    #[error("Invalid embedding configuration: {message}")]
    InvalidConfig { message: String },

    /// Error during model initialization
    #[error("Model initialization failed: {source}")]
    ModelInitialization {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The provider rejected or failed the request
    #[error("Embedding failure: {reason}")]
    EmbeddingFailure { reason: String },

    /// The provider is temporarily unavailable (rate limited, overloaded, timed out)
    #[error("Embedding provider unavailable: {reason}")]
    Unavailable { reason: String },

    /// A vector came back with an unexpected length
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// IO errors when reading model files
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Async task join errors
    #[error("Async task failed: {source}")]
    AsyncTask {
        #[from]
        source: tokio::task::JoinError,
    },

    /// Generic errors from other libraries
    #[error("External error: {source}")]
    External {
        #[from]
        source: anyhow::Error,
    },
}

impl EmbedError {
    /// Create a model initialization error from any error type.
    pub fn model_init<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ModelInitialization {
            source: Box::new(source),
        }
    }

    /// Create a permanent embedding failure with a reason.
    pub fn failure<S: Into<String>>(reason: S) -> Self {
        Self::EmbeddingFailure {
            reason: reason.into(),
        }
    }

    /// Create a transient (retryable) embedding failure with a reason.
    pub fn unavailable<S: Into<String>>(reason: S) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
