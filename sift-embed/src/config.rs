//! Configuration for embedding providers

use crate::error::{EmbedError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which embedding backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Deterministic feature-hashing embedder; needs no model files or network
    #[default]
    Hashing,
    /// Local ONNX model through fastembed
    FastEmbed,
    /// Google Gemini embedding API
    Gemini,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Hashing => write!(f, "hashing"),
            ProviderKind::FastEmbed => write!(f, "fastembed"),
            ProviderKind::Gemini => write!(f, "gemini"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hashing" | "hash" => Ok(ProviderKind::Hashing),
            "fastembed" | "local" => Ok(ProviderKind::FastEmbed),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            _ => Err(format!(
                "Invalid embedding provider: '{s}'. Valid values are: hashing, fastembed, gemini"
            )),
        }
    }
}

/// Retry behaviour for transient provider failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 disables retrying)
    pub max_retries: u32,
    /// Delay before the first retry, doubled on every further retry
    pub initial_backoff_ms: u64,
    /// Upper bound for a single delay
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

impl RetryConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

/// Configuration for an embedding provider.
///
/// Every field has a default, so a TOML table only needs the keys it wants to
/// change:
///
/// ```
/// use sift_embed::{EmbedConfig, ProviderKind};
///
/// let config: EmbedConfig = serde_json::from_str(r#"{"kind": "gemini"}"#).unwrap();
/// assert_eq!(config.kind, ProviderKind::Gemini);
/// assert_eq!(config.model_name(), "embedding-001");
/// assert_eq!(config.batch_size, 16);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    /// Backend to use
    pub kind: ProviderKind,
    /// Model name; `None` selects the backend's default model
    pub model: Option<String>,
    /// Output dimension; `None` selects the backend's default
    pub dimension: Option<usize>,
    /// Maximum number of texts sent in one provider call
    pub batch_size: usize,
    /// Environment variable holding the API key (remote backends only)
    pub api_key_env: String,
    /// Override for the remote API base URL
    pub base_url: Option<String>,
    /// Timeout for a single remote request
    pub request_timeout_secs: u64,
    /// Retry behaviour for transient failures
    pub retry: RetryConfig,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            model: None,
            dimension: None,
            batch_size: 16,
            api_key_env: "GEMINI_API_KEY".to_string(),
            base_url: None,
            request_timeout_secs: 30,
            retry: RetryConfig::default(),
        }
    }
}

impl EmbedConfig {
    /// Configuration for the offline hashing embedder with the given dimension.
    pub fn hashing(dimension: usize) -> Self {
        Self {
            kind: ProviderKind::Hashing,
            dimension: Some(dimension),
            ..Self::default()
        }
    }

    /// Configuration for a local fastembed model.
    pub fn fastembed(model: impl Into<String>) -> Self {
        Self {
            kind: ProviderKind::FastEmbed,
            model: Some(model.into()),
            ..Self::default()
        }
    }

    /// Configuration for a Gemini embedding model.
    pub fn gemini(model: impl Into<String>) -> Self {
        Self {
            kind: ProviderKind::Gemini,
            model: Some(model.into()),
            ..Self::default()
        }
    }

    /// Set the batch size for embedding generation (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    /// Set the retry behaviour (builder style)
    pub fn with_retry(self, retry: RetryConfig) -> Self {
        Self { retry, ..self }
    }

    /// Model name, falling back to the backend's default model.
    pub fn model_name(&self) -> &str {
        match (&self.model, self.kind) {
            (Some(model), _) => model,
            (None, ProviderKind::Hashing) => "fnv-bag-of-words",
            (None, ProviderKind::FastEmbed) => "all-MiniLM-L6-v2",
            (None, ProviderKind::Gemini) => "embedding-001",
        }
    }

    /// Output dimension, falling back to the backend's default.
    ///
    /// Local models report their real dimension once loaded, so this is only
    /// authoritative for the hashing and Gemini backends.
    pub fn dimension(&self) -> usize {
        match (self.dimension, self.kind) {
            (Some(dimension), _) => dimension,
            (None, ProviderKind::Hashing) => 256,
            (None, ProviderKind::FastEmbed) => 384,
            (None, ProviderKind::Gemini) => 768,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Reject values that can never work before any provider is built.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(EmbedError::invalid_config("batch_size must be at least 1"));
        }
        if self.dimension == Some(0) {
            return Err(EmbedError::invalid_config("dimension must be at least 1"));
        }
        if self.model_name().trim().is_empty() {
            return Err(EmbedError::invalid_config("model name must not be empty"));
        }
        if self.kind == ProviderKind::Gemini && self.request_timeout_secs == 0 {
            return Err(EmbedError::invalid_config(
                "request_timeout_secs must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = EmbedConfig::default();

        assert_eq!(config.kind, ProviderKind::Hashing);
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.dimension(), 256);
        assert_eq!(config.model_name(), "fnv-bag-of-words");
        assert_eq!(config.retry.max_retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backend_defaults() {
        assert_eq!(EmbedConfig::gemini("embedding-001").dimension(), 768);
        assert_eq!(
            EmbedConfig::fastembed("bge-small-en-v1.5").model_name(),
            "bge-small-en-v1.5"
        );
        assert_eq!(EmbedConfig::hashing(64).dimension(), 64);
    }

    #[test]
    fn test_config_builder_methods() {
        let config = EmbedConfig::hashing(32)
            .with_batch_size(64)
            .with_retry(RetryConfig {
                max_retries: 0,
                ..RetryConfig::default()
            });

        assert_eq!(config.batch_size, 64);
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.retry.initial_backoff(), Duration::from_millis(500));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(EmbedConfig::default().with_batch_size(0).validate().is_err());
        assert!(EmbedConfig::hashing(0).validate().is_err());

        let blank = EmbedConfig {
            model: Some("  ".to_string()),
            ..EmbedConfig::default()
        };
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_provider_kind_from_str() {
        assert_eq!("Gemini".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert_eq!("local".parse::<ProviderKind>().unwrap(), ProviderKind::FastEmbed);
        assert_eq!("hash".parse::<ProviderKind>().unwrap(), ProviderKind::Hashing);
        assert!("openai".parse::<ProviderKind>().is_err());
        assert_eq!(ProviderKind::FastEmbed.to_string(), "fastembed");
    }
}
