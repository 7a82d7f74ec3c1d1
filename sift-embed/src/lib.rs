//! # sift-embed
//!
//! Text embedding providers behind one async trait. Three backends ship with
//! the crate:
//!
//! - [`HashingEmbedder`]: deterministic FNV feature hashing, no model files or
//!   network; the default and the backend used in tests
//! - [`FastEmbedProvider`]: local ONNX models through fastembed, loaded once
//!   per process and cached
//! - [`GeminiEmbeddingProvider`]: the Google Gemini embedding API
//!
//! [`create_provider`] builds the backend named in an [`EmbedConfig`] and
//! wraps it in a [`RetryingProvider`] so rate limits and server errors are
//! retried with exponential backoff.
//!
//! ## Quick Start
//!
//! ```
//! use sift_embed::{EmbedConfig, create_provider};
//!
//! # async fn example() -> sift_embed::Result<()> {
//! let provider = create_provider(&EmbedConfig::hashing(256)).await?;
//!
//! let texts = vec!["Hello world".to_string(), "How are you?".to_string()];
//! let result = provider.embed_texts(&texts).await?;
//!
//! assert_eq!(result.len(), 2);
//! assert_eq!(result.dimension, 256);
//! # Ok(())
//! # }
//! ```
//!
//! All vectors are L2-normalized `f32`. Every operation returns
//! [`Result<T>`] with the crate's [`EmbedError`]; use
//! [`EmbedError::is_transient`] to tell retryable failures apart.

pub mod config;
pub mod error;
pub mod gemini;
pub mod hashing;
pub mod provider;
pub mod retry;

pub use config::{EmbedConfig, ProviderKind, RetryConfig};
pub use error::{EmbedError, Result};
pub use gemini::GeminiEmbeddingProvider;
pub use hashing::HashingEmbedder;
pub use provider::{
    EmbeddingProvider, EmbeddingResult, FastEmbedProvider, ModelIdentity, create_provider,
    normalize_l2,
};
pub use retry::RetryingProvider;
