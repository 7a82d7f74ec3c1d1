//! Embedding provider trait and the local FastEmbed implementation

use crate::config::{EmbedConfig, ProviderKind};
use crate::error::{EmbedError, Result};
use crate::gemini::GeminiEmbeddingProvider;
use crate::hashing::HashingEmbedder;
use crate::retry::RetryingProvider;
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use fnv::FnvHasher;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hasher;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

/// Result of embedding generation
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    /// The generated embeddings, one per input text
    pub embeddings: Vec<Vec<f32>>,
    /// The dimension of each embedding vector
    pub dimension: usize,
}

impl EmbeddingResult {
    /// Create a new embedding result.
    ///
    /// The dimension is inferred from the first embedding vector, or 0 when
    /// there are none.
    pub fn new(embeddings: Vec<Vec<f32>>) -> Self {
        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);
        Self {
            embeddings,
            dimension,
        }
    }

    /// Returns the number of embedding vectors in this result.
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// Returns `true` if this result contains no embedding vectors.
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Which embedding model produced a set of vectors.
///
/// Vectors from different identities are not comparable, so an index records
/// the identity it was built with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelIdentity {
    pub provider: String,
    pub model: String,
    pub dimension: usize,
}

impl ModelIdentity {
    pub fn new(provider: impl Into<String>, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            dimension,
        }
    }
}

impl std::fmt::Display for ModelIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} ({}d)", self.provider, self.model, self.dimension)
    }
}

/// Trait for embedding providers that can generate embeddings from text
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, one vector per input in order
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult>;

    /// Get the dimension of embeddings produced by this provider
    fn embedding_dimension(&self) -> usize;

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;

    /// Get the name of the model behind this provider
    fn model_name(&self) -> &str;

    fn identity(&self) -> ModelIdentity {
        ModelIdentity::new(
            self.provider_name(),
            self.model_name(),
            self.embedding_dimension(),
        )
    }
}

#[async_trait]
impl<P: EmbeddingProvider + ?Sized> EmbeddingProvider for Arc<P> {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed_text(text).await
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        (**self).embed_texts(texts).await
    }

    fn embedding_dimension(&self) -> usize {
        (**self).embedding_dimension()
    }

    fn provider_name(&self) -> &str {
        (**self).provider_name()
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Scale a vector to unit length in place. Zero vectors are left untouched.
///
/// The norm is accumulated in `f64` so finite components near `f32::MAX`
/// do not overflow it.
pub fn normalize_l2(vector: &mut [f32]) {
    let norm = vector
        .iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt();
    if norm > 0.0 && norm.is_finite() {
        for value in vector.iter_mut() {
            *value = (f64::from(*value) / norm) as f32;
        }
    }
}

/// Build the provider described by `config`, wrapped with retries for
/// transient failures.
pub async fn create_provider(config: &EmbedConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    config.validate()?;
    let retry = config.retry.clone();

    let provider: Arc<dyn EmbeddingProvider> = match config.kind {
        ProviderKind::Hashing => Arc::new(RetryingProvider::new(
            HashingEmbedder::new(config.dimension())?,
            retry,
        )),
        ProviderKind::FastEmbed => Arc::new(RetryingProvider::new(
            FastEmbedProvider::create(config.clone()).await?,
            retry,
        )),
        ProviderKind::Gemini => Arc::new(RetryingProvider::new(
            GeminiEmbeddingProvider::from_config(config)?,
            retry,
        )),
    };

    tracing::info!("Embedding provider ready: {}", provider.identity());
    Ok(provider)
}

/// Type alias for cached model entries (model, dimension)
type ModelCacheEntry = (Arc<Mutex<TextEmbedding>>, usize);

/// Global cache for initialized embedding models to avoid reloading
static MODEL_CACHE: OnceLock<Mutex<HashMap<String, ModelCacheEntry>>> = OnceLock::new();

fn lock_model_cache() -> MutexGuard<'static, HashMap<String, ModelCacheEntry>> {
    MODEL_CACHE
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Map a configured model name onto one of fastembed's built-in models.
fn builtin_model(name: &str) -> Result<EmbeddingModel> {
    match name.to_lowercase().as_str() {
        "all-minilm-l6-v2" | "sentence-transformers/all-minilm-l6-v2" => {
            Ok(EmbeddingModel::AllMiniLML6V2)
        }
        "bge-small-en-v1.5" | "baai/bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" | "baai/bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        _ => Err(EmbedError::invalid_config(format!(
            "Unknown fastembed model '{name}'. Supported: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5"
        ))),
    }
}

/// FastEmbed-based embedding provider using local ONNX models
#[derive(Clone)]
pub struct FastEmbedProvider {
    config: EmbedConfig,
    model: Option<Arc<Mutex<TextEmbedding>>>,
    dimension: usize,
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("config", &self.config)
            .field("model", &self.model.is_some())
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl FastEmbedProvider {
    /// Creates a new uninitialized provider. Call [`initialize`](Self::initialize)
    /// or use [`create`](Self::create) before embedding.
    pub fn new(config: EmbedConfig) -> Self {
        let dimension = config.dimension();
        Self {
            config,
            model: None,
            dimension,
        }
    }

    /// Loads the embedding model, reusing an already loaded instance when one
    /// exists for the same model name.
    pub async fn initialize(&mut self) -> Result<()> {
        let model_name = self.config.model_name().to_string();
        tracing::info!("Initializing FastEmbed provider for model: {}", model_name);

        let builtin = builtin_model(&model_name)?;
        let cache_key = self.create_cache_key();

        let cached = lock_model_cache()
            .get(&cache_key)
            .map(|(model, dim)| (Arc::clone(model), *dim));

        if let Some((cached_model, cached_dimension)) = cached {
            tracing::info!("Using cached model for: {}", model_name);
            self.model = Some(cached_model);
            self.dimension = cached_dimension;
            return self.validate_model().await;
        }

        let (model, dimension) =
            tokio::task::spawn_blocking(move || -> Result<(TextEmbedding, usize)> {
                tracing::info!("Loading embedding model: {}", model_name);

                let init_options = InitOptions::new(builtin).with_show_download_progress(false);
                let mut model = TextEmbedding::try_new(init_options)
                    .map_err(|e| EmbedError::External { source: e })?;

                let probe = model
                    .embed(vec!["dimension probe".to_string()], None)
                    .map_err(|e| EmbedError::External { source: e })?;
                let dimension = probe
                    .first()
                    .map(|emb| emb.len())
                    .ok_or_else(|| EmbedError::failure("model returned no probe embedding"))?;

                tracing::info!("Model loaded successfully. Dimension: {}", dimension);
                Ok((model, dimension))
            })
            .await??;

        let model_arc = Arc::new(Mutex::new(model));
        lock_model_cache().insert(cache_key, (Arc::clone(&model_arc), dimension));

        self.model = Some(model_arc);
        self.dimension = dimension;
        self.validate_model().await
    }

    /// Creates and initializes a provider in one step.
    pub async fn create(config: EmbedConfig) -> Result<Self> {
        let mut provider = Self::new(config);
        provider.initialize().await?;
        Ok(provider)
    }

    /// Cache key derived from the model name only; batch size and retry
    /// settings do not change the loaded weights.
    fn create_cache_key(&self) -> String {
        let mut hasher = FnvHasher::default();
        hasher.write(b"v1:");
        hasher.write(self.config.model_name().to_lowercase().as_bytes());
        format!("v1:{:x}", hasher.finish())
    }

    async fn validate_model(&self) -> Result<()> {
        let embedding = self.embed_text("validation test").await?;

        if embedding.len() != self.dimension {
            return Err(EmbedError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        if embedding.iter().any(|value| !value.is_finite()) {
            return Err(EmbedError::invalid_config(
                "Model validation failed: non-finite values in embedding",
            ));
        }

        tracing::debug!("Model validation passed for: {}", self.config.model_name());
        Ok(())
    }

    /// Clears the global model cache.
    pub fn clear_cache() {
        lock_model_cache().clear();
        tracing::info!("Model cache cleared");
    }

    /// Returns the number of cached models.
    pub fn cache_size() -> usize {
        lock_model_cache().len()
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let texts = vec![text.to_string()];
        let result = self.embed_texts(&texts).await?;
        result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::failure("No embedding generated for text"))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult::new(vec![]));
        }

        let model = self.model.as_ref().ok_or_else(|| {
            EmbedError::invalid_config("Model not initialized. Call initialize() first.")
        })?;

        tracing::debug!("Generating embeddings for {} texts", texts.len());

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.config.batch_size) {
            let chunk = chunk.to_vec();
            let model_clone = Arc::clone(model);

            let batch = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
                let mut model_guard = model_clone
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                model_guard
                    .embed(chunk, None)
                    .map_err(|e| EmbedError::External { source: e })
            })
            .await??;

            for mut embedding in batch {
                normalize_l2(&mut embedding);
                all_embeddings.push(embedding);
            }
        }

        if all_embeddings.len() != texts.len() {
            return Err(EmbedError::failure(format!(
                "expected {} embeddings, model returned {}",
                texts.len(),
                all_embeddings.len()
            )));
        }

        tracing::debug!("Generated {} embeddings", all_embeddings.len());
        Ok(EmbeddingResult::new(all_embeddings))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "fastembed"
    }

    fn model_name(&self) -> &str {
        self.config.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_result() {
        let result = EmbeddingResult::new(vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]]);

        assert_eq!(result.len(), 2);
        assert_eq!(result.dimension, 3);
        assert!(!result.is_empty());

        let empty = EmbeddingResult::new(vec![]);
        assert!(empty.is_empty());
        assert_eq!(empty.dimension, 0);
    }

    #[test]
    fn test_normalize_l2() {
        let mut v = vec![3.0, 4.0];
        normalize_l2(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        normalize_l2(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn test_normalize_l2_large_magnitude() {
        let mut v = vec![1e30, 0.0];
        normalize_l2(&mut v);
        assert_eq!(v, vec![1.0, 0.0]);

        let mut v = vec![f32::MAX, f32::MAX];
        normalize_l2(&mut v);
        assert!((v[0] - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!((v[1] - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn test_model_identity_display() {
        let identity = ModelIdentity::new("gemini", "embedding-001", 768);
        assert_eq!(identity.to_string(), "gemini/embedding-001 (768d)");
    }

    #[test]
    fn test_fastembed_provider_creation() {
        let provider = FastEmbedProvider::new(EmbedConfig::fastembed("all-MiniLM-L6-v2"));

        assert_eq!(provider.provider_name(), "fastembed");
        assert_eq!(provider.model_name(), "all-MiniLM-L6-v2");
        assert_eq!(provider.embedding_dimension(), 384);
    }

    #[test]
    fn test_builtin_model_lookup() {
        assert!(builtin_model("all-MiniLM-L6-v2").is_ok());
        assert!(builtin_model("BAAI/bge-small-en-v1.5").is_ok());
        assert!(matches!(
            builtin_model("ModernBERT-large"),
            Err(EmbedError::InvalidConfig { .. })
        ));
    }

    #[tokio::test]
    async fn test_uninitialized_provider_errors() {
        let provider = FastEmbedProvider::new(EmbedConfig::fastembed("all-MiniLM-L6-v2"));
        let err = provider
            .embed_texts(&["hello".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, EmbedError::InvalidConfig { .. }));
    }

    #[test]
    fn test_cache_key_generation() {
        let key1 = FastEmbedProvider::new(EmbedConfig::fastembed("all-MiniLM-L6-v2"))
            .create_cache_key();
        let key2 = FastEmbedProvider::new(
            EmbedConfig::fastembed("all-minilm-l6-v2").with_batch_size(64),
        )
        .create_cache_key();
        let key3 = FastEmbedProvider::new(EmbedConfig::fastembed("bge-small-en-v1.5"))
            .create_cache_key();

        assert!(key1.starts_with("v1:"));
        assert_eq!(key1, key2, "batch size and case must not change the key");
        assert_ne!(key1, key3);
    }

    #[tokio::test]
    async fn test_create_hashing_provider() {
        let provider = create_provider(&EmbedConfig::hashing(64)).await.unwrap();
        assert_eq!(
            provider.identity(),
            ModelIdentity::new("hashing", "fnv-bag-of-words", 64)
        );
    }

    #[tokio::test]
    async fn test_create_provider_rejects_invalid_config() {
        let result = create_provider(&EmbedConfig::hashing(64).with_batch_size(0)).await;
        assert!(matches!(result, Err(EmbedError::InvalidConfig { .. })));
    }

    #[tokio::test]
    #[ignore] // Downloads a real model - run with: cargo test test_fastembed_semantics -- --ignored
    async fn test_fastembed_semantics() -> Result<()> {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .try_init()
            .ok();

        let provider = FastEmbedProvider::create(EmbedConfig::fastembed("all-MiniLM-L6-v2")).await?;
        assert_eq!(FastEmbedProvider::cache_size(), 1);

        let texts = vec![
            "The sky is blue.".to_string(),
            "What color is the sky?".to_string(),
            "Bananas are yellow.".to_string(),
        ];
        let result = provider.embed_texts(&texts).await?;
        assert_eq!(result.len(), 3);

        let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
        let sky = dot(&result.embeddings[1], &result.embeddings[0]);
        let banana = dot(&result.embeddings[1], &result.embeddings[2]);
        assert!(sky > banana, "sky={sky} banana={banana}");

        FastEmbedProvider::clear_cache();
        assert_eq!(FastEmbedProvider::cache_size(), 0);
        Ok(())
    }
}
