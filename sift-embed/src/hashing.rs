//! Deterministic bag-of-words embedder based on feature hashing.
//!
//! Every lowercase alphanumeric token is hashed with FNV-1a into one of
//! `dimension` buckets and the bucket counts are L2-normalized. Texts that
//! share words get a positive cosine similarity; texts with disjoint
//! vocabularies score (almost always) zero. No model files or network access
//! are needed, which makes this the default for tests and offline use.

use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingResult, normalize_l2};
use async_trait::async_trait;
use fnv::FnvHasher;
use std::hash::Hasher;

const MODEL_NAME: &str = "fnv-bag-of-words";

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(EmbedError::invalid_config(
                "hashing embedder dimension must be at least 1",
            ));
        }
        Ok(Self { dimension })
    }

    /// Embed synchronously; never fails.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in tokens(text) {
            let mut hasher = FnvHasher::default();
            hasher.write(token.as_bytes());
            let bucket = (hasher.finish() % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }
        normalize_l2(&mut vector);
        vector
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        let embeddings: Vec<Vec<f32>> = texts.iter().map(|text| self.embed(text)).collect();
        Ok(EmbeddingResult {
            embeddings,
            dimension: self.dimension,
        })
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "hashing"
    }

    fn model_name(&self) -> &str {
        MODEL_NAME
    }
}
