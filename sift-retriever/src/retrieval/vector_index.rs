//! Exact in-memory vector index.
//!
//! Vectors are L2-normalized at build time, so cosine similarity is a plain
//! dot product. Search is a linear scan over every entry; results are sorted
//! by descending score with ties kept in insertion order, which makes the
//! output deterministic for identical inputs.

use crate::document::Chunk;
use crate::error::{RetrievalError, Result};
use serde::Serialize;
use sift_embed::{ModelIdentity, normalize_l2};
use std::cmp::Ordering;
use std::collections::HashSet;

/// A chunk together with its embedding vector.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub score: f32,
}

/// All embedded chunks of one build generation.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    model: ModelIdentity,
    entries: Vec<EmbeddedChunk>,
}

impl VectorIndex {
    /// An index with no entries; searching it yields no results.
    pub fn empty(model: ModelIdentity) -> Self {
        Self {
            model,
            entries: Vec::new(),
        }
    }

    /// Build an index from embedded chunks, replacing nothing and sharing
    /// nothing with any previous index.
    ///
    /// Every vector must have exactly `model.dimension` finite components.
    pub fn build(model: ModelIdentity, embedded: Vec<EmbeddedChunk>) -> Result<Self> {
        if model.dimension == 0 {
            return Err(RetrievalError::configuration(
                "embedding dimension must be at least 1",
            ));
        }

        let mut entries = Vec::with_capacity(embedded.len());
        for mut entry in embedded {
            if entry.vector.len() != model.dimension {
                return Err(RetrievalError::DimensionMismatch {
                    expected: model.dimension,
                    actual: entry.vector.len(),
                });
            }
            if entry.vector.iter().any(|value| !value.is_finite()) {
                return Err(RetrievalError::configuration(format!(
                    "non-finite embedding for chunk {} of {}",
                    entry.chunk.ordinal, entry.chunk.metadata.filename
                )));
            }
            normalize_l2(&mut entry.vector);
            entries.push(entry);
        }

        Ok(Self { model, entries })
    }

    pub fn model(&self) -> &ModelIdentity {
        &self.model
    }

    pub fn dimension(&self) -> usize {
        self.model.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Chunks in insertion order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|entry| &entry.chunk)
    }

    /// Number of distinct documents contributing chunks.
    pub fn document_count(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| entry.chunk.document_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Return at most `k` entries most similar to `query`, best first.
    ///
    /// # Errors
    /// - [`RetrievalError::Configuration`] when `k == 0`
    /// - [`RetrievalError::DimensionMismatch`] when the query length differs
    ///   from the index dimension
    /// - [`RetrievalError::Configuration`] when the query has a NaN or
    ///   infinite component
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Err(RetrievalError::configuration("k must be at least 1"));
        }
        if query.len() != self.model.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.model.dimension,
                actual: query.len(),
            });
        }
        if query.iter().any(|value| !value.is_finite()) {
            return Err(RetrievalError::configuration("non-finite query embedding"));
        }

        let mut query = query.to_vec();
        normalize_l2(&mut query);

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (idx, dot(&query, &entry.vector)))
            .collect();

        // Stable sort: equal scores keep insertion order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(idx, score)| SearchResult {
                chunk: self.entries[idx].chunk.clone(),
                score,
            })
            .collect())
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
