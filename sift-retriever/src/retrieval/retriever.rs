use crate::error::{RetrievalError, Result};
use crate::retrieval::index_handle::{IndexHandle, IndexSnapshot};
use crate::retrieval::vector_index::SearchResult;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sift_embed::EmbeddingProvider;
use std::sync::Arc;

/// Separator placed between chunk texts in an assembled context.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

const NO_REFERENCE: &str = "No reference available";
const UNKNOWN_FILE: &str = "Unknown file";

/// A ranked chunk as handed to callers of the retriever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub score: f32,
    pub reference: Option<String>,
    pub filename: String,
}

impl RetrievedChunk {
    /// Reference when present, filename otherwise.
    pub fn citation_key(&self) -> &str {
        self.reference.as_deref().unwrap_or(&self.filename)
    }
}

impl From<SearchResult> for RetrievedChunk {
    fn from(result: SearchResult) -> Self {
        Self {
            text: result.chunk.text,
            score: result.score,
            reference: result.chunk.metadata.reference,
            filename: result.chunk.metadata.filename,
        }
    }
}

/// Client-facing citation for one retrieved chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub reference: String,
    pub filename: String,
}

impl From<&RetrievedChunk> for Source {
    fn from(chunk: &RetrievedChunk) -> Self {
        Self {
            reference: chunk
                .reference
                .clone()
                .unwrap_or_else(|| NO_REFERENCE.to_string()),
            filename: if chunk.filename.is_empty() {
                UNKNOWN_FILE.to_string()
            } else {
                chunk.filename.clone()
            },
        }
    }
}

/// Join chunk texts, best first, into the context string for answer
/// generation.
pub fn assemble_context(results: &[RetrievedChunk]) -> String {
    results.iter().map(|r| r.text.as_str()).join(CONTEXT_SEPARATOR)
}

/// Keep the first (highest-scoring) chunk for every citation key.
pub fn dedup_by_citation(results: Vec<RetrievedChunk>) -> Vec<RetrievedChunk> {
    results
        .into_iter()
        .unique_by(|r| r.citation_key().to_string())
        .collect()
}

/// Query-time façade: embeds the question and searches the live index.
#[derive(Clone)]
pub struct Retriever {
    handle: Arc<IndexHandle>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    pub fn new(handle: Arc<IndexHandle>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { handle, embedder }
    }

    /// Top `k` chunks for `query`, best first.
    ///
    /// An empty or not-yet-built index yields an empty result without calling
    /// the embedder. The whole call runs against one snapshot even if a new
    /// generation is published meanwhile.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        self.retrieve_in(&self.handle.snapshot(), query, k).await
    }

    /// Search a snapshot the caller already holds.
    pub async fn retrieve_in(
        &self,
        snapshot: &IndexSnapshot,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        if k == 0 {
            return Err(RetrievalError::configuration("k must be at least 1"));
        }

        if snapshot.index.is_empty() {
            tracing::debug!(
                "Generation {} is empty, nothing to retrieve",
                snapshot.generation
            );
            return Ok(Vec::new());
        }

        let identity = self.embedder.identity();
        if &identity != snapshot.index.model() {
            return Err(RetrievalError::ModelMismatch {
                index: snapshot.index.model().clone(),
                embedder: identity,
            });
        }

        let query_vector = self.embedder.embed_text(query).await?;
        let results = snapshot.index.search(&query_vector, k)?;

        tracing::debug!(
            "Retrieved {} chunks from generation {}",
            results.len(),
            snapshot.generation
        );
        Ok(results.into_iter().map(RetrievedChunk::from).collect())
    }

    /// Like [`retrieve`](Self::retrieve), keeping only the first chunk per
    /// citation.
    pub async fn retrieve_unique(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        Ok(dedup_by_citation(self.retrieve(query, k).await?))
    }
}
