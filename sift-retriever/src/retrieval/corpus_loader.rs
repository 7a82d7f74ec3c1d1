//! Corpus loading: discover → read → chunk → embed → index.
//!
//! A load always produces a brand-new [`VectorIndex`]; nothing is shared with
//! the index currently serving queries. Publishing the result is the job of
//! [`IndexHandle`](crate::retrieval::index_handle::IndexHandle).
//!
//! Per-document read failures follow the configured [`FailurePolicy`].
//! Embedding failures always abort the load; no vector is ever zero-filled.

use crate::document::{Chunk, Document};
use crate::error::{RetrievalError, Result};
use crate::retrieval::chunking_strategy::ChunkingStrategy;
use crate::retrieval::vector_index::{EmbeddedChunk, VectorIndex};
use crate::storage::DocumentStore;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt, stream};
use serde::{Deserialize, Serialize};
use sift_embed::{EmbedError, EmbeddingProvider};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What to do when a single document cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Record the failure in the build report and keep going
    #[default]
    #[serde(rename = "skip")]
    SkipAndContinue,
    /// Fail the whole build
    #[serde(rename = "abort")]
    Abort,
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" | "skip-and-continue" => Ok(FailurePolicy::SkipAndContinue),
            "abort" => Ok(FailurePolicy::Abort),
            _ => Err(format!("Invalid failure policy: {s}. Valid values are: skip, abort")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub failure_policy: FailurePolicy,
    /// Chunks sent to the embedder per call
    pub embed_batch_size: usize,
    /// Embedding calls allowed in flight at once
    pub max_concurrent_requests: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            embed_batch_size: 16,
            max_concurrent_requests: 4,
        }
    }
}

impl LoaderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.embed_batch_size == 0 {
            return Err(RetrievalError::configuration(
                "embed_batch_size must be at least 1",
            ));
        }
        if self.max_concurrent_requests == 0 {
            return Err(RetrievalError::configuration(
                "max_concurrent_requests must be at least 1",
            ));
        }
        Ok(())
    }
}

/// A document that was left out of a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Summary of one corpus build.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildReport {
    pub generation: u64,
    pub started_at: DateTime<Utc>,
    pub documents_loaded: usize,
    pub chunks_indexed: usize,
    pub failures: Vec<DocumentFailure>,
    pub elapsed: Duration,
}

impl BuildReport {
    /// Report for the placeholder index that exists before the first build.
    pub fn initial() -> Self {
        Self {
            generation: 0,
            started_at: Utc::now(),
            documents_loaded: 0,
            chunks_indexed: 0,
            failures: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }
}

#[derive(Debug)]
pub struct LoadOutcome {
    pub index: VectorIndex,
    pub report: BuildReport,
}

pub struct CorpusLoader {
    store: DocumentStore,
    chunking: ChunkingStrategy,
    embedder: Arc<dyn EmbeddingProvider>,
    config: LoaderConfig,
}

impl CorpusLoader {
    pub fn new(
        store: DocumentStore,
        chunking: ChunkingStrategy,
        embedder: Arc<dyn EmbeddingProvider>,
        config: LoaderConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            chunking,
            embedder,
            config,
        })
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Build a fresh index from the whole corpus, tagging the report with
    /// `generation`.
    pub async fn load(&self, generation: u64) -> Result<LoadOutcome> {
        let started = Instant::now();
        let started_at = Utc::now();
        tracing::info!(
            "Loading corpus from {} (generation {})",
            self.store.root().display(),
            generation
        );

        let (documents, failures) = self.read_documents().await?;

        let chunks: Vec<Chunk> = documents
            .iter()
            .flat_map(|document| self.chunking.chunk_document(document))
            .collect();

        let vectors = self.embed_chunks(&chunks).await?;
        let embedded = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddedChunk { chunk, vector })
            .collect::<Vec<_>>();

        let index = VectorIndex::build(self.embedder.identity(), embedded)?;

        let report = BuildReport {
            generation,
            started_at,
            documents_loaded: documents.len(),
            chunks_indexed: index.len(),
            failures,
            elapsed: started.elapsed(),
        };

        tracing::info!(
            "Built generation {}: {} documents, {} chunks, {} skipped in {:?}",
            generation,
            report.documents_loaded,
            report.chunks_indexed,
            report.failures.len(),
            report.elapsed
        );

        Ok(LoadOutcome { index, report })
    }

    async fn read_documents(&self) -> Result<(Vec<Document>, Vec<DocumentFailure>)> {
        let mut documents = Vec::new();
        let mut failures = Vec::new();

        for path in self.store.discover().await? {
            match self.store.read(&path).await {
                Ok(document) => {
                    tracing::debug!(
                        "Read {} (reference: {:?})",
                        document.metadata.filename,
                        document.metadata.reference
                    );
                    documents.push(document);
                }
                Err(e) => match self.config.failure_policy {
                    FailurePolicy::Abort => {
                        tracing::error!("Aborting build: {}", e);
                        return Err(e);
                    }
                    FailurePolicy::SkipAndContinue => {
                        tracing::warn!("Skipping document {}: {}", path.display(), e);
                        failures.push(DocumentFailure {
                            path,
                            reason: e.to_string(),
                        });
                    }
                },
            }
        }

        Ok((documents, failures))
    }

    /// Embed chunk texts in batches, with at most `max_concurrent_requests`
    /// batches in flight. Vectors come back in chunk order.
    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let batches: Vec<Vec<String>> = chunks
            .chunks(self.config.embed_batch_size)
            .map(|batch| batch.iter().map(|chunk| chunk.text.clone()).collect())
            .collect();
        tracing::debug!(
            "Embedding {} chunks in {} batches",
            chunks.len(),
            batches.len()
        );

        let embedder = &self.embedder;
        let batch_vectors: Vec<Vec<Vec<f32>>> = stream::iter(batches)
            .map(|texts| async move {
                let result = embedder.embed_texts(&texts).await?;
                if result.len() != texts.len() {
                    return Err(EmbedError::failure(format!(
                        "embedder returned {} vectors for {} texts",
                        result.len(),
                        texts.len()
                    )));
                }
                Ok(result.embeddings)
            })
            .buffered(self.config.max_concurrent_requests)
            .try_collect()
            .await
            .map_err(|e| {
                tracing::error!("Aborting build, embedding failed: {}", e);
                RetrievalError::from(e)
            })?;

        Ok(batch_vectors.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::chunking_strategy::ChunkingConfig;
    use async_trait::async_trait;
    use sift_embed::{EmbeddingResult, HashingEmbedder};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;
    use tracing_test::traced_test;

    fn loader_for(
        root: &std::path::Path,
        embedder: Arc<dyn EmbeddingProvider>,
        config: LoaderConfig,
    ) -> CorpusLoader {
        CorpusLoader::new(
            DocumentStore::new(root),
            ChunkingStrategy::new(ChunkingConfig::new(60, 10)).unwrap(),
            embedder,
            config,
        )
        .unwrap()
    }

    fn hashing() -> Arc<dyn EmbeddingProvider> {
        Arc::new(HashingEmbedder::new(64).unwrap())
    }

    /// Fails every call, or returns one vector too few.
    struct BrokenEmbedder {
        short_count: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for BrokenEmbedder {
        async fn embed_text(&self, _text: &str) -> sift_embed::Result<Vec<f32>> {
            Err(EmbedError::failure("service down"))
        }

        async fn embed_texts(&self, texts: &[String]) -> sift_embed::Result<EmbeddingResult> {
            if self.short_count {
                Ok(EmbeddingResult::new(vec![vec![1.0]; texts.len() - 1]))
            } else {
                Err(EmbedError::failure("service down"))
            }
        }

        fn embedding_dimension(&self) -> usize {
            1
        }

        fn provider_name(&self) -> &str {
            "broken"
        }

        fn model_name(&self) -> &str {
            "broken"
        }
    }

    /// Records the highest number of concurrent `embed_texts` calls.
    struct ConcurrencyProbe {
        inner: HashingEmbedder,
        in_flight: AtomicUsize,
        max_seen: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for ConcurrencyProbe {
        async fn embed_text(&self, text: &str) -> sift_embed::Result<Vec<f32>> {
            self.inner.embed_text(text).await
        }

        async fn embed_texts(&self, texts: &[String]) -> sift_embed::Result<EmbeddingResult> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.inner.embed_texts(texts).await
        }

        fn embedding_dimension(&self) -> usize {
            self.inner.embedding_dimension()
        }

        fn provider_name(&self) -> &str {
            "probe"
        }

        fn model_name(&self) -> &str {
            self.inner.model_name()
        }
    }

    #[tokio::test]
    async fn test_load_attaches_metadata() -> anyhow::Result<()> {
        let dir = tempdir()?;
        std::fs::write(
            dir.path().join("a.txt"),
            "reference: http://x\nThe sky is blue.",
        )?;
        std::fs::write(dir.path().join("b.txt"), "Bananas are yellow.")?;

        let outcome = loader_for(dir.path(), hashing(), LoaderConfig::default())
            .load(1)
            .await?;

        assert_eq!(outcome.report.generation, 1);
        assert_eq!(outcome.report.documents_loaded, 2);
        assert_eq!(outcome.report.chunks_indexed, 2);
        assert!(outcome.report.failures.is_empty());

        let chunks: Vec<&Chunk> = outcome.index.chunks().collect();
        assert_eq!(chunks[0].text, "The sky is blue.");
        assert_eq!(chunks[0].metadata.reference.as_deref(), Some("http://x"));
        assert_eq!(chunks[0].metadata.filename, "a.txt");
        assert_eq!(chunks[1].metadata.reference, None);
        assert_eq!(chunks[1].metadata.filename, "b.txt");
        Ok(())
    }

    #[tokio::test]
    async fn test_load_is_idempotent() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let long = "Sentence number one is here. ".repeat(12);
        std::fs::write(dir.path().join("long.md"), &long)?;
        std::fs::write(dir.path().join("short.txt"), "Tiny.")?;

        let loader = loader_for(dir.path(), hashing(), LoaderConfig::default());
        let first = loader.load(1).await?;
        let second = loader.load(2).await?;

        let a: Vec<&Chunk> = first.index.chunks().collect();
        let b: Vec<&Chunk> = second.index.chunks().collect();
        assert!(a.len() > 2);
        assert_eq!(a, b);
        Ok(())
    }

    #[tokio::test]
    #[traced_test]
    async fn test_skip_and_continue() -> anyhow::Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join("good.txt"), "Readable text.")?;
        std::fs::write(dir.path().join("bad.txt"), [0xffu8, 0xfe, 0x00, 0x80])?;

        let outcome = loader_for(dir.path(), hashing(), LoaderConfig::default())
            .load(1)
            .await?;

        assert_eq!(outcome.report.documents_loaded, 1);
        assert_eq!(outcome.report.failures.len(), 1);
        assert!(outcome.report.failures[0].path.ends_with("bad.txt"));
        assert!(logs_contain("Skipping document"));
        Ok(())
    }

    #[tokio::test]
    async fn test_abort_policy() -> anyhow::Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join("good.txt"), "Readable text.")?;
        std::fs::write(dir.path().join("bad.txt"), [0xffu8, 0xfe, 0x00, 0x80])?;

        let config = LoaderConfig {
            failure_policy: FailurePolicy::Abort,
            ..LoaderConfig::default()
        };
        let result = loader_for(dir.path(), hashing(), config).load(1).await;
        assert!(matches!(result, Err(RetrievalError::DocumentRead { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_source_directory() {
        let dir = tempdir().unwrap();
        let result = loader_for(&dir.path().join("nope"), hashing(), LoaderConfig::default())
            .load(1)
            .await;
        assert!(matches!(result, Err(RetrievalError::SourceUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_empty_corpus_skips_embedder() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let embedder = Arc::new(BrokenEmbedder { short_count: false });

        let outcome = loader_for(dir.path(), embedder, LoaderConfig::default())
            .load(1)
            .await?;
        assert!(outcome.index.is_empty());
        assert_eq!(outcome.report.documents_loaded, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_embedding_failure_aborts() -> anyhow::Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join("a.txt"), "Some text.")?;
        std::fs::write(dir.path().join("b.txt"), "More text.")?;

        for short_count in [false, true] {
            let embedder = Arc::new(BrokenEmbedder { short_count });
            let result = loader_for(dir.path(), embedder, LoaderConfig::default())
                .load(1)
                .await;
            assert!(
                matches!(result, Err(RetrievalError::Embedding { .. })),
                "short_count={short_count}"
            );
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_batches_respect_concurrency_limit() -> anyhow::Result<()> {
        let dir = tempdir()?;
        for i in 0..12 {
            std::fs::write(dir.path().join(format!("doc{i:02}.txt")), format!("Document {i}."))?;
        }

        let probe = Arc::new(ConcurrencyProbe {
            inner: HashingEmbedder::new(32)?,
            in_flight: AtomicUsize::new(0),
            max_seen: AtomicUsize::new(0),
        });
        let config = LoaderConfig {
            embed_batch_size: 2,
            max_concurrent_requests: 3,
            ..LoaderConfig::default()
        };

        let outcome = loader_for(dir.path(), probe.clone(), config).load(1).await?;

        let max_seen = probe.max_seen.load(Ordering::SeqCst);
        assert!(max_seen <= 3, "max in flight was {max_seen}");
        assert!(max_seen >= 2, "batches never overlapped");

        // Order is preserved across concurrently embedded batches
        let chunks: Vec<&Chunk> = outcome.index.chunks().collect();
        assert_eq!(chunks.len(), 12);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.text, format!("Document {i}."));
        }
        Ok(())
    }

    #[test]
    fn test_invalid_loader_config() {
        let config = LoaderConfig {
            max_concurrent_requests: 0,
            ..LoaderConfig::default()
        };
        assert!(config.validate().is_err());
        assert!("abort".parse::<FailurePolicy>().is_ok());
        assert!("explode".parse::<FailurePolicy>().is_err());
    }
}
