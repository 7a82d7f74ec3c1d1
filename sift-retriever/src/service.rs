//! Service façade over the retrieval pipeline.
//!
//! [`RagService`] owns the document store, corpus loader, live index and
//! retriever, and exposes the operations an outer layer (CLI, HTTP handler,
//! chat front end) needs through explicit request and response records.

use crate::config::SiftConfig;
use crate::error::{RetrievalError, Result};
use crate::retrieval::chunking_strategy::ChunkingStrategy;
use crate::retrieval::corpus_loader::{BuildReport, CorpusLoader};
use crate::retrieval::index_handle::{IndexHandle, IndexSnapshot, PublishOutcome};
use crate::retrieval::retriever::{
    RetrievedChunk, Retriever, Source, assemble_context, dedup_by_citation,
};
use crate::storage::{DocumentInfo, DocumentStore, FileStats, FileType, NewDocument};
use serde::{Deserialize, Serialize};
use sift_embed::{EmbeddingProvider, ModelIdentity};
use std::path::PathBuf;
use std::sync::Arc;

/// A question against the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Required, must not be blank
    pub question: String,
    /// Number of chunks to return; the configured `top_k` when absent
    #[serde(default)]
    pub k: Option<usize>,
    /// Keep only the best chunk per citation
    #[serde(default)]
    pub unique_sources: bool,
}

impl QueryRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            k: None,
            unique_sources: false,
        }
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    pub fn with_unique_sources(mut self, unique_sources: bool) -> Self {
        self.unique_sources = unique_sources;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Ranked chunks, best first
    pub results: Vec<RetrievedChunk>,
    /// Chunk texts joined for the answer-generation step
    pub context: String,
    /// One citation per result, in the same order
    pub sources: Vec<Source>,
    /// Index generation that answered the query
    pub generation: u64,
}

/// A document to add to the corpus. Title and content are required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddDocumentRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub file_type: FileType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddDocumentResponse {
    /// Where the document was written
    pub path: PathBuf,
    /// Report of the rebuild that picked it up
    pub report: BuildReport,
    pub publish: PublishOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusStats {
    pub generation: u64,
    pub chunk_count: usize,
    pub document_count: usize,
    pub model: ModelIdentity,
    pub file_stats: FileStats,
    pub last_build: BuildReport,
}

pub struct RagService {
    config: SiftConfig,
    loader: CorpusLoader,
    handle: Arc<IndexHandle>,
    retriever: Retriever,
}

impl RagService {
    /// Wire up the pipeline. Nothing is indexed until [`rebuild`](Self::rebuild)
    /// runs; until then every query returns an empty result.
    pub fn open(config: SiftConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        config.validate()?;

        let chunking = ChunkingStrategy::new(config.chunking.clone())?;
        let store = DocumentStore::new(&config.corpus_dir);
        let loader = CorpusLoader::new(
            store,
            chunking,
            Arc::clone(&embedder),
            config.loader.clone(),
        )?;
        let handle = Arc::new(IndexHandle::new(IndexSnapshot::initial(
            embedder.identity(),
        )));
        let retriever = Retriever::new(Arc::clone(&handle), embedder);

        tracing::info!(
            "Opened corpus at {} with {}",
            config.corpus_dir.display(),
            handle.snapshot().index.model()
        );
        Ok(Self {
            config,
            loader,
            handle,
            retriever,
        })
    }

    pub fn config(&self) -> &SiftConfig {
        &self.config
    }

    pub fn handle(&self) -> &Arc<IndexHandle> {
        &self.handle
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Re-read the whole corpus and publish the new index.
    pub async fn rebuild(&self) -> Result<BuildReport> {
        let (report, _) = self.build_and_publish().await?;
        Ok(report)
    }

    async fn build_and_publish(&self) -> Result<(BuildReport, PublishOutcome)> {
        let ticket = self.handle.begin_build();
        let outcome = self.loader.load(ticket.generation()).await?;
        let report = outcome.report.clone();
        let publish = self.handle.publish(IndexSnapshot::from(outcome));
        Ok((report, publish))
    }

    pub async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(RetrievalError::invalid_request("question is required"));
        }
        let k = request.k.unwrap_or(self.config.retrieval.top_k);
        let snapshot = self.handle.snapshot();

        let mut results = self.retriever.retrieve_in(&snapshot, question, k).await?;
        if request.unique_sources {
            results = dedup_by_citation(results);
        }

        let context = assemble_context(&results);
        let sources = results.iter().map(Source::from).collect();
        Ok(QueryResponse {
            results,
            context,
            sources,
            generation: snapshot.generation,
        })
    }

    /// Persist a document and rebuild; the document is searchable once this
    /// returns.
    pub async fn add_document(&self, request: AddDocumentRequest) -> Result<AddDocumentResponse> {
        let path = self
            .loader
            .store()
            .add(&NewDocument {
                title: request.title,
                content: request.content,
                file_type: request.file_type,
            })
            .await?;

        let (report, publish) = self.build_and_publish().await?;
        Ok(AddDocumentResponse {
            path,
            report,
            publish,
        })
    }

    pub async fn list_documents(&self) -> Result<Vec<DocumentInfo>> {
        self.loader.store().list().await
    }

    pub async fn stats(&self) -> Result<CorpusStats> {
        let snapshot = self.handle.snapshot();
        let file_stats = self.loader.store().file_stats().await?;
        Ok(CorpusStats {
            generation: snapshot.generation,
            chunk_count: snapshot.index.len(),
            document_count: snapshot.index.document_count(),
            model: snapshot.index.model().clone(),
            file_stats,
            last_build: snapshot.report.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_embed::HashingEmbedder;
    use tempfile::tempdir;

    fn service(corpus: &std::path::Path) -> RagService {
        let mut config = SiftConfig::default().with_corpus_dir(corpus);
        config.chunking.chunk_size = 200;
        config.chunking.overlap = 20;
        RagService::open(config, Arc::new(HashingEmbedder::new(256).unwrap())).unwrap()
    }

    #[tokio::test]
    async fn test_query_before_first_build_is_empty() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let service = service(dir.path());

        let response = service.query(QueryRequest::new("anything")).await?;
        assert!(response.results.is_empty());
        assert_eq!(response.context, "");
        assert_eq!(response.generation, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_blank_question_rejected() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let service = service(dir.path());

        let err = service.query(QueryRequest::new("   ")).await.unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidRequest { .. }));
        Ok(())
    }

    #[test]
    fn test_open_rejects_invalid_config() {
        let mut config = SiftConfig::default();
        config.chunking.overlap = config.chunking.chunk_size;
        let result = RagService::open(config, Arc::new(HashingEmbedder::new(8).unwrap()));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_add_document_then_query() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let service = service(dir.path());

        let response = service
            .add_document(AddDocumentRequest {
                title: "Sky Facts".to_string(),
                content: "reference: http://x\nThe sky is blue.".to_string(),
                file_type: FileType::Text,
            })
            .await?;
        assert_eq!(response.path, dir.path().join("sky_facts.txt"));
        assert!(response.publish.is_published());
        assert_eq!(response.report.documents_loaded, 1);

        let answer = service
            .query(QueryRequest::new("What color is the sky?").with_k(3))
            .await?;
        assert_eq!(answer.results.len(), 1);
        assert_eq!(answer.context, "The sky is blue.");
        assert_eq!(
            answer.sources,
            vec![Source {
                reference: "http://x".to_string(),
                filename: "sky_facts.txt".to_string()
            }]
        );
        assert_eq!(answer.generation, response.report.generation);
        Ok(())
    }

    #[tokio::test]
    async fn test_stats_and_listing() -> anyhow::Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join("a.txt"), "Alpha text.")?;
        std::fs::write(dir.path().join("b.mdx"), "# Beta\n\nBeta text.")?;
        let service = service(dir.path());

        service.rebuild().await?;
        let stats = service.stats().await?;

        assert_eq!(stats.generation, 1);
        assert_eq!(stats.document_count, 2);
        assert!(stats.chunk_count >= 2);
        assert_eq!(stats.model.provider, "hashing");
        assert_eq!(stats.file_stats.total, 2);
        assert_eq!(stats.file_stats.markdown_files, 1);
        assert_eq!(stats.last_build.documents_loaded, 2);

        let names: Vec<String> = service
            .list_documents()
            .await?
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["a.txt", "b.mdx"]);
        Ok(())
    }

    #[test]
    fn test_request_deserialization() {
        let request: QueryRequest =
            serde_json::from_str(r#"{"question": "What color is the sky?"}"#).unwrap();
        assert_eq!(request.k, None);
        assert!(!request.unique_sources);

        let add: AddDocumentRequest =
            serde_json::from_str(r#"{"title": "T", "content": "C", "file_type": "markdown"}"#)
                .unwrap();
        assert_eq!(add.file_type, FileType::Markdown);

        assert!(serde_json::from_str::<AddDocumentRequest>(r#"{"title": "T"}"#).is_err());
    }
}
