use crate::document::{Chunk, Document};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use sift_context::text::{DEFAULT_MARKDOWN_DELIMITERS, PROSE_DELIMITERS};
use sift_context::{TextSplitter, get_delimiters_for_path};
use std::path::Path;

/// File extensions accepted into the corpus.
pub const INDEXED_EXTENSIONS: &[&str] = &["txt", "md", "mdx", "markdown"];

/// Configuration for chunking documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum size of each chunk in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks of one document
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_overlap(mut self, overlap: usize) -> Self {
        self.overlap = overlap;
        self
    }
}

/// Strategy for chunking documents - splitting is delegated to sift-context,
/// provenance is attached here.
#[derive(Debug, Clone)]
pub struct ChunkingStrategy {
    config: ChunkingConfig,
    markdown: TextSplitter,
    prose: TextSplitter,
}

impl ChunkingStrategy {
    /// Create a chunking strategy, rejecting invalid sizes before any
    /// document is processed.
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        let markdown =
            TextSplitter::new(DEFAULT_MARKDOWN_DELIMITERS, config.chunk_size, config.overlap)?;
        let prose = TextSplitter::new(PROSE_DELIMITERS, config.chunk_size, config.overlap)?;
        Ok(Self {
            config,
            markdown,
            prose,
        })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    fn splitter_for(&self, path: &Path) -> &TextSplitter {
        if get_delimiters_for_path(path) == DEFAULT_MARKDOWN_DELIMITERS {
            &self.markdown
        } else {
            &self.prose
        }
    }

    /// Chunk a document's body. Every chunk carries the document's id and a
    /// copy of its metadata.
    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        let spans = self.splitter_for(document.path()).split(document.body());

        tracing::debug!(
            "Chunked {} into {} chunks (size: {}, overlap: {})",
            document.metadata.filename,
            spans.len(),
            self.config.chunk_size,
            self.config.overlap
        );

        spans
            .into_iter()
            .map(|span| Chunk {
                document_id: document.id.clone(),
                text: span.text,
                ordinal: span.sequence,
                start: span.start,
                end: span.end,
                metadata: document.metadata.clone(),
            })
            .collect()
    }

    /// Check if a file belongs in the corpus based on its path
    pub fn should_index_file(file_path: &Path) -> bool {
        let Some(filename) = file_path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if filename.starts_with('.') {
            return false;
        }

        file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                INDEXED_EXTENSIONS
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}
