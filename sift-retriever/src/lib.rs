//! sift-retriever: retrieval pipeline for retrieval-augmented generation
//!
//! Loads a directory of plain-text and Markdown documents, splits them into
//! overlapping chunks, embeds every chunk and keeps the vectors in an
//! in-memory index that is rebuilt and swapped atomically. Queries return the
//! top-k chunks by cosine similarity together with their citations, ready to
//! be handed to an answer-generation step.
//!
//! ## Key Modules
//!
//! - **[`retrieval`]**: chunking, corpus loading, the vector index, the live
//!   index handle and the query-time retriever
//! - **[`storage`]**: the on-disk document directory
//! - **[`service`]**: the façade an outer layer talks to
//! - **[`config`]**: TOML configuration for all of the above
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sift_retriever::{RagService, SiftConfig, service::QueryRequest};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = SiftConfig::default().with_corpus_dir("data");
//! let embedder = sift_embed::create_provider(&config.embedder).await?;
//!
//! let service = RagService::open(config, embedder)?;
//! service.rebuild().await?;
//!
//! let answer = service.query(QueryRequest::new("What color is the sky?")).await?;
//! println!("{}", answer.context);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! DocumentStore → Document → ChunkingStrategy → Embedder → VectorIndex
//!                                                              ↓
//!            Retriever ← IndexHandle (ArcSwap) ← IndexSnapshot
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod retrieval;
pub mod service;
pub mod storage;

pub use config::{RetrievalConfig, SiftConfig};
pub use document::{Chunk, Document, DocumentMetadata};
pub use error::{Result, RetrievalError};
pub use retrieval::retriever::{RetrievedChunk, Retriever, Source};
pub use service::RagService;
