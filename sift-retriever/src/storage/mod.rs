//! Corpus storage for sift-retriever
//!
//! The corpus is a flat directory of `.txt`, `.md`, `.mdx` and `.markdown`
//! files. [`DocumentStore`] discovers and reads them for the loader, lists
//! them with size and creation time, and persists documents added through the
//! service.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sift_retriever::storage::{DocumentStore, FileType, NewDocument};
//!
//! # async fn example() -> sift_retriever::Result<()> {
//! let store = DocumentStore::new("data");
//! store
//!     .add(&NewDocument {
//!         title: "Sky Facts".to_string(),
//!         content: "reference: http://x\nThe sky is blue.".to_string(),
//!         file_type: FileType::Text,
//!     })
//!     .await?;
//!
//! for info in store.list().await? {
//!     println!("{} ({} bytes)", info.name, info.size);
//! }
//! # Ok(())
//! # }
//! ```

pub mod document_store;

pub use document_store::{
    DocumentInfo, DocumentStore, FileStats, FileType, NewDocument, derive_filename,
};
