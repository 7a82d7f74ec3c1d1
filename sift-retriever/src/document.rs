//! Documents, chunks and the provenance they carry.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const REFERENCE_PREFIX: &str = "reference:";

/// Provenance attached to a document and copied onto every chunk derived
/// from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Citation URI from a leading `reference: <URI>` line
    pub reference: Option<String>,
    pub filename: String,
}

impl DocumentMetadata {
    /// The key results are deduplicated on: the reference when present,
    /// otherwise the filename.
    pub fn citation_key(&self) -> &str {
        self.reference.as_deref().unwrap_or(&self.filename)
    }
}

/// A document read from the corpus. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Hex blake3 digest of the filename, stable across reloads
    pub id: String,
    pub source_location: PathBuf,
    pub raw_text: String,
    pub metadata: DocumentMetadata,
    body_offset: usize,
}

impl Document {
    /// Build a document from its location and raw contents, extracting the
    /// optional leading reference line.
    pub fn parse(source_location: impl Into<PathBuf>, raw_text: String) -> Self {
        let source_location = source_location.into();
        let filename = source_location
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (reference, body_offset) = match extract_reference(&raw_text) {
            Some((reference, offset)) => (Some(reference.to_string()), offset),
            None => (None, 0),
        };

        Self {
            id: document_id(&filename),
            source_location,
            raw_text,
            metadata: DocumentMetadata {
                reference,
                filename,
            },
            body_offset,
        }
    }

    /// The text that is chunked and embedded: `raw_text` without the
    /// reference line.
    pub fn body(&self) -> &str {
        &self.raw_text[self.body_offset..]
    }

    pub fn path(&self) -> &Path {
        &self.source_location
    }
}

/// Stable identifier derived from a document's filename.
pub fn document_id(filename: &str) -> String {
    hex::encode(blake3::hash(filename.as_bytes()).as_bytes())
}

/// Recognise `reference:<spaces><http(s) URI>` at the very start of `text`.
///
/// Returns the URI and the byte offset where the body starts (just past the
/// end of the reference line).
fn extract_reference(text: &str) -> Option<(&str, usize)> {
    let rest = text.strip_prefix(REFERENCE_PREFIX)?;
    let line_end = rest.find('\n').map(|i| i + 1).unwrap_or(rest.len());
    let line = &rest[..line_end];

    let uri = line.trim_start_matches([' ', '\t']);
    let uri_len = uri.find(char::is_whitespace).unwrap_or(uri.len());
    let uri = &uri[..uri_len];

    let scheme_ok = ["http://", "https://"]
        .iter()
        .any(|scheme| uri.len() > scheme.len() && uri.starts_with(scheme));
    if !scheme_ok {
        return None;
    }

    Some((uri, REFERENCE_PREFIX.len() + line_end))
}

/// A contiguous slice of a document body, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Back-reference to the originating [`Document`]
    pub document_id: String,
    pub text: String,
    /// Position of the chunk within its document (0-indexed)
    pub ordinal: usize,
    /// Byte offset of the chunk in the document body
    pub start: usize,
    /// Byte offset one past the end of the chunk in the document body
    pub end: usize,
    pub metadata: DocumentMetadata,
}
