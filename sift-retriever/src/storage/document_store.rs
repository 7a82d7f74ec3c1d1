use crate::document::Document;
use crate::error::{RetrievalError, Result};
use crate::retrieval::chunking_strategy::ChunkingStrategy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Kind of document, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    #[default]
    Text,
    Markdown,
}

impl FileType {
    /// Extension used when persisting a new document of this kind.
    pub fn extension(&self) -> &'static str {
        match self {
            FileType::Text => "txt",
            FileType::Markdown => "mdx",
        }
    }

    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .as_deref()
        {
            Some("md" | "mdx" | "markdown") => FileType::Markdown,
            _ => FileType::Text,
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileType::Text => write!(f, "Text"),
            FileType::Markdown => write!(f, "Markdown"),
        }
    }
}

impl std::str::FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(FileType::Text),
            "markdown" | "md" | "mdx" => Ok(FileType::Markdown),
            _ => Err(format!("Invalid file type: {s}. Valid values are: text, markdown")),
        }
    }
}

/// A document to be written into the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub file_type: FileType,
}

/// Listing entry for one corpus file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    pub name: String,
    pub size: u64,
    /// Creation time, when the platform reports one
    pub created: Option<DateTime<Utc>>,
    pub kind: FileType,
    pub path: PathBuf,
}

/// Counts of corpus files by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FileStats {
    pub total: usize,
    pub text_files: usize,
    pub markdown_files: usize,
}

/// Derive the on-disk filename for a new document from its title.
///
/// The title is lowercased, whitespace runs become `_`, and anything outside
/// `[a-z0-9_-]` is dropped.
pub fn derive_filename(title: &str, file_type: FileType) -> Result<String> {
    let mut stem = String::with_capacity(title.len());
    let mut in_whitespace = false;
    for c in title.trim().chars().flat_map(char::to_lowercase) {
        if c.is_whitespace() {
            if !in_whitespace {
                stem.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-' {
            stem.push(c);
        }
    }

    if stem.trim_matches('_').is_empty() {
        return Err(RetrievalError::invalid_request(format!(
            "title '{title}' does not produce a usable filename"
        )));
    }
    Ok(format!("{stem}.{}", file_type.extension()))
}

/// A directory of plain-text documents.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Eligible document paths, sorted by filename.
    ///
    /// Fails with [`RetrievalError::SourceUnavailable`] when the directory
    /// cannot be read at all.
    pub async fn discover(&self) -> Result<Vec<PathBuf>> {
        let mut entries =
            fs::read_dir(&self.root)
                .await
                .map_err(|source| RetrievalError::SourceUnavailable {
                    path: self.root.clone(),
                    source,
                })?;

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !ChunkingStrategy::should_index_file(&path) {
                continue;
            }
            if entry.file_type().await?.is_file() {
                paths.push(path);
            }
        }

        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        tracing::debug!(
            "Discovered {} documents in {}",
            paths.len(),
            self.root.display()
        );
        Ok(paths)
    }

    /// Read and parse one document. Non-UTF-8 content is a read failure.
    pub async fn read(&self, path: &Path) -> Result<Document> {
        let bytes = fs::read(path)
            .await
            .map_err(|e| RetrievalError::DocumentRead {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let text = String::from_utf8(bytes).map_err(|e| RetrievalError::DocumentRead {
            path: path.to_path_buf(),
            reason: format!("not valid UTF-8: {e}"),
        })?;
        Ok(Document::parse(path, text))
    }

    /// Listing of every eligible document with size and creation time.
    pub async fn list(&self) -> Result<Vec<DocumentInfo>> {
        let mut documents = Vec::new();
        for path in self.discover().await? {
            let metadata = fs::metadata(&path).await?;
            documents.push(DocumentInfo {
                name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                size: metadata.len(),
                created: metadata.created().ok().map(DateTime::<Utc>::from),
                kind: FileType::from_path(&path),
                path,
            });
        }
        Ok(documents)
    }

    pub async fn file_stats(&self) -> Result<FileStats> {
        let paths = self.discover().await?;
        let markdown_files = paths
            .iter()
            .filter(|path| FileType::from_path(path) == FileType::Markdown)
            .count();
        Ok(FileStats {
            total: paths.len(),
            text_files: paths.len() - markdown_files,
            markdown_files,
        })
    }

    /// Persist a new document, overwriting any file with the same derived
    /// name. Returns the written path.
    pub async fn add(&self, document: &NewDocument) -> Result<PathBuf> {
        if document.title.trim().is_empty() {
            return Err(RetrievalError::invalid_request("title is required"));
        }
        if document.content.trim().is_empty() {
            return Err(RetrievalError::invalid_request("content is required"));
        }

        let filename = derive_filename(&document.title, document.file_type)?;
        fs::create_dir_all(&self.root).await?;
        let path = self.root.join(&filename);

        if fs::try_exists(&path).await.unwrap_or(false) {
            tracing::warn!("Overwriting existing document {}", path.display());
        }
        fs::write(&path, &document.content).await?;

        tracing::info!("Stored document {} ({})", filename, document.file_type);
        Ok(path)
    }
}
