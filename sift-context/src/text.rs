//! This module splits document text into overlapping, bounded-size spans for
//! a retrieval pipeline.
//!
//! The goal is to turn a raw document body into "passages" small enough for an
//! embedding model while keeping natural units (headings, paragraphs,
//! sentences) together whenever they fit.
//!
//! The module defines two main types:
//! - [`TextSplitter`]: holds the delimiter set and the size/overlap budget and
//!   performs the split.
//! - [`TextSpan`]: one contiguous slice of the input with its position.
//!
//! # Splitting Model
//!
//! *   **Recursive Splitting**: `split_recursively_into_segments` breaks the text
//!     by the most significant delimiter first (headings, code fences, paragraph
//!     breaks) and only descends to finer delimiters (lines, sentences, spaces)
//!     for pieces that are still too large. When no delimiter is left a piece is
//!     cut at character boundaries.
//! *   **Greedy Packing**: atomic segments are packed into spans of at most
//!     `chunk_size` characters.
//! *   **Exact Overlap**: every span after the first starts exactly `overlap`
//!     characters before the end of the previous span.
//! *   **Full Coverage**: the first span followed by the non-overlapping tail of
//!     every later span reconstructs the input byte for byte.
//!
//! All sizes are counted in Unicode scalar values (`char`s), never bytes, so a
//! cut can never land inside a multi-byte character.
//!
//! ```
//! use sift_context::text::{TextSplitter, DEFAULT_MARKDOWN_DELIMITERS};
//!
//! let splitter = TextSplitter::new(DEFAULT_MARKDOWN_DELIMITERS, 60, 10).unwrap();
//! let content = "The sky is blue. ".repeat(10);
//! let spans = splitter.split(&content);
//!
//! assert!(spans.len() > 1);
//! assert!(spans.iter().all(|s| s.char_len() <= 60));
//!
//! let rebuilt: String = spans.iter().map(|s| s.novel_text()).collect();
//! assert_eq!(rebuilt, content);
//! ```
use regex::Regex;
use serde::Serialize;
use std::ops::Range;
use std::path::Path;

/// Default regular expression patterns for splitting Markdown and prose into
/// logical segments.
///
/// Ordered from most significant to least significant:
///
/// - `(?m)^\s*#{1,6}\s+.*$`: Markdown headings (e.g., `# Heading`).
/// - ```` ``` ````: code block fences.
/// - `\n\n`: paragraph breaks.
/// - `(?m)^\s*[-*+]\s+`: unordered list item markers.
/// - `(?m)^\s*\d+\.\s+`: ordered list item markers.
/// - `\n`: line breaks.
/// - `[.!?]\s+`: sentence ends.
/// - ` `: spaces, the most granular delimiter.
pub const DEFAULT_MARKDOWN_DELIMITERS: &[&str] = &[
    r"(?m)^\s*#{1,6}\s+.*$", // Headings
    r"```",                  // Code block fences
    r"\n\n",                 // Paragraphs
    r"(?m)^\s*[-*+]\s+",     // Unordered list items
    r"(?m)^\s*\d+\.\s+",     // Ordered list items
    r"\n",                   // Line breaks
    r"[.!?]\s+",             // Sentence ends
    r" ",                    // Spaces
];

/// Delimiters for plain prose without Markdown structure.
pub const PROSE_DELIMITERS: &[&str] = &[
    r"\n\n",     // Paragraphs
    r"\n",       // Line breaks
    r"[.!?]\s+", // Sentence ends
    r" ",        // Spaces
];

/// Errors raised while configuring a [`TextSplitter`].
///
/// All of them are configuration errors: they are reported before any text is
/// processed, never halfway through a split.
#[derive(Debug, thiserror::Error)]
pub enum SplitError {
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    #[error("overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
    OverlapTooLarge { overlap: usize, chunk_size: usize },

    #[error("invalid delimiter pattern '{pattern}': {source}")]
    InvalidDelimiter {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Get appropriate delimiters for a document based on its file extension.
///
/// Markdown-like files (`md`, `mdx`, `markdown`) and plain text (`txt`) get
/// the Markdown set, since plain text corpora frequently carry light Markdown.
/// Everything else falls back to [`PROSE_DELIMITERS`].
///
/// ```
/// use std::path::Path;
/// use sift_context::text::{get_delimiters_for_path, DEFAULT_MARKDOWN_DELIMITERS};
///
/// assert_eq!(get_delimiters_for_path(Path::new("guide.mdx")), DEFAULT_MARKDOWN_DELIMITERS);
/// ```
pub fn get_delimiters_for_path(path: &Path) -> &'static [&'static str] {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("md" | "mdx" | "markdown" | "txt") => DEFAULT_MARKDOWN_DELIMITERS,
        _ => {
            if let Some(filename) = path.file_name().and_then(|n| n.to_str()) {
                if filename.starts_with("README") || filename.starts_with("CHANGELOG") {
                    return DEFAULT_MARKDOWN_DELIMITERS;
                }
            }
            PROSE_DELIMITERS
        }
    }
}

/// Split `text` with the default Markdown delimiters.
///
/// Fails with a [`SplitError`] when `chunk_size` is zero or `overlap` is not
/// smaller than `chunk_size`.
pub fn split(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<TextSpan>, SplitError> {
    Ok(TextSplitter::new(DEFAULT_MARKDOWN_DELIMITERS, chunk_size, overlap)?.split(text))
}

/// Splits text into overlapping spans along configurable delimiters.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    delimiters: Vec<Regex>,
    chunk_size: usize,
    overlap: usize,
}

/// A contiguous slice of the input text produced by [`TextSplitter::split`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextSpan {
    /// Position of this span in the split (0-indexed).
    pub sequence: usize,
    /// Byte offset of the first byte of the span in the input.
    pub start: usize,
    /// Byte offset one past the last byte of the span in the input.
    pub end: usize,
    /// Number of leading characters shared with the previous span.
    pub overlap: usize,
    /// The span's text, equal to `input[start..end]`.
    pub text: String,
}

impl TextSpan {
    /// Length of the span in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// The part of the span that is not repeated from the previous span.
    pub fn novel_text(&self) -> &str {
        match self.text.char_indices().nth(self.overlap) {
            Some((idx, _)) => &self.text[idx..],
            None => "",
        }
    }
}

impl TextSplitter {
    /// Creates a new `TextSplitter`.
    ///
    /// `delimiter_patterns` are regular expressions applied in order, from
    /// most significant to least significant. `chunk_size` is the maximum span
    /// length in characters and `overlap` the number of characters shared by
    /// consecutive spans.
    ///
    /// # Errors
    ///
    /// - [`SplitError::ZeroChunkSize`] when `chunk_size == 0`
    /// - [`SplitError::OverlapTooLarge`] when `overlap >= chunk_size`; such a
    ///   configuration could never make progress through the text
    /// - [`SplitError::InvalidDelimiter`] when a pattern does not compile
    ///
    /// ```
    /// use sift_context::text::{TextSplitter, SplitError, PROSE_DELIMITERS};
    ///
    /// assert!(TextSplitter::new(PROSE_DELIMITERS, 500, 100).is_ok());
    /// assert!(matches!(
    ///     TextSplitter::new(PROSE_DELIMITERS, 100, 100),
    ///     Err(SplitError::OverlapTooLarge { .. })
    /// ));
    /// ```
    pub fn new(
        delimiter_patterns: &[&str],
        chunk_size: usize,
        overlap: usize,
    ) -> Result<Self, SplitError> {
        if chunk_size == 0 {
            return Err(SplitError::ZeroChunkSize);
        }
        if overlap >= chunk_size {
            return Err(SplitError::OverlapTooLarge {
                overlap,
                chunk_size,
            });
        }

        let delimiters = delimiter_patterns
            .iter()
            .map(|&pattern| {
                Regex::new(pattern).map_err(|source| SplitError::InvalidDelimiter {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TextSplitter {
            delimiters,
            chunk_size,
            overlap,
        })
    }

    /// Maximum span length in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Characters shared by consecutive spans.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Splits `text` into a vector of [`TextSpan`]s.
    ///
    /// Every span is at most `chunk_size` characters. Span `k + 1` begins
    /// exactly `overlap` characters before span `k` ends. Concatenating the
    /// first span with [`TextSpan::novel_text`] of the rest reproduces `text`.
    /// Empty input produces no spans.
    pub fn split(&self, text: &str) -> Vec<TextSpan> {
        // Each atomic segment must fit after an overlap prefix.
        let segment_budget = self.chunk_size - self.overlap;
        let segments = self.split_recursively_into_segments(text, 0, segment_budget, 0);

        let mut spans: Vec<TextSpan> = Vec::new();
        let mut span_start = 0;
        let mut span_end = 0;
        let mut span_chars = 0;

        for segment_range in segments {
            let segment_chars = text[segment_range.clone()].chars().count();

            // If adding the current segment makes the span too large,
            // close the span and start the next one inside its tail.
            if span_chars + segment_chars > self.chunk_size && span_end > span_start {
                let overlap = if spans.is_empty() { 0 } else { self.overlap };
                spans.push(TextSpan {
                    sequence: spans.len(),
                    start: span_start,
                    end: span_end,
                    overlap,
                    text: text[span_start..span_end].to_string(),
                });
                span_start = step_back_chars(text, span_end, self.overlap);
                span_chars = self.overlap;
            }

            span_end = segment_range.end;
            span_chars += segment_chars;
        }

        if span_end > span_start {
            let overlap = if spans.is_empty() { 0 } else { self.overlap };
            spans.push(TextSpan {
                sequence: spans.len(),
                start: span_start,
                end: span_end,
                overlap,
                text: text[span_start..span_end].to_string(),
            });
        }

        spans
    }

    // Recursively splits the text into contiguous byte ranges, none longer than
    // `max_chars` characters. Delimiter matches become their own segments so
    // that chunk boundaries prefer to fall next to them.
    fn split_recursively_into_segments(
        &self,
        text: &str,
        delimiter_idx: usize,
        max_chars: usize,
        current_offset: usize,
    ) -> Vec<Range<usize>> {
        let mut result_segments: Vec<Range<usize>> = Vec::new();

        if text.is_empty() {
            return result_segments;
        }

        // Base case 1: the text already fits.
        if text.chars().count() <= max_chars {
            result_segments.push(current_offset..(current_offset + text.len()));
            return result_segments;
        }

        // Base case 2: no delimiters left, cut at character boundaries.
        if delimiter_idx >= self.delimiters.len() {
            let mut piece_start = 0;
            let mut piece_chars = 0;
            for (idx, _) in text.char_indices() {
                if piece_chars == max_chars {
                    result_segments.push(current_offset + piece_start..current_offset + idx);
                    piece_start = idx;
                    piece_chars = 0;
                }
                piece_chars += 1;
            }
            result_segments.push(current_offset + piece_start..current_offset + text.len());
            return result_segments;
        }

        let current_delimiter = &self.delimiters[delimiter_idx];
        let mut local_byte_start = 0;

        for mat in current_delimiter.find_iter(text) {
            if mat.start() > local_byte_start {
                result_segments.extend(self.split_recursively_into_segments(
                    &text[local_byte_start..mat.start()],
                    delimiter_idx + 1,
                    max_chars,
                    current_offset + local_byte_start,
                ));
            }
            // A delimiter match (e.g. a very long heading line) can itself be
            // over budget, so it goes through the same recursion.
            result_segments.extend(self.split_recursively_into_segments(
                mat.as_str(),
                delimiter_idx + 1,
                max_chars,
                current_offset + mat.start(),
            ));
            local_byte_start = mat.end();
        }

        if local_byte_start < text.len() {
            result_segments.extend(self.split_recursively_into_segments(
                &text[local_byte_start..],
                delimiter_idx + 1,
                max_chars,
                current_offset + local_byte_start,
            ));
        }

        result_segments
    }
}

/// Byte index that lies `chars` characters before `end` in `text`.
fn step_back_chars(text: &str, end: usize, chars: usize) -> usize {
    if chars == 0 {
        return end;
    }
    text[..end]
        .char_indices()
        .rev()
        .nth(chars - 1)
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}
