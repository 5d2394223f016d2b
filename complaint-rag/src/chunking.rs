//! Narrative chunking.
//!
//! [`RecursiveChunker`] splits text on the most natural boundary available:
//! paragraph breaks first, then line breaks, then spaces. Pieces that fit are
//! merged back into chunks of at most `chunk_size` characters, carrying up to
//! `chunk_overlap` trailing characters into the next chunk. A segment with no
//! separator left is cut into fixed windows that advance by
//! `chunk_size - chunk_overlap` characters.
//!
//! All sizes are measured in `char`s, so multi-byte text is never split inside
//! a code point.

use std::collections::VecDeque;

use crate::config::RagConfig;
use crate::document::{Chunk, Metadata, Record};
use crate::error::{RagError, Result};

/// Separators tried in order of preference.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// A strategy for splitting narratives into chunks.
pub trait Chunker: Send + Sync {
    /// Split `text` into chunks, each owning a copy of `metadata`.
    ///
    /// Returns an empty `Vec` if the text is empty or whitespace.
    fn split(&self, text: &str, metadata: &Metadata) -> Vec<Chunk>;

    /// Split a record's narrative, attaching the record's full metadata.
    ///
    /// Records without a narrative produce no chunks.
    fn chunk_record(&self, record: &Record) -> Vec<Chunk> {
        match record.narrative_text() {
            Some(text) => self.split(text, &record.to_metadata()),
            None => Vec::new(),
        }
    }
}

/// Splits text hierarchically: paragraphs → lines → words → fixed windows.
///
/// # Example
///
/// ```rust,ignore
/// use complaint_rag::{Chunker, RecursiveChunker};
///
/// let chunker = RecursiveChunker::new(500, 50)?;
/// let chunks = chunker.chunk_record(&record);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: characters shared between consecutive chunks
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Create a chunker from the chunk settings of a [`RagConfig`].
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Maximum characters per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Characters shared between consecutive chunks.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split text into chunk strings without attaching metadata.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        self.split_at_level(text, 0)
    }

    fn split_at_level(&self, text: &str, level: usize) -> Vec<String> {
        if char_len(text) <= self.chunk_size {
            let trimmed = text.trim();
            return if trimmed.is_empty() { Vec::new() } else { vec![trimmed.to_string()] };
        }

        let Some(&separator) = SEPARATORS.get(level) else {
            return self.split_windows(text);
        };
        if !text.contains(separator) {
            return self.split_at_level(text, level + 1);
        }

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for piece in text.split(separator).filter(|p| !p.trim().is_empty()) {
            if char_len(piece) <= self.chunk_size {
                fitting.push(piece);
                continue;
            }
            // Flush what fits so far, then descend into the oversized piece.
            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting, separator));
                fitting.clear();
            }
            chunks.extend(self.split_at_level(piece, level + 1));
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting, separator));
        }

        chunks
    }

    /// Greedily join pieces with `separator` into chunks of at most
    /// `chunk_size` characters. After each emitted chunk, trailing pieces
    /// totalling at most `chunk_overlap` characters seed the next one.
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0;

        for &piece in pieces {
            let len = char_len(piece);
            let joint = if window.is_empty() { 0 } else { sep_len };

            if total + len + joint > self.chunk_size && !window.is_empty() {
                push_joined(&mut chunks, &window, separator);

                while total > 0
                    && (total > self.chunk_overlap
                        || total + len + if window.is_empty() { 0 } else { sep_len }
                            > self.chunk_size)
                {
                    let Some((_, first_len)) = window.pop_front() else {
                        break;
                    };
                    total -= first_len + if window.is_empty() { 0 } else { sep_len };
                }
            }

            total += len + if window.is_empty() { 0 } else { sep_len };
            window.push_back((piece, len));
        }

        push_joined(&mut chunks, &window, separator);
        chunks
    }

    /// Hard character cut used when no separator is left.
    fn split_windows(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let step = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let end = (start + self.chunk_size).min(chars.len());
            let window: String = chars[start..end].iter().collect();
            let trimmed = window.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }
            if end == chars.len() {
                break;
            }
            start += step;
        }

        chunks
    }
}

impl Chunker for RecursiveChunker {
    fn split(&self, text: &str, metadata: &Metadata) -> Vec<Chunk> {
        self.split_text(text)
            .into_iter()
            .map(|text| Chunk { text, metadata: metadata.clone() })
            .collect()
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn push_joined(chunks: &mut Vec<String>, window: &VecDeque<(&str, usize)>, separator: &str) {
    if window.is_empty() {
        return;
    }
    let joined = window.iter().map(|(piece, _)| *piece).collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}
