//! Document chunking
//!
//! Splits documents into overlapping passages for indexing. Splitting is
//! recursive: try the coarsest separator first (paragraphs), fall back to
//! finer ones (lines, sentences, words) for pieces that are still too big.
//! Sizes are in bytes, and every cut lands on a UTF-8 boundary.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for document chunking
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Target chunk size in bytes
    pub chunk_size: usize,
    /// Bytes of the previous chunk repeated at the start of the next
    pub chunk_overlap: usize,
    /// Separators to split on, coarsest first
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            separators: ["\n\n", "\n", ". ", "! ", "? ", "; ", ", ", " "]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size / 2),
            ..Self::default()
        }
    }
}

/// A passage of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    /// 0-based position within the document
    pub index: usize,
}

/// Split `text` into chunks of at most `chunk_size + chunk_overlap` bytes
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let pieces = if text.len() <= config.chunk_size {
        vec![text.to_string()]
    } else {
        split_recursive(text, &config.separators, config.chunk_size)
    };

    let chunks: Vec<Chunk> = with_overlap(&pieces, config.chunk_overlap)
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .enumerate()
        .map(|(index, content)| Chunk { content, index })
        .collect();

    debug!("Split {} bytes into {} chunks", text.len(), chunks.len());
    chunks
}

fn split_recursive(text: &str, separators: &[String], chunk_size: usize) -> Vec<String> {
    if text.len() <= chunk_size {
        return vec![text.to_string()];
    }
    let Some((separator, finer)) = separators.split_first() else {
        return hard_split(text, chunk_size);
    };

    let mut out = Vec::new();
    let mut current = String::new();

    for piece in text.split_inclusive(separator.as_str()) {
        if !current.is_empty() && current.len() + piece.len() > chunk_size {
            out.extend(split_recursive(&current, finer, chunk_size));
            current.clear();
        }
        current.push_str(piece);
    }
    if !current.is_empty() {
        out.extend(split_recursive(&current, finer, chunk_size));
    }
    out
}

/// Last resort for text without any separator: cut at char boundaries
fn hard_split(text: &str, chunk_size: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let cut = floor_char_boundary(rest, chunk_size.min(rest.len()));
        // A single char wider than chunk_size still has to go somewhere
        let cut = if cut == 0 {
            rest.chars().next().map_or(rest.len(), char::len_utf8)
        } else {
            cut
        };
        out.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }
    out
}

fn with_overlap(pieces: &[String], overlap: usize) -> Vec<String> {
    if overlap == 0 || pieces.len() < 2 {
        return pieces.to_vec();
    }
    let mut out = Vec::with_capacity(pieces.len());
    out.push(pieces[0].clone());
    for pair in pieces.windows(2) {
        let prev = &pair[0];
        let start = ceil_char_boundary(prev, prev.len().saturating_sub(overlap));
        out.push(format!("{}{}", &prev[start..], pair[1]));
    }
    out
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(s: &str, mut i: usize) -> usize {
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}
