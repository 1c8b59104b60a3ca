// Word-window chunking
// Splits extracted text into overlapping windows sized for the embedding model


use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Result, SemdexError};

/// An overlapping word window over an extracted unit, the unit of embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Window text, words re-joined with single spaces
    pub text: String,
    /// Word offset of the window start within the source text
    pub start_index: usize,
    /// Number of words in the window
    pub word_count: usize,
}

/// Configuration for word-window chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in words
    pub chunk_size: usize,
    /// Words shared between consecutive windows
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
        }
    }
}

/// Split `text` into overlapping word windows.
///
/// Windows start at word offsets `0, stride, 2 * stride, ...` where
/// `stride = chunk_size - overlap`, and each spans up to `chunk_size` words.
/// Chunking stops with the first window that reaches the final word, so a
/// text of exactly `chunk_size` words produces one chunk. Every word appears
/// in at least one window, consecutive windows share exactly `overlap` words,
/// and only the final window may be shorter than `chunk_size`. Empty or
/// whitespace-only text yields no chunks.
#[inline]
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    if config.overlap >= config.chunk_size {
        return Err(SemdexError::Config(format!(
            "Chunk overlap {} must be smaller than chunk size {}",
            config.overlap, config.chunk_size
        )));
    }
    let stride = config.chunk_size - config.overlap;

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Ok(Vec::new());
    }

    let mut chunks = Vec::with_capacity(words.len().div_ceil(stride));
    let mut offset = 0;
    loop {
        let end = (offset + config.chunk_size).min(words.len());
        chunks.push(Chunk {
            text: words[offset..end].join(" "),
            start_index: offset,
            word_count: end - offset,
        });
        if end == words.len() {
            break;
        }
        offset += stride;
    }

    debug!(
        "Chunked {} words into {} chunks (size {}, overlap {})",
        words.len(),
        chunks.len(),
        config.chunk_size,
        config.overlap
    );

    Ok(chunks)
}
