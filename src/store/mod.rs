// Vector store module
// Chunk record types, the store trait, and index directory backup/restore

#[cfg(test)]
mod tests;

pub mod lance;

use std::fs;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::extract::{ChunkSource, DocumentKind};
use crate::{Result, SemdexError};

pub use lance::LanceStore;

/// Number of characters kept in a chunk preview.
pub const PREVIEW_CHARS: usize = 150;

/// Everything stored alongside a chunk's vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: ChunkSource,
    pub kind: DocumentKind,
    pub file_path: String,
    /// Position of the chunk within its source unit
    pub chunk_index: u32,
    pub word_count: u32,
    /// Full chunk text, kept for lexical re-ranking and text scans
    pub text: String,
    pub preview: String,
    /// RFC 3339 timestamp of the indexing run
    pub indexed_at: String,
}

/// A chunk ready for insertion: identifier, vector, and metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// A chunk as listed from the store, without its vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredChunk {
    pub id: String,
    pub metadata: ChunkMetadata,
}

/// One similarity-query result in store order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryHit {
    pub id: String,
    /// Cosine similarity, `1 - distance`
    pub score: f32,
    pub metadata: ChunkMetadata,
}

/// Persistent vector index over chunk records.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the index; an already-existing index is success.
    async fn create_index(&self) -> Result<()>;

    async fn insert_item(&self, record: ChunkRecord) -> Result<()>;

    /// Top-`k` most similar chunks, best first. An absent index yields no hits.
    async fn query_items(&self, vector: &[f32], k: usize) -> Result<Vec<QueryHit>>;

    /// Every stored chunk. An absent index yields an empty listing.
    async fn list_items(&self) -> Result<Vec<StoredChunk>>;

    /// Delete the whole index; deleting a missing index is success.
    async fn delete_index(&self) -> Result<()>;

    async fn count_items(&self) -> Result<u64>;
}

/// First [`PREVIEW_CHARS`] characters of `text`, with a trailing ellipsis
/// when truncated.
#[inline]
pub fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        text.to_string()
    } else {
        let mut short: String = text.chars().take(PREVIEW_CHARS).collect();
        short.push_str("...");
        short
    }
}

/// File and byte totals of a completed directory copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CopyStats {
    pub files: u64,
    pub bytes: u64,
}

/// Copy the index directory to `dest`, replacing any previous backup there.
#[inline]
pub fn backup_index(index_dir: &Path, dest: &Path) -> Result<CopyStats> {
    if !index_dir.is_dir() {
        return Err(SemdexError::Store(format!(
            "No index directory at {}",
            index_dir.display()
        )));
    }
    if dest.starts_with(index_dir) {
        return Err(SemdexError::Store(
            "Backup destination cannot live inside the index directory".to_string(),
        ));
    }

    copy_dir_replacing(index_dir, dest)
}

/// Replace the index directory wholesale with the contents of a backup.
#[inline]
pub fn restore_index(src: &Path, index_dir: &Path) -> Result<CopyStats> {
    if !src.is_dir() {
        return Err(SemdexError::Store(format!(
            "No backup directory at {}",
            src.display()
        )));
    }

    copy_dir_replacing(src, index_dir)
}

fn copy_dir_replacing(src: &Path, dest: &Path) -> Result<CopyStats> {
    if dest.exists() {
        debug!("Replacing {}", dest.display());
        fs::remove_dir_all(dest)?;
    }

    let mut stats = CopyStats::default();
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| {
            SemdexError::Store(format!("Failed to walk {}: {}", src.display(), e))
        })?;
        let relative = entry.path().strip_prefix(src).map_err(|e| {
            SemdexError::Store(format!("Failed to resolve {}: {}", entry.path().display(), e))
        })?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            stats.bytes += fs::copy(entry.path(), &target)?;
            stats.files += 1;
        }
    }

    info!(
        "Copied {} files ({} bytes) from {} to {}",
        stats.files,
        stats.bytes,
        src.display(),
        dest.display()
    );
    Ok(stats)
}
