// Indexing pipeline module
// Chunks extracted units, embeds them in rate-limited batches, persists records

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::Result;
use crate::embeddings::EmbeddingProvider;
use crate::embeddings::chunking::{Chunk, ChunkingConfig, chunk_text};
use crate::extract::ExtractedUnit;
use crate::store::{ChunkMetadata, ChunkRecord, VectorStore, preview};

/// Configuration for the embedding batch pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IndexingConfig {
    /// Chunks per embedding batch
    pub batch_size: usize,
    /// In-flight embedding requests within one batch
    pub embed_concurrency: usize,
    /// Fixed pause between batches, in milliseconds
    pub batch_delay_ms: u64,
}

impl Default for IndexingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            batch_size: 5,
            embed_concurrency: 5,
            batch_delay_ms: 100,
        }
    }
}

/// Totals accumulated over one [`Indexer::index_units`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    pub chunks_created: usize,
}

/// The embedding batch pipeline.
///
/// Chunks each unit, embeds batches under a bounded concurrency fan-out,
/// and persists records in ascending chunk order with a fixed pause between
/// batches to avoid saturating the embedding server.
pub struct Indexer {
    store: Arc<dyn VectorStore>,
    provider: Arc<dyn EmbeddingProvider>,
    chunking: ChunkingConfig,
    indexing: IndexingConfig,
}

impl Indexer {
    #[inline]
    pub fn new(
        store: Arc<dyn VectorStore>,
        provider: Arc<dyn EmbeddingProvider>,
        chunking: ChunkingConfig,
        indexing: IndexingConfig,
    ) -> Self {
        Self {
            store,
            provider,
            chunking,
            indexing,
        }
    }

    /// Index every chunk of every unit, in order.
    ///
    /// The first embedding or store failure aborts the remaining work and
    /// propagates; chunks persisted before the failure stay in the store.
    /// There is no retry and no partial-commit rollback.
    #[inline]
    pub async fn index_units(&self, units: &[ExtractedUnit]) -> Result<IndexSummary> {
        let mut summary = IndexSummary::default();
        let mut seen_ids = HashSet::new();

        for unit in units {
            summary.chunks_created += self.index_unit(unit, &mut seen_ids).await?;
        }

        Ok(summary)
    }

    async fn index_unit(
        &self,
        unit: &ExtractedUnit,
        seen_ids: &mut HashSet<String>,
    ) -> Result<usize> {
        let chunks = chunk_text(&unit.text, &self.chunking)?;
        if chunks.is_empty() {
            debug!("No chunks produced for {}", unit.source.file_name());
            return Ok(0);
        }

        debug!(
            "Indexing {} chunks from {} in batches of {}",
            chunks.len(),
            unit.source.file_name(),
            self.indexing.batch_size
        );

        let delay = Duration::from_millis(self.indexing.batch_delay_ms);

        for (batch_index, batch) in chunks.chunks(self.indexing.batch_size).enumerate() {
            // Pause between batches, never after the last.
            if batch_index > 0 {
                sleep(delay).await;
            }

            let vectors: Vec<Vec<f32>> = stream::iter(batch)
                .map(|chunk| self.provider.embed(&chunk.text))
                .buffered(self.indexing.embed_concurrency)
                .try_collect()
                .await?;

            let base = batch_index * self.indexing.batch_size;
            for (offset, (chunk, vector)) in batch.iter().zip(vectors).enumerate() {
                let record = self.chunk_record(unit, chunk, base + offset, vector);

                if !seen_ids.insert(record.id.clone()) {
                    warn!(
                        "Duplicate chunk id {} written in this run; the store keeps both copies",
                        record.id
                    );
                }

                self.store.insert_item(record).await?;
            }
        }

        info!(
            "Indexed {} chunks from {}",
            chunks.len(),
            unit.source.file_name()
        );
        Ok(chunks.len())
    }

    fn chunk_record(
        &self,
        unit: &ExtractedUnit,
        chunk: &Chunk,
        chunk_index: usize,
        vector: Vec<f32>,
    ) -> ChunkRecord {
        ChunkRecord {
            id: unit.source.chunk_id(chunk_index),
            vector,
            metadata: ChunkMetadata {
                source: unit.source.clone(),
                kind: unit.kind,
                file_path: unit.file_path.clone(),
                chunk_index: chunk_index as u32,
                word_count: chunk.word_count as u32,
                text: chunk.text.clone(),
                preview: preview(&chunk.text),
                indexed_at: Utc::now().to_rfc3339(),
            },
        }
    }
}
