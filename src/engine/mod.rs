// Search engine module
// Composes the store, embedding provider, and pipeline behind one handle


use std::path::{Path, PathBuf};
use std::sync::Arc;

use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::Result;
use crate::config::Config;
use crate::embeddings::EmbeddingProvider;
use crate::embeddings::chunking::ChunkingConfig;
use crate::embeddings::ollama::OllamaClient;
use crate::extract::{self, DocumentKind};
use crate::indexer::{IndexSummary, Indexer, IndexingConfig};
use crate::search::{self, SearchOptions, SearchResult};
use crate::store::lance::LanceStore;
use crate::store::{QueryHit, StoredChunk, VectorStore};

/// Ready-to-use handle over the vector store, embedding provider, and
/// indexing pipeline.
///
/// Construction either yields a usable engine or fails with the underlying
/// store or config error; there is no half-initialized state.
pub struct SearchEngine {
    store: Arc<dyn VectorStore>,
    provider: Arc<dyn EmbeddingProvider>,
    indexer: Indexer,
}

/// Aggregate statistics over the stored index.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexStatus {
    pub total_files: usize,
    pub total_chunks: usize,
    pub files: Vec<FileStats>,
}

/// Chunk statistics for one indexed file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileStats {
    pub file_name: String,
    pub kind: DocumentKind,
    pub chunks: usize,
    pub words: u64,
}

/// [`IndexStatus`] plus totals broken down by document kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexAnalysis {
    pub total_files: usize,
    pub total_chunks: usize,
    pub total_words: u64,
    pub kinds: Vec<KindStats>,
    pub files: Vec<FileStats>,
}

/// Totals for one document kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KindStats {
    pub kind: DocumentKind,
    pub files: usize,
    pub chunks: usize,
    pub words: u64,
}

/// Outcome of indexing a batch of files with skip-and-continue semantics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexReport {
    pub files_indexed: usize,
    pub chunks_created: usize,
    pub skipped: Vec<SkippedFile>,
}

/// A file left out of the index and the reason why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

impl SearchEngine {
    /// Connect the LanceDB store, create the chunk table, and build the
    /// Ollama client.
    #[inline]
    pub async fn initialize(config: &Config) -> Result<Self> {
        config.validate()?;

        let store =
            LanceStore::connect(&config.index_dir(), config.ollama.embedding_dimension as usize)
                .await?;
        store.create_index().await?;
        let provider = OllamaClient::new(&config.ollama)?;

        info!("Search engine ready (index at {})", config.index_dir().display());

        Ok(Self::with_components(
            Arc::new(store),
            Arc::new(provider),
            config.chunking.clone(),
            config.indexing.clone(),
        ))
    }

    /// Build an engine from explicit collaborators.
    #[inline]
    pub fn with_components(
        store: Arc<dyn VectorStore>,
        provider: Arc<dyn EmbeddingProvider>,
        chunking: ChunkingConfig,
        indexing: IndexingConfig,
    ) -> Self {
        let indexer = Indexer::new(Arc::clone(&store), Arc::clone(&provider), chunking, indexing);
        Self {
            store,
            provider,
            indexer,
        }
    }

    /// Verify the embedding provider is reachable and serving its model.
    #[inline]
    pub async fn health(&self) -> Result<()> {
        self.provider.health_check().await
    }

    /// Extract and index a single file.
    #[inline]
    pub async fn index_file(&self, path: &Path) -> Result<IndexSummary> {
        let units = extract::extract_file(path).await?;
        debug!("Extracted {} units from {}", units.len(), path.display());
        self.indexer.index_units(&units).await
    }

    /// Index several files, skipping those whose extraction or embedding
    /// fails and aborting on store failures.
    #[inline]
    pub async fn index_paths(&self, files: &[PathBuf]) -> Result<IndexReport> {
        let mut report = IndexReport::default();

        for path in files {
            match self.index_file(path).await {
                Ok(summary) => {
                    report.files_indexed += 1;
                    report.chunks_created += summary.chunks_created;
                }
                Err(e) if e.aborts_file_only() => {
                    warn!("Skipping {}: {}", path.display(), e);
                    report.skipped.push(SkippedFile {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "Indexed {} files ({} chunks), skipped {}",
            report.files_indexed,
            report.chunks_created,
            report.skipped.len()
        );
        Ok(report)
    }

    /// Hybrid search: embed the query, over-fetch candidates, and re-rank.
    #[inline]
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        let hits = self.candidates(query, top_k).await?;
        Ok(search::rank_candidates(hits, query, top_k, options))
    }

    /// Raw over-fetched candidate set for a query, in store similarity order.
    #[inline]
    pub async fn candidates(&self, query: &str, top_k: usize) -> Result<Vec<QueryHit>> {
        let vector = self.provider.embed(query).await?;
        let pool = search::candidate_pool_size(top_k);
        let hits = self.store.query_items(&vector, pool).await?;
        debug!("Fetched {} of up to {} candidates", hits.len(), pool);
        Ok(hits)
    }

    /// Stored chunks whose text contains `needle`, without touching vectors.
    #[inline]
    pub async fn find_text(&self, needle: &str, case_sensitive: bool) -> Result<Vec<StoredChunk>> {
        let items = self.store.list_items().await?;
        let needle_lower = needle.to_lowercase();

        Ok(items
            .into_iter()
            .filter(|item| {
                if case_sensitive {
                    item.metadata.text.contains(needle)
                } else {
                    item.metadata.text.to_lowercase().contains(&needle_lower)
                }
            })
            .collect())
    }

    /// Aggregate statistics, zero-valued on a fresh or absent index.
    #[inline]
    pub async fn status(&self) -> Result<IndexStatus> {
        let files = self.file_stats().await?;

        Ok(IndexStatus {
            total_files: files.len(),
            total_chunks: files.iter().map(|f| f.chunks).sum(),
            files,
        })
    }

    /// Status plus per-kind totals.
    #[inline]
    pub async fn analyze(&self) -> Result<IndexAnalysis> {
        let files = self.file_stats().await?;

        let kinds: Vec<KindStats> = files
            .iter()
            .into_group_map_by(|f| f.kind)
            .into_iter()
            .map(|(kind, group)| KindStats {
                kind,
                files: group.len(),
                chunks: group.iter().map(|f| f.chunks).sum(),
                words: group.iter().map(|f| f.words).sum(),
            })
            .sorted_by_key(|k| k.kind)
            .collect();

        Ok(IndexAnalysis {
            total_files: files.len(),
            total_chunks: files.iter().map(|f| f.chunks).sum(),
            total_words: files.iter().map(|f| f.words).sum(),
            kinds,
            files,
        })
    }

    /// Delete the whole index; a missing index is already clear.
    #[inline]
    pub async fn clear(&self) -> Result<()> {
        self.store.delete_index().await?;
        info!("Index cleared");
        Ok(())
    }

    async fn file_stats(&self) -> Result<Vec<FileStats>> {
        let items = self.store.list_items().await?;

        Ok(items
            .into_iter()
            .into_group_map_by(|item| item.metadata.source.file_name().to_string())
            .into_iter()
            .map(|(file_name, chunks)| FileStats {
                file_name,
                kind: chunks[0].metadata.kind,
                chunks: chunks.len(),
                words: chunks.iter().map(|c| u64::from(c.metadata.word_count)).sum(),
            })
            .sorted_by(|a, b| a.file_name.cmp(&b.file_name))
            .collect())
    }
}
