// Embeddings module
// Chunking, input normalization, and the provider seam used by the pipeline

pub mod chunking;
pub mod ollama;

use async_trait::async_trait;

use crate::Result;

pub use chunking::{Chunk, ChunkingConfig, chunk_text};
pub use ollama::OllamaClient;

/// Produces fixed-dimension embedding vectors for chunk and query text.
///
/// Implementations normalize their input (see [`normalize`]) so identical
/// content embeds identically regardless of source formatting.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Verify the provider is reachable and serving the configured model.
    async fn health_check(&self) -> Result<()>;
}

/// Trim and collapse internal whitespace runs to single spaces.
#[inline]
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
