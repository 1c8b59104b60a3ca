use thiserror::Error;

pub type Result<T> = std::result::Result<T, SemdexError>;

#[derive(Error, Debug)]
pub enum SemdexError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl SemdexError {
    /// Whether this failure should abort only the file being processed.
    ///
    /// Extraction and embedding errors skip the current file and let the
    /// caller's loop continue; store and configuration errors abort the
    /// whole operation.
    #[inline]
    pub fn aborts_file_only(&self) -> bool {
        matches!(
            self,
            Self::Extraction(_) | Self::UnsupportedFormat(_) | Self::Embedding(_)
        )
    }
}

pub mod commands;
pub mod config;
pub mod embeddings;
pub mod engine;
pub mod extract;
pub mod indexer;
pub mod search;
pub mod store;
