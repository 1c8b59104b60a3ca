#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::embeddings::chunking::ChunkingConfig;
use crate::indexer::IndexingConfig;

pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 768;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
    /// Set from the CLI `--index-dir` flag; never persisted.
    #[serde(skip)]
    pub index_override: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub embedding_dimension: u32,
    pub timeout_seconds: u64,
}

impl Default for OllamaConfig {
    #[inline]
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "nomic-embed-text:latest".to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            timeout_seconds: 30,
        }
    }
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            ollama: OllamaConfig::default(),
            chunking: ChunkingConfig::default(),
            indexing: IndexingConfig::default(),
            base_dir: PathBuf::new(),
            index_override: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No configuration directory could be determined for this platform")]
    DirectoryError,
    #[error("Endpoint {0:?} does not form a valid URL")]
    InvalidUrl(String),
    #[error("Port {0} is out of range (1-65535)")]
    InvalidPort(u16),
    #[error("Model name {0:?} must not be blank")]
    InvalidModel(String),
    #[error("Protocol {0:?} is not supported (use http or https)")]
    InvalidProtocol(String),
    #[error("Embedding dimension {0} is out of range (64-4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Timeout of {0} seconds is out of range (1-300)")]
    InvalidTimeout(u64),
    #[error("Chunk size {0} is out of range (1-10000 words)")]
    InvalidChunkSize(usize),
    #[error("Overlap {0} must be smaller than chunk size {1}")]
    InvalidOverlap(usize, usize),
    #[error("Batch size {0} is out of range (1-100)")]
    InvalidBatchSize(usize),
    #[error("Embed concurrency {0} is out of range (1-100)")]
    InvalidEmbedConcurrency(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Could not serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl From<ConfigError> for crate::SemdexError {
    #[inline]
    fn from(e: ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

impl Config {
    /// Load configuration from `<config_dir>/config.toml`, falling back to
    /// defaults when the file does not exist.
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Could not read config file {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Could not parse config file {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config.validate().context("Invalid configuration")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Refusing to save an invalid configuration")?;

        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Could not create config directory {}",
                self.base_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Could not serialize configuration")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Could not write config file {}", config_path.display()))?;

        Ok(())
    }

    /// Platform configuration directory for semdex (e.g. `~/.config/semdex`).
    #[inline]
    pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("semdex"))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.base_dir.join("config.toml")
    }

    /// Directory holding the vector index (an opaque LanceDB directory).
    #[inline]
    pub fn index_dir(&self) -> PathBuf {
        self.index_override
            .clone()
            .unwrap_or_else(|| self.base_dir.join("index"))
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ollama.validate()?;
        self.validate_chunking()?;
        self.validate_indexing()?;
        Ok(())
    }

    fn validate_chunking(&self) -> Result<(), ConfigError> {
        let chunking = &self.chunking;

        if !(1..=10_000).contains(&chunking.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(chunking.chunk_size));
        }

        // Stride must stay positive or the chunk windows never advance.
        if chunking.overlap >= chunking.chunk_size {
            return Err(ConfigError::InvalidOverlap(
                chunking.overlap,
                chunking.chunk_size,
            ));
        }

        Ok(())
    }

    fn validate_indexing(&self) -> Result<(), ConfigError> {
        let indexing = &self.indexing;

        if !(1..=100).contains(&indexing.batch_size) {
            return Err(ConfigError::InvalidBatchSize(indexing.batch_size));
        }

        if !(1..=100).contains(&indexing.embed_concurrency) {
            return Err(ConfigError::InvalidEmbedConcurrency(
                indexing.embed_concurrency,
            ));
        }

        Ok(())
    }
}

impl OllamaConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if !(64..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        if !(1..=300).contains(&self.timeout_seconds) {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }

        Ok(())
    }

    #[inline]
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }
}
