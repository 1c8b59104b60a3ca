// Ollama client
// Async HTTP client for the embedding and model-listing endpoints


use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::config::OllamaConfig;
use crate::embeddings::{EmbeddingProvider, normalize};
use crate::{Result, SemdexError};

/// Client for an Ollama-compatible embedding server.
///
/// Every request is made exactly once; retry policy belongs to the caller
/// (the indexing loop skips the failing file, search aborts).
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: Url,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// One entry of the server's model listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let base_url = config
            .base_url()
            .map_err(|e| SemdexError::Config(format!("Invalid Ollama URL: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| SemdexError::Embedding(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            model: config.model.clone(),
            dimension: config.embedding_dimension as usize,
        })
    }

    /// Models the server currently has available.
    #[inline]
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint("api/tags")?;
        debug!("Fetching model list from {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            SemdexError::Embedding(format!(
                "Failed to reach embedding server at {}: {}",
                self.base_url, e
            ))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SemdexError::Embedding(format!(
                "Embedding server returned {} for model list: {}",
                status, body
            )));
        }

        let parsed: ModelsResponse = response.json().await.map_err(|e| {
            SemdexError::Embedding(format!("Failed to parse model list: {}", e))
        })?;

        Ok(parsed.models)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| SemdexError::Embedding(format!("Failed to build server URL: {}", e)))
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaClient {
    #[inline]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let prompt = normalize(text);
        debug!("Requesting embedding for {} chars", prompt.len());

        let url = self.endpoint("api/embeddings")?;
        let request = EmbedRequest {
            model: &self.model,
            prompt: &prompt,
        };

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| SemdexError::Embedding(format!("Embedding request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SemdexError::Embedding(format!(
                "Embedding server returned {}: {}",
                status, body
            )));
        }

        let parsed: EmbedResponse = response.json().await.map_err(|e| {
            SemdexError::Embedding(format!("Failed to parse embedding response: {}", e))
        })?;

        if parsed.embedding.len() != self.dimension {
            return Err(SemdexError::Embedding(format!(
                "Server returned {} dimensions, expected {}",
                parsed.embedding.len(),
                self.dimension
            )));
        }

        Ok(parsed.embedding)
    }

    #[inline]
    async fn health_check(&self) -> Result<()> {
        debug!("Checking embedding server at {}", self.base_url);
        let models = self.list_models().await?;

        if models.iter().any(|model| model.name == self.model) {
            info!("Embedding server healthy, model {} available", self.model);
            Ok(())
        } else {
            let available: Vec<&str> = models.iter().map(|model| model.name.as_str()).collect();
            Err(SemdexError::Embedding(format!(
                "Model '{}' is not available on the server (available: {})",
                self.model,
                available.join(", ")
            )))
        }
    }
}
