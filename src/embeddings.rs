//! Text embedding backend.
//!
//! `TextEmbedder` is the seam the index builds against; the production
//! implementation talks to Ollama's `/api/embed` endpoint. The model must be
//! deterministic for identical input text, which every embedding model served
//! by Ollama is.

use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use tokio::sync::RwLock;

use crate::error::ModelError;

/// Vector width produced by the default embedding model (all-minilm).
pub const EMBEDDING_DIM: usize = 384;

fn get_batch_size() -> usize {
    std::env::var("EMBEDDING_BATCH_SIZE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(32)
}

/// Deterministic dense text embedding over a fixed dimension.
pub trait TextEmbedder: Send + Sync {
    /// Embed a batch of chunk texts, one vector per input, in input order.
    fn embed(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, ModelError>> + Send;

    /// Embed a single query string.
    fn embed_query(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, ModelError>> + Send;
}

#[derive(Serialize)]
#[serde(untagged)]
enum OllamaEmbeddingRequest<'a> {
    Single { model: &'a str, input: &'a str },
    Batch { model: &'a str, input: &'a [String] },
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    #[serde(default)]
    embedding: Option<Vec<f32>>,
    #[serde(default)]
    embeddings: Option<Vec<Vec<f32>>>,
}

/// Embedding service backed by the Ollama API, with an LRU cache for query
/// embeddings so repeated questions skip the backend.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    query_cache: RwLock<LruCache<String, Vec<f32>>>,
}

impl OllamaEmbedder {
    /// Build an embedder from the environment: `OLLAMA_URL` (default
    /// `http://localhost:11434`) and `OLLAMA_EMBEDDING_MODEL` (default
    /// `all-minilm`, a 384-dimension model).
    pub fn from_env() -> Result<Self, ModelError> {
        let base_url =
            std::env::var("OLLAMA_URL").unwrap_or_else(|_| "http://localhost:11434".to_string());
        let model =
            std::env::var("OLLAMA_EMBEDDING_MODEL").unwrap_or_else(|_| "all-minilm".to_string());
        Self::new(base_url, model)
    }

    pub fn new(base_url: String, model: String) -> Result<Self, ModelError> {
        tracing::info!("Ollama URL: {}", base_url);
        tracing::info!("Embedding model: {}", model);

        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(300))
                .build()?,
            base_url,
            model,
            query_cache: RwLock::new(LruCache::new(
                NonZeroUsize::new(1000).expect("nonzero cache capacity"),
            )),
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Check that the backend is reachable and the configured model is
    /// available.
    pub async fn verify(&self) -> Result<(), ModelError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ModelError::Api {
                status: response.status(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let tags: serde_json::Value = response.json().await?;
        let models = tags["models"].as_array().cloned().unwrap_or_default();
        let exists = models
            .iter()
            .any(|m| m["name"].as_str().unwrap_or("").starts_with(&self.model));

        if !exists {
            let available: Vec<String> = models
                .iter()
                .filter_map(|m| m["name"].as_str().map(str::to_string))
                .collect();
            return Err(ModelError::ModelMissing {
                model: self.model.clone(),
                available,
            });
        }

        tracing::info!("Embedding model '{}' verified", self.model);
        Ok(())
    }

    async fn request_single(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        let request = OllamaEmbeddingRequest::Single {
            model: &self.model,
            input: text,
        };
        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ModelError::Api {
                status: response.status(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body: OllamaEmbeddingResponse = response.json().await?;
        if let Some(embedding) = body.embedding {
            Ok(embedding)
        } else if let Some(embeddings) = body.embeddings {
            embeddings
                .into_iter()
                .next()
                .ok_or(ModelError::EmptyResponse)
        } else {
            Err(ModelError::EmptyResponse)
        }
    }

    async fn request_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        let request = OllamaEmbeddingRequest::Batch {
            model: &self.model,
            input: texts,
        };
        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ModelError::Api {
                status: response.status(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body: OllamaEmbeddingResponse = response.json().await?;
        if let Some(embeddings) = body.embeddings {
            if embeddings.len() == texts.len() {
                return Ok(embeddings);
            }
            tracing::warn!(
                "batch embedding returned {} vectors for {} texts, falling back to sequential",
                embeddings.len(),
                texts.len()
            );
        } else if body.embedding.is_some() {
            tracing::warn!(
                "model '{}' does not support batch embeddings, falling back to sequential",
                self.model
            );
        }

        let mut result = Vec::with_capacity(texts.len());
        for text in texts {
            result.push(self.request_single(text).await?);
        }
        Ok(result)
    }
}

impl TextEmbedder for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let batch_size = get_batch_size();
        let total_batches = texts.len().div_ceil(batch_size);
        let mut embeddings = Vec::with_capacity(texts.len());

        for (batch_idx, batch) in texts.chunks(batch_size).enumerate() {
            tracing::debug!(
                "embedding batch {}/{} ({} texts)",
                batch_idx + 1,
                total_batches,
                batch.len()
            );
            let batch_embeddings = self.request_batch(batch).await?;
            if batch_embeddings.len() != batch.len() {
                return Err(ModelError::EmbeddingCountMismatch {
                    expected: batch.len(),
                    got: batch_embeddings.len(),
                });
            }
            embeddings.extend(batch_embeddings);
        }

        Ok(embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        if let Some(cached) = self.query_cache.write().await.get(text) {
            return Ok(cached.clone());
        }

        let embedding = self.request_single(text).await?;
        self.query_cache
            .write()
            .await
            .put(text.to_string(), embedding.clone());
        Ok(embedding)
    }
}
