use super::cache::QueryCache;
use super::Embedder;
use crate::config::EmbeddingsConfig;
use crate::error::{DocdexError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request structure for the embedding service
#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

/// Response structure from the embedding service
#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

/// Individual embedding in the response
#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// HTTP embedding client.
///
/// Talks to an OpenAI-shape embeddings endpoint (typically a self-hosted E5
/// server). E5 models require asymmetric prefixes: chunks are embedded as
/// `passage: ...`, queries as `query: ...`. Batches are split to the
/// configured size, transient failures are retried with exponential backoff,
/// and query embeddings go through an LRU cache.
pub struct HttpEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    batch_size: usize,
    dimensions: usize,
    max_retries: usize,
    cache: QueryCache,
}

impl HttpEmbedder {
    /// Build an embedder from configuration, resolving the API key from the
    /// configured environment variable (empty name = authless endpoint).
    pub fn from_config(config: &EmbeddingsConfig) -> Result<Self> {
        let api_key = if config.api_key_env.is_empty() {
            None
        } else {
            Some(std::env::var(&config.api_key_env).map_err(|_| {
                DocdexError::Config(format!(
                    "Environment variable {} not set",
                    config.api_key_env
                ))
            })?)
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            batch_size: config.batch_size.max(1),
            dimensions: config.dimensions,
            max_retries: config.max_retries,
            cache: QueryCache::new(config.cache_capacity),
        })
    }

    /// One POST to the embedding service
    async fn request_embeddings(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let expected = input.len();
        let request = EmbeddingRequest {
            model: self.model.clone(),
            input,
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| DocdexError::Embedding(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(DocdexError::Embedding(format!(
                "Embedding service error {}: {}",
                status, body
            )));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| DocdexError::Embedding(format!("Failed to parse response: {}", e)))?;

        let vectors: Vec<Vec<f32>> = result.data.into_iter().map(|d| d.embedding).collect();
        validate_vectors(&vectors, expected, self.dimensions)?;
        Ok(vectors)
    }

    /// Retry transient failures (429 / 5xx) with exponential backoff
    async fn request_with_retry(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let mut attempt = 0;
        let mut delay = Duration::from_secs(1);

        loop {
            match self.request_embeddings(input.clone()).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) if attempt < self.max_retries && is_retryable(&e) => {
                    log::warn!("Retry {}/{} after error: {}", attempt + 1, self.max_retries, e);
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let prefixed: Vec<String> = texts.iter().map(|t| passage_text(t)).collect();
        let mut all_embeddings = Vec::with_capacity(prefixed.len());

        for batch in prefixed.chunks(self.batch_size) {
            let embeddings = self.request_with_retry(batch.to_vec()).await?;
            all_embeddings.extend(embeddings);

            // Small delay between full batches to stay under service rate limits
            if batch.len() == self.batch_size {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }

        Ok(all_embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cached) = self.cache.get(text) {
            log::debug!("Embedding cache hit for query: {}", text);
            return Ok(cached);
        }

        let mut vectors = self.request_with_retry(vec![query_text(text)]).await?;
        if vectors.is_empty() {
            return Err(DocdexError::Embedding(
                "Empty response from embedding service".to_string(),
            ));
        }
        let embedding = vectors.remove(0);
        self.cache.put(text.to_string(), embedding.clone());
        Ok(embedding)
    }

    fn model_tag(&self) -> &str {
        &self.model
    }
}

/// E5 passage-side conditioning for document chunks
fn passage_text(text: &str) -> String {
    format!("passage: {}", text)
}

/// E5 query-side conditioning for search queries
fn query_text(text: &str) -> String {
    format!("query: {}", text)
}

/// Check count and dimensionality of a service response.
fn validate_vectors(vectors: &[Vec<f32>], expected: usize, dimensions: usize) -> Result<()> {
    if vectors.len() != expected {
        return Err(DocdexError::Embedding(format!(
            "Embedding count mismatch: sent {} texts, got {} vectors",
            expected,
            vectors.len()
        )));
    }
    for v in vectors {
        if dimensions > 0 && v.len() != dimensions {
            return Err(DocdexError::Embedding(format!(
                "Unexpected embedding dimension: expected {}, got {}",
                dimensions,
                v.len()
            )));
        }
    }
    Ok(())
}

/// Transient service failures worth retrying: rate limits and server errors.
fn is_retryable(e: &DocdexError) -> bool {
    let msg = e.to_string();
    msg.contains("429")
        || msg.contains("500")
        || msg.contains("502")
        || msg.contains("503")
        || msg.contains("504")
}
