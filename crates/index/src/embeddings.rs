use async_trait::async_trait;
use extract::ProviderError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Text embedding capability.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Get embedding dimension
    async fn dimension(&self) -> Result<usize, ProviderError> {
        let sample = self.embed("dimension check").await?;
        Ok(sample.len())
    }
}

#[derive(Clone)]
pub struct EmbeddingClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

impl EmbeddingClient {
    pub fn new(base_url: String, model: String, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            client,
            retry: RetryPolicy::none(),
        })
    }

    /// Retry transient provider failures (rate limits, timeouts, 5xx)
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let url = format!("{}/api/embeddings", self.base_url);

        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body));
        }

        let embedding_response: EmbeddingResponse = response.json().await?;

        if embedding_response.embedding.is_empty() {
            return Err(ProviderError::InvalidResponse("empty embedding".to_string()));
        }

        Ok(embedding_response.embedding)
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.retry
            .retry("embed", ProviderError::is_transient, || self.request(text))
            .await
    }
}

/// Deterministic, offline embedder: hashed character trigrams folded into a
/// fixed number of dimensions and L2-normalised. Used for the in-memory
/// backend and in tests.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimension];
        let lowered: Vec<char> = text.to_lowercase().chars().collect();

        for window in lowered.windows(3) {
            // FNV-1a over the trigram
            let mut hash: u64 = 0xcbf29ce484222325;
            for ch in window {
                hash ^= *ch as u64;
                hash = hash.wrapping_mul(0x100000001b3);
            }
            vector[(hash % self.dimension as u64) as usize] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model(&self) -> &str {
        "hash-trigram"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        Ok(self.embed_sync(text))
    }

    async fn dimension(&self) -> Result<usize, ProviderError> {
        Ok(self.dimension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_embedder_is_deterministic() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("Senior Rust engineer").await.unwrap();
        let b = embedder.embed("Senior Rust engineer").await.unwrap();

        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_embedding_client_parses_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/embeddings")
            .with_status(200)
            .with_body(r#"{"embedding": [0.1, 0.2, 0.3]}"#)
            .create_async()
            .await;

        let client =
            EmbeddingClient::new(server.url(), "nomic-embed-text".into(), Duration::from_secs(5)).unwrap();

        assert_eq!(client.embed("hello").await.unwrap(), vec![0.1, 0.2, 0.3]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_embedding_client_retries_server_errors() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/embeddings")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let client = EmbeddingClient::new(server.url(), "nomic-embed-text".into(), Duration::from_secs(5))
            .unwrap()
            .with_retry(RetryPolicy::new(2, 1, 1));

        let err = client.embed("hello").await.unwrap_err();
        assert!(matches!(err, ProviderError::Server(503, _)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_embedding_client_does_not_retry_auth() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/embeddings")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;

        let client = EmbeddingClient::new(server.url(), "nomic-embed-text".into(), Duration::from_secs(5))
            .unwrap()
            .with_retry(RetryPolicy::new(2, 1, 1));

        assert!(matches!(client.embed("hello").await, Err(ProviderError::Auth(_))));
        mock.assert_async().await;
    }
}
