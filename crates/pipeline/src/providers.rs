use anyhow::{Context, Result};
use extract::{LlmProvider, OllamaClient};
use index::{Embedder, EmbeddingClient, HashEmbedder, InMemoryStore, QdrantStore, RetryPolicy, VectorStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::pipeline::IngestPipeline;
use crate::settings::{EmbedderKind, Settings, StoreBackend};

/// Dimension of the offline hash embedder when the store does not set one.
const HASH_DIMENSION: usize = 384;

/// Shared clients built from settings.
#[derive(Clone)]
pub struct Providers {
    /// Free-text generation, used for answers.
    pub llm: Arc<dyn LlmProvider>,
    /// Same model constrained to JSON output, used for metadata extraction.
    pub extraction_llm: Arc<dyn LlmProvider>,
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn VectorStore>,
}

impl Providers {
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let llm = build_llm(settings, false)?;
        let extraction_llm = build_llm(settings, true)?;
        let embedder = build_embedder(settings)?;
        let store = build_store(settings, embedder.as_ref()).await?;

        Ok(Self {
            llm,
            extraction_llm,
            embedder,
            store,
        })
    }

    pub fn pipeline(&self, settings: &Settings) -> Result<IngestPipeline> {
        IngestPipeline::new(
            settings.pipeline.clone(),
            self.embedder.clone(),
            self.store.clone(),
            Some(self.extraction_llm.clone()),
        )
    }
}

pub fn build_llm(settings: &Settings, json_mode: bool) -> Result<Arc<dyn LlmProvider>> {
    Ok(Arc::new(ollama_client(settings, json_mode)?))
}

fn ollama_client(settings: &Settings, json_mode: bool) -> Result<OllamaClient> {
    let llm = &settings.llm;
    let client = OllamaClient::new(
        llm.base_url.clone(),
        llm.chat_model.clone(),
        Duration::from_secs(llm.request_timeout_secs),
    )
    .context("Failed to build LLM client")?
    .with_temperature(llm.temperature)
    .with_json_mode(json_mode);

    Ok(client)
}

pub fn build_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    let llm = &settings.llm;
    match llm.embedder {
        EmbedderKind::Ollama => {
            let client = EmbeddingClient::new(
                llm.base_url.clone(),
                llm.embedding_model.clone(),
                Duration::from_secs(llm.request_timeout_secs),
            )
            .context("Failed to build embedding client")?
            .with_retry(RetryPolicy::from_config(&settings.retry));
            Ok(Arc::new(client))
        }
        EmbedderKind::Hash => Ok(Arc::new(HashEmbedder::new(
            settings.store.dimension.unwrap_or(HASH_DIMENSION),
        ))),
    }
}

pub async fn build_store(settings: &Settings, embedder: &dyn Embedder) -> Result<Arc<dyn VectorStore>> {
    match settings.store.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryStore::new())),
        StoreBackend::Qdrant => {
            let dimension = match settings.store.dimension {
                Some(dimension) => dimension,
                None => embedder
                    .dimension()
                    .await
                    .context("Failed to measure embedding dimension")?,
            };
            info!(url = %settings.store.url, dimension, "Using Qdrant vector store");

            let store = QdrantStore::new(
                settings.store.url.clone(),
                dimension,
                Duration::from_secs(settings.store.request_timeout_secs),
            )
            .context("Failed to build Qdrant client")?;
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_providers() {
        let mut settings = Settings::default();
        settings.store.backend = StoreBackend::Memory;
        settings.llm.embedder = EmbedderKind::Hash;
        settings.store.dimension = Some(32);

        let providers = Providers::from_settings(&settings).await.unwrap();
        assert_eq!(providers.embedder.dimension().await.unwrap(), 32);
        assert_eq!(providers.llm.model(), "llama3.2");
        assert!(providers.store.list_collections().await.unwrap().is_empty());
        assert_eq!(providers.extraction_llm.model(), "llama3.2");
        assert!(providers.pipeline(&settings).is_ok());
    }

    #[test]
    fn test_only_extraction_client_requests_json() {
        let settings = Settings::default();
        assert!(!ollama_client(&settings, false).unwrap().json_mode());
        assert!(ollama_client(&settings, true).unwrap().json_mode());
    }
}
