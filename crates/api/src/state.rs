use index::VectorStore;
use pipeline::{IngestPipeline, Providers, Settings};
use query::QueryEngine;
use std::sync::Arc;

use crate::metrics::Metrics;

/// Shared state for all handlers
pub struct AppState {
    pub settings: Settings,
    pub pipeline: IngestPipeline,
    pub query: QueryEngine,
    pub store: Arc<dyn VectorStore>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(settings: Settings, providers: Providers) -> anyhow::Result<Arc<Self>> {
        let pipeline = providers.pipeline(&settings)?;
        let query = QueryEngine::new(
            providers.embedder.clone(),
            providers.store.clone(),
            providers.llm.clone(),
        );

        Ok(Arc::new(Self {
            settings,
            pipeline,
            query,
            store: providers.store,
            metrics: Metrics::new(),
        }))
    }

    /// Request collection, or the configured default.
    pub fn collection<'a>(&'a self, requested: &'a Option<String>) -> &'a str {
        requested
            .as_deref()
            .unwrap_or(self.settings.pipeline.collection.as_str())
    }
}
