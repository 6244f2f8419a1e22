use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use ingest::ChunkerConfig;
use index::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Project-local settings file, merged when present.
pub const DEFAULT_SETTINGS_FILE: &str = "resume-rag.yaml";
pub const ENV_PREFIX: &str = "RESUME_RAG_";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to load settings: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid chunker settings: {0}")]
    InvalidChunker(String),

    #[error("Invalid max_concurrent_files: {0}. Must be at least 1")]
    InvalidConcurrency(usize),

    #[error("Invalid upsert_batch_size: {0}. Must be at least 1")]
    InvalidBatchSize(usize),

    #[error("Invalid backoff configuration: initial_backoff_ms ({0}) must not exceed max_backoff_ms ({1})")]
    InvalidBackoff(u64, u64),

    #[error("Invalid collection name: {0:?}")]
    InvalidCollection(String),

    #[error("Invalid vector dimension: {0}")]
    InvalidDimension(usize),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub llm: LlmSettings,
    pub store: StoreSettings,
    pub pipeline: PipelineSettings,
    pub retry: RetryConfig,
    pub server: ServerSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// Ollama `/api/embeddings`
    Ollama,
    /// Offline hashed trigrams
    Hash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub embedder: EmbedderKind,
    pub request_timeout_secs: u64,
    pub temperature: f32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            chat_model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            embedder: EmbedderKind::Ollama,
            request_timeout_secs: 120,
            temperature: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Qdrant,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub url: String,
    /// Vector size for new collections. Probed from the embedder when unset.
    pub dimension: Option<usize>,
    pub request_timeout_secs: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Qdrant,
            url: "http://localhost:6333".to_string(),
            dimension: None,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub collection: String,
    pub create_collection_if_missing: bool,
    pub enable_llm_parsing: bool,
    pub skip_existing: bool,
    pub max_concurrent_files: usize,
    pub upsert_batch_size: usize,
    pub chunker: ChunkerConfig,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            collection: "resumes".to_string(),
            create_collection_if_missing: true,
            enable_llm_parsing: true,
            skip_existing: false,
            max_concurrent_files: 4,
            upsert_batch_size: 64,
            chunker: ChunkerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Settings {
    /// Load settings with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. `resume-rag.yaml` in the working directory, if present
    /// 3. Environment variables (`RESUME_RAG_*`, `__` separates sections)
    pub fn load() -> Result<Self, SettingsError> {
        Self::extract(Figment::new().merge(Yaml::file(DEFAULT_SETTINGS_FILE)))
    }

    /// Same precedence as [`Settings::load`] with an explicit file in place
    /// of the project-local one.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        Self::extract(Figment::new().merge(Yaml::file(path.as_ref())))
    }

    fn extract(files: Figment) -> Result<Self, SettingsError> {
        let settings: Settings = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(files)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log.level.to_lowercase().as_str()) {
            return Err(SettingsError::InvalidLogLevel(self.log.level.clone()));
        }

        self.pipeline
            .chunker
            .validate()
            .map_err(|e| SettingsError::InvalidChunker(e.to_string()))?;

        if self.pipeline.max_concurrent_files == 0 {
            return Err(SettingsError::InvalidConcurrency(self.pipeline.max_concurrent_files));
        }

        if self.pipeline.upsert_batch_size == 0 {
            return Err(SettingsError::InvalidBatchSize(self.pipeline.upsert_batch_size));
        }

        if index::validate_collection_name(&self.pipeline.collection).is_err() {
            return Err(SettingsError::InvalidCollection(self.pipeline.collection.clone()));
        }

        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(SettingsError::InvalidBackoff(
                self.retry.initial_backoff_ms,
                self.retry.max_backoff_ms,
            ));
        }

        if let Some(0) = self.store.dimension {
            return Err(SettingsError::InvalidDimension(0));
        }

        Ok(())
    }
}
