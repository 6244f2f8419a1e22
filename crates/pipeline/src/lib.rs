pub mod error;
pub mod pipeline;
pub mod providers;
pub mod result;
pub mod settings;
pub mod telemetry;

pub use error::IngestError;
pub use pipeline::IngestPipeline;
pub use providers::Providers;
pub use result::{IngestResult, IngestStatus, IngestSummary};
pub use settings::{
    EmbedderKind, LlmSettings, LogFormat, LogSettings, PipelineSettings, ServerSettings, Settings,
    SettingsError, StoreBackend, StoreSettings,
};
pub use telemetry::init_tracing;
