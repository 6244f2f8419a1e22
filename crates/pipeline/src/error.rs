use serde::Serialize;
use thiserror::Error;

/// Per-document failure record. Collected into `IngestResult::errors`, never
/// propagated past the document.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IngestError {
    #[error("load failed: {message}")]
    Load { message: String },

    #[error("collection unavailable: {message}")]
    Collection { message: String },

    /// Non-fatal: the document is indexed with all-`not_found` metadata.
    #[error("metadata extraction failed: {message}")]
    Extraction { message: String },

    #[error("embedding failed for chunk {chunk_index}: {message}")]
    Embedding { chunk_index: usize, message: String },

    #[error("store write failed: {message}")]
    Store {
        chunk_index: Option<usize>,
        message: String,
    },
}

impl IngestError {
    pub fn load(err: impl ToString) -> Self {
        Self::Load {
            message: err.to_string(),
        }
    }

    pub fn collection(err: impl ToString) -> Self {
        Self::Collection {
            message: err.to_string(),
        }
    }

    /// Whether the error stopped the document from being indexed at all.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Load { .. } | Self::Collection { .. })
    }
}
