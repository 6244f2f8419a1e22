use extract::ParsingMethod;
use serde::Serialize;

use crate::error::IngestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    Succeeded,
    Partial,
    Failed,
    Skipped,
}

/// Outcome of ingesting one document.
#[derive(Debug, Clone, Serialize)]
pub struct IngestResult {
    pub document_name: String,
    /// Unset when the file could not be loaded.
    pub document_id: Option<String>,
    pub source_path: String,
    pub chunks_total: usize,
    pub chunks_written: usize,
    pub failed_chunks: Vec<usize>,
    pub skipped: bool,
    pub parsing_method: Option<ParsingMethod>,
    pub errors: Vec<IngestError>,
    pub duration_ms: u64,
}

impl IngestResult {
    pub(crate) fn new(document_name: String, document_id: Option<String>, source_path: String) -> Self {
        Self {
            document_name,
            document_id,
            source_path,
            chunks_total: 0,
            chunks_written: 0,
            failed_chunks: Vec::new(),
            skipped: false,
            parsing_method: None,
            errors: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn status(&self) -> IngestStatus {
        if self.skipped {
            IngestStatus::Skipped
        } else if self.errors.iter().any(IngestError::is_fatal) || self.chunks_written == 0 {
            IngestStatus::Failed
        } else if self.chunks_written < self.chunks_total {
            IngestStatus::Partial
        } else {
            IngestStatus::Succeeded
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == IngestStatus::Succeeded
    }
}

/// Batch totals for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub documents: usize,
    pub succeeded: usize,
    pub partial: usize,
    pub failed: usize,
    pub skipped: usize,
    pub chunks_written: usize,
}

impl IngestSummary {
    pub fn from_results(results: &[IngestResult]) -> Self {
        let mut summary = Self {
            documents: results.len(),
            ..Self::default()
        };

        for result in results {
            summary.chunks_written += result.chunks_written;
            match result.status() {
                IngestStatus::Succeeded => summary.succeeded += 1,
                IngestStatus::Partial => summary.partial += 1,
                IngestStatus::Failed => summary.failed += 1,
                IngestStatus::Skipped => summary.skipped += 1,
            }
        }
        summary
    }
}
