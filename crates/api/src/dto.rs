use index::{CollectionStats, DocumentSummary, MetadataFilter};
use pipeline::{IngestResult, IngestSummary};
use query::{CandidateMatch, Source};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub store: String,
}

#[derive(Deserialize)]
pub struct CreateCollectionRequest {
    pub name: String,
}

#[derive(Serialize)]
pub struct CollectionsResponse {
    pub collections: Vec<String>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct CollectionResponse {
    pub collection: String,
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub collection: String,
    #[serde(flatten)]
    pub stats: CollectionStats,
}

#[derive(Serialize)]
pub struct DocumentsResponse {
    pub collection: String,
    pub documents: Vec<DocumentSummary>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct DeleteDocumentResponse {
    pub document_id: String,
    pub records_removed: usize,
}

#[derive(Deserialize)]
pub struct IngestRequest {
    /// File or directory on the server's filesystem
    pub path: String,
    pub collection: Option<String>,
}

#[derive(Serialize)]
pub struct IngestResponse {
    pub collection: String,
    pub summary: IngestSummary,
    pub results: Vec<IngestResult>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    #[default]
    Search,
    Candidates,
    Rag,
}

#[derive(Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub collection: Option<String>,
    #[serde(default)]
    pub mode: QueryMode,
    /// Chunks to retrieve
    pub k: Option<usize>,
    /// Resumes to return in `candidates` mode
    pub top_n: Option<usize>,
    pub filter: Option<MetadataFilter>,
}

#[derive(Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum QueryResponse {
    Search {
        sources: Vec<Source>,
        query_time_ms: u64,
    },
    Candidates {
        candidates: Vec<CandidateMatch>,
        query_time_ms: u64,
    },
    Rag {
        answer: String,
        sources: Vec<Source>,
        query_time_ms: u64,
    },
}
