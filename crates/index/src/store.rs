use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::record::IndexedRecord;

#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Collection already exists: {0}")]
    CollectionExists(String),

    #[error("Invalid collection name: {0}")]
    InvalidName(String),

    #[error("Invalid record {id}: {reason}")]
    InvalidRecord { id: String, reason: String },

    #[error("Vector store request failed: {0}")]
    Backend(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Equality filter over record metadata. A record matches when every key is
/// present with an equal value, or, for array values, contains the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataFilter {
    pub equals: BTreeMap<String, Value>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.equals.is_empty()
    }

    pub fn matches(&self, metadata: &Map<String, Value>) -> bool {
        self.equals.iter().all(|(key, expected)| match metadata.get(key) {
            Some(Value::Array(items)) if !expected.is_array() => items.contains(expected),
            Some(actual) => actual == expected,
            None => false,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub id: String,
    pub text: String,
    pub score: f32,
    pub metadata: Map<String, Value>,
}

impl ScoredRecord {
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

/// A stored chunk read back without a query vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    pub text: String,
    pub metadata: Map<String, Value>,
}

impl StoredRecord {
    pub fn chunk_index(&self) -> Option<usize> {
        self.metadata
            .get("chunk_index")
            .and_then(Value::as_u64)
            .map(|i| i as usize)
    }
}

/// Order chunks of one document by position.
pub fn sort_by_chunk_index(records: &mut [StoredRecord]) {
    records.sort_by(|a, b| {
        a.chunk_index()
            .unwrap_or(usize::MAX)
            .cmp(&b.chunk_index().unwrap_or(usize::MAX))
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub item_count: usize,
    pub document_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub document_id: String,
    pub document_name: String,
    pub file_format: String,
    pub source_path: String,
    pub chunk_count: usize,
}

/// Collection names: 1-64 chars of ASCII letters, digits, '-' and '_'.
pub fn validate_collection_name(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

/// Group per-record metadata into per-document summaries, ordered by name.
pub fn summarize_documents<'a, I>(metadatas: I) -> Vec<DocumentSummary>
where
    I: IntoIterator<Item = &'a Map<String, Value>>,
{
    let mut documents: BTreeMap<String, DocumentSummary> = BTreeMap::new();
    let text = |m: &Map<String, Value>, key: &str| {
        m.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
    };

    for metadata in metadatas {
        let document_id = text(metadata, "document_id");
        documents
            .entry(document_id.clone())
            .or_insert_with(|| DocumentSummary {
                document_id,
                document_name: text(metadata, "document_name"),
                file_format: text(metadata, "file_format"),
                source_path: text(metadata, "source_path"),
                chunk_count: 0,
            })
            .chunk_count += 1;
    }

    let mut summaries: Vec<DocumentSummary> = documents.into_values().collect();
    summaries.sort_by(|a, b| {
        a.document_name
            .cmp(&b.document_name)
            .then_with(|| a.document_id.cmp(&b.document_id))
    });
    summaries
}

/// Vector database capability. Records are keyed by `IndexedRecord::id`, so
/// `upsert` overwrites records with the same id.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn create_collection(&self, name: &str) -> Result<(), StoreError>;

    async fn list_collections(&self) -> Result<Vec<String>, StoreError>;

    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.list_collections().await?.iter().any(|c| c == name))
    }

    async fn delete_collection(&self, name: &str) -> Result<(), StoreError>;

    /// Remove every record but keep the collection.
    async fn clear_collection(&self, name: &str) -> Result<(), StoreError>;

    async fn upsert(&self, collection: &str, records: &[IndexedRecord]) -> Result<(), StoreError>;

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredRecord>, StoreError>;

    async fn get_stats(&self, collection: &str) -> Result<CollectionStats, StoreError>;

    async fn list_documents(&self, collection: &str) -> Result<Vec<DocumentSummary>, StoreError>;

    async fn document_exists(&self, collection: &str, document_id: &str) -> Result<bool, StoreError>;

    /// Every chunk of one document in `chunk_index` order; empty when the
    /// document is not indexed.
    async fn get_document(&self, collection: &str, document_id: &str) -> Result<Vec<StoredRecord>, StoreError>;

    /// Delete all records of one document. Returns how many were removed.
    async fn delete_document(&self, collection: &str, document_id: &str) -> Result<usize, StoreError>;

    /// Delete records of `document_id` whose `chunk_index >= keep`, left over
    /// from a longer earlier version of the document.
    async fn prune_document(&self, collection: &str, document_id: &str, keep: usize) -> Result<usize, StoreError>;
}
