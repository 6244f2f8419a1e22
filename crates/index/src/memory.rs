use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

use crate::record::IndexedRecord;
use crate::store::{
    CollectionStats, DocumentSummary, MetadataFilter, ScoredRecord, StoreError, StoredRecord, VectorStore,
    sort_by_chunk_index, summarize_documents, validate_collection_name,
};

type Collection = BTreeMap<String, IndexedRecord>;

/// Process-local vector store with exact cosine search.
#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn missing(name: &str) -> StoreError {
    StoreError::CollectionNotFound(name.to_string())
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn create_collection(&self, name: &str) -> Result<(), StoreError> {
        validate_collection_name(name)?;
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Err(StoreError::CollectionExists(name.to_string()));
        }
        collections.insert(name.to_string(), Collection::new());
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.collections.read().await.contains_key(name))
    }

    async fn delete_collection(&self, name: &str) -> Result<(), StoreError> {
        self.collections
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| missing(name))
    }

    async fn clear_collection(&self, name: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let collection = collections.get_mut(name).ok_or_else(|| missing(name))?;
        collection.clear();
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: &[IndexedRecord]) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let target = collections.get_mut(collection).ok_or_else(|| missing(collection))?;

        // Records in one collection must share a dimension
        let dimension = target.values().next().map(|r| r.vector.len());
        for record in records {
            let expected = dimension.unwrap_or(records[0].vector.len());
            if record.vector.is_empty() || record.vector.len() != expected {
                return Err(StoreError::InvalidRecord {
                    id: record.id.clone(),
                    reason: format!("vector dimension {} (expected {})", record.vector.len(), expected),
                });
            }
        }

        for record in records {
            target.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredRecord>, StoreError> {
        let collections = self.collections.read().await;
        let target = collections.get(collection).ok_or_else(|| missing(collection))?;

        let mut hits: Vec<ScoredRecord> = target
            .values()
            .filter(|r| filter.is_none_or(|f| f.matches(&r.metadata)))
            .map(|r| ScoredRecord {
                id: r.id.clone(),
                text: r.text.clone(),
                score: cosine_similarity(vector, &r.vector),
                metadata: r.metadata.clone(),
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(k);
        Ok(hits)
    }

    async fn get_stats(&self, collection: &str) -> Result<CollectionStats, StoreError> {
        let collections = self.collections.read().await;
        let target = collections.get(collection).ok_or_else(|| missing(collection))?;

        let documents: HashSet<&str> = target.values().map(|r| r.document_id.as_str()).collect();
        Ok(CollectionStats {
            item_count: target.len(),
            document_count: documents.len(),
        })
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<DocumentSummary>, StoreError> {
        let collections = self.collections.read().await;
        let target = collections.get(collection).ok_or_else(|| missing(collection))?;
        Ok(summarize_documents(target.values().map(|r| &r.metadata)))
    }

    async fn document_exists(&self, collection: &str, document_id: &str) -> Result<bool, StoreError> {
        let collections = self.collections.read().await;
        let target = collections.get(collection).ok_or_else(|| missing(collection))?;
        Ok(target.values().any(|r| r.document_id == document_id))
    }

    async fn get_document(&self, collection: &str, document_id: &str) -> Result<Vec<StoredRecord>, StoreError> {
        let collections = self.collections.read().await;
        let target = collections.get(collection).ok_or_else(|| missing(collection))?;

        let mut records: Vec<StoredRecord> = target
            .values()
            .filter(|r| r.document_id == document_id)
            .map(|r| StoredRecord {
                id: r.id.clone(),
                text: r.text.clone(),
                metadata: r.metadata.clone(),
            })
            .collect();
        sort_by_chunk_index(&mut records);
        Ok(records)
    }

    async fn delete_document(&self, collection: &str, document_id: &str) -> Result<usize, StoreError> {
        let mut collections = self.collections.write().await;
        let target = collections.get_mut(collection).ok_or_else(|| missing(collection))?;

        let before = target.len();
        target.retain(|_, r| r.document_id != document_id);
        Ok(before - target.len())
    }

    async fn prune_document(&self, collection: &str, document_id: &str, keep: usize) -> Result<usize, StoreError> {
        let mut collections = self.collections.write().await;
        let target = collections.get_mut(collection).ok_or_else(|| missing(collection))?;

        let before = target.len();
        target.retain(|_, r| r.document_id != document_id || r.chunk_index().is_some_and(|i| i < keep));
        Ok(before - target.len())
    }
}
