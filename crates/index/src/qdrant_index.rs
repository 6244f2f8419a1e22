use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

use crate::record::IndexedRecord;
use crate::store::{
    CollectionStats, DocumentSummary, MetadataFilter, ScoredRecord, StoreError, StoredRecord, VectorStore,
    sort_by_chunk_index, summarize_documents, validate_collection_name,
};

const SCROLL_PAGE: usize = 256;
const SUMMARY_FIELDS: [&str; 4] = ["document_id", "document_name", "file_format", "source_path"];

/// Qdrant over its REST API. The chunk text is kept in the payload next to
/// the metadata under `text`.
pub struct QdrantStore {
    base_url: String,
    client: reqwest::Client,
    dimension: usize,
}

#[derive(Serialize)]
struct CreateCollection {
    vectors: VectorParams,
}

#[derive(Serialize)]
struct VectorParams {
    size: usize,
    distance: &'static str,
}

#[derive(Serialize)]
struct UpsertPoints<'a> {
    points: Vec<Point<'a>>,
}

#[derive(Serialize)]
struct Point<'a> {
    id: &'a str,
    vector: &'a [f32],
    payload: Map<String, Value>,
}

#[derive(Deserialize)]
struct CollectionList {
    collections: Vec<CollectionName>,
}

#[derive(Deserialize)]
struct CollectionName {
    name: String,
}

#[derive(Deserialize)]
struct SearchHit {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Map<String, Value>,
}

#[derive(Deserialize)]
struct ScrollPage {
    points: Vec<ScrollPoint>,
    next_page_offset: Option<Value>,
}

#[derive(Deserialize)]
struct ScrollPoint {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    payload: Map<String, Value>,
}

#[derive(Deserialize)]
struct CountResult {
    count: usize,
}

/// Translate a metadata filter into a Qdrant `must` filter.
fn qdrant_filter(filter: &MetadataFilter) -> Value {
    let must: Vec<Value> = filter
        .equals
        .iter()
        .map(|(key, value)| json!({ "key": key, "match": { "value": value } }))
        .collect();
    json!({ "must": must })
}

fn document_filter(document_id: &str) -> Value {
    json!({ "must": [{ "key": "document_id", "match": { "value": document_id } }] })
}

fn point_id(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl QdrantStore {
    pub fn new(base_url: String, dimension: usize, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            dimension,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn collection_url(&self, collection: &str, path: &str) -> String {
        format!("{}/collections/{}{}", self.base_url, collection, path)
    }

    /// Send a request and unwrap Qdrant's `{"result": ...}` envelope.
    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
        collection: &str,
    ) -> Result<T, StoreError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::CollectionNotFound(collection.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Backend(format!("{}: {}", status, body)));
        }

        let envelope: Value = response.json().await?;
        serde_json::from_value(envelope.get("result").cloned().unwrap_or(Value::Null))
            .map_err(|e| StoreError::Backend(format!("unexpected response: {}", e)))
    }

    async fn count(&self, collection: &str, filter: Option<Value>) -> Result<usize, StoreError> {
        let mut body = json!({ "exact": true });
        if let Some(filter) = filter {
            body["filter"] = filter;
        }

        let request = self
            .client
            .post(self.collection_url(collection, "/points/count"))
            .json(&body);
        let result: CountResult = self.send(request, collection).await?;
        Ok(result.count)
    }

    /// Page through every point matching `filter`. `with_payload` is passed
    /// through: `true` or a list of payload keys.
    async fn scroll(
        &self,
        collection: &str,
        with_payload: Value,
        filter: Option<Value>,
    ) -> Result<Vec<ScrollPoint>, StoreError> {
        let mut points = Vec::new();
        let mut offset: Option<Value> = None;

        loop {
            let mut body = json!({
                "limit": SCROLL_PAGE,
                "with_payload": with_payload,
                "with_vector": false,
            });
            if let Some(filter) = &filter {
                body["filter"] = filter.clone();
            }
            if let Some(offset) = offset.take() {
                body["offset"] = offset;
            }

            let request = self
                .client
                .post(self.collection_url(collection, "/points/scroll"))
                .json(&body);
            let page: ScrollPage = self.send(request, collection).await?;

            points.extend(page.points);
            match page.next_page_offset {
                Some(next) if !next.is_null() => offset = Some(next),
                _ => break,
            }
        }

        Ok(points)
    }

    async fn scroll_payloads(&self, collection: &str, fields: &[&str]) -> Result<Vec<Map<String, Value>>, StoreError> {
        let points = self.scroll(collection, json!(fields), None).await?;
        Ok(points.into_iter().map(|p| p.payload).collect())
    }

    async fn delete_points(&self, collection: &str, filter: Value) -> Result<(), StoreError> {
        let request = self
            .client
            .post(self.collection_url(collection, "/points/delete?wait=true"))
            .json(&json!({ "filter": filter }));
        let _: Value = self.send(request, collection).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn create_collection(&self, name: &str) -> Result<(), StoreError> {
        validate_collection_name(name)?;
        if self.collection_exists(name).await? {
            return Err(StoreError::CollectionExists(name.to_string()));
        }

        let request = self
            .client
            .put(self.collection_url(name, ""))
            .json(&CreateCollection {
                vectors: VectorParams {
                    size: self.dimension,
                    distance: "Cosine",
                },
            });

        // Another writer may create it between the check and the PUT
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status == StatusCode::CONFLICT
                || (status == StatusCode::BAD_REQUEST && body.contains("already exists"))
            {
                return Err(StoreError::CollectionExists(name.to_string()));
            }
            return Err(StoreError::Backend(format!("{}: {}", status, body)));
        }

        info!(collection = name, dimension = self.dimension, "Created Qdrant collection");
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let request = self.client.get(format!("{}/collections", self.base_url));
        let list: CollectionList = self.send(request, "").await?;

        let mut names: Vec<String> = list.collections.into_iter().map(|c| c.name).collect();
        names.sort();
        Ok(names)
    }

    async fn delete_collection(&self, name: &str) -> Result<(), StoreError> {
        // Qdrant answers 200 for unknown collections
        if !self.collection_exists(name).await? {
            return Err(StoreError::CollectionNotFound(name.to_string()));
        }

        let request = self.client.delete(self.collection_url(name, ""));
        let _: Value = self.send(request, name).await?;
        info!(collection = name, "Deleted Qdrant collection");
        Ok(())
    }

    async fn clear_collection(&self, name: &str) -> Result<(), StoreError> {
        self.delete_points(name, json!({})).await
    }

    async fn upsert(&self, collection: &str, records: &[IndexedRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut points = Vec::with_capacity(records.len());
        for record in records {
            if record.vector.len() != self.dimension {
                return Err(StoreError::InvalidRecord {
                    id: record.id.clone(),
                    reason: format!(
                        "vector dimension {} (expected {})",
                        record.vector.len(),
                        self.dimension
                    ),
                });
            }

            let mut payload = record.metadata.clone();
            payload.insert("text".into(), json!(record.text));
            points.push(Point {
                id: &record.id,
                vector: &record.vector,
                payload,
            });
        }

        let request = self
            .client
            .put(self.collection_url(collection, "/points?wait=true"))
            .json(&UpsertPoints { points });
        let _: Value = self.send(request, collection).await?;

        debug!(collection, count = records.len(), "Upserted points");
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredRecord>, StoreError> {
        let mut body = json!({
            "vector": vector,
            "limit": k,
            "with_payload": true,
        });
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            body["filter"] = qdrant_filter(filter);
        }

        let request = self
            .client
            .post(self.collection_url(collection, "/points/search"))
            .json(&body);
        let hits: Vec<SearchHit> = self.send(request, collection).await?;

        Ok(hits
            .into_iter()
            .map(|mut hit| {
                let text = match hit.payload.remove("text") {
                    Some(Value::String(text)) => text,
                    _ => String::new(),
                };
                ScoredRecord {
                    id: point_id(&hit.id),
                    text,
                    score: hit.score,
                    metadata: hit.payload,
                }
            })
            .collect())
    }

    async fn get_stats(&self, collection: &str) -> Result<CollectionStats, StoreError> {
        let item_count = self.count(collection, None).await?;
        let payloads = self.scroll_payloads(collection, &["document_id"]).await?;
        let documents: HashSet<&str> = payloads
            .iter()
            .filter_map(|p| p.get("document_id").and_then(Value::as_str))
            .collect();

        Ok(CollectionStats {
            item_count,
            document_count: documents.len(),
        })
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<DocumentSummary>, StoreError> {
        let payloads = self.scroll_payloads(collection, &SUMMARY_FIELDS).await?;
        Ok(summarize_documents(&payloads))
    }

    async fn document_exists(&self, collection: &str, document_id: &str) -> Result<bool, StoreError> {
        Ok(self.count(collection, Some(document_filter(document_id))).await? > 0)
    }

    async fn get_document(&self, collection: &str, document_id: &str) -> Result<Vec<StoredRecord>, StoreError> {
        let points = self
            .scroll(collection, json!(true), Some(document_filter(document_id)))
            .await?;

        let mut records: Vec<StoredRecord> = points
            .into_iter()
            .map(|mut point| {
                let text = match point.payload.remove("text") {
                    Some(Value::String(text)) => text,
                    _ => String::new(),
                };
                StoredRecord {
                    id: point_id(&point.id),
                    text,
                    metadata: point.payload,
                }
            })
            .collect();
        sort_by_chunk_index(&mut records);
        Ok(records)
    }

    async fn delete_document(&self, collection: &str, document_id: &str) -> Result<usize, StoreError> {
        let removed = self.count(collection, Some(document_filter(document_id))).await?;
        if removed > 0 {
            self.delete_points(collection, document_filter(document_id)).await?;
        }
        Ok(removed)
    }

    async fn prune_document(&self, collection: &str, document_id: &str, keep: usize) -> Result<usize, StoreError> {
        let filter = json!({
            "must": [
                { "key": "document_id", "match": { "value": document_id } },
                { "key": "chunk_index", "range": { "gte": keep } }
            ]
        });

        let stale = self.count(collection, Some(filter.clone())).await?;
        if stale > 0 {
            self.delete_points(collection, filter).await?;
            debug!(collection, document_id, stale, "Pruned stale chunks");
        }
        Ok(stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn store(url: String) -> QdrantStore {
        QdrantStore::new(url, 3, Duration::from_secs(5)).unwrap()
    }

    fn record(id: &str, vector: Vec<f32>) -> IndexedRecord {
        let mut metadata = Map::new();
        metadata.insert("document_id".into(), json!("jane_0a1b2c3d"));
        metadata.insert("chunk_index".into(), json!(0));
        IndexedRecord {
            id: id.to_string(),
            document_id: "jane_0a1b2c3d".into(),
            text: "Rust engineer".into(),
            vector,
            metadata,
        }
    }

    #[tokio::test]
    async fn test_create_collection_when_missing() {
        let mut server = mockito::Server::new_async().await;
        let list = server
            .mock("GET", "/collections")
            .with_body(r#"{"result": {"collections": [{"name": "other"}]}, "status": "ok"}"#)
            .create_async()
            .await;
        let create = server
            .mock("PUT", "/collections/resumes")
            .match_body(Matcher::PartialJson(json!({"vectors": {"size": 3, "distance": "Cosine"}})))
            .with_body(r#"{"result": true, "status": "ok"}"#)
            .create_async()
            .await;

        store(server.url()).create_collection("resumes").await.unwrap();
        list.assert_async().await;
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_existing_collection_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/collections")
            .with_body(r#"{"result": {"collections": [{"name": "resumes"}]}}"#)
            .create_async()
            .await;

        let err = store(server.url()).create_collection("resumes").await.unwrap_err();
        assert!(matches!(err, StoreError::CollectionExists(_)));
    }

    #[tokio::test]
    async fn test_create_collection_lost_race_reports_exists() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/collections")
            .with_body(r#"{"result": {"collections": []}, "status": "ok"}"#)
            .create_async()
            .await;
        server
            .mock("PUT", "/collections/resumes")
            .with_status(409)
            .with_body(r#"{"status": {"error": "Wrong input: Collection `resumes` already exists!"}}"#)
            .create_async()
            .await;
        server
            .mock("PUT", "/collections/archive")
            .with_status(400)
            .with_body(r#"{"status": {"error": "Wrong input: Collection `archive` already exists!"}}"#)
            .create_async()
            .await;
        server
            .mock("PUT", "/collections/broken")
            .with_status(400)
            .with_body(r#"{"status": {"error": "Bad vector size"}}"#)
            .create_async()
            .await;

        let store = store(server.url());
        assert!(matches!(
            store.create_collection("resumes").await,
            Err(StoreError::CollectionExists(_))
        ));
        assert!(matches!(
            store.create_collection("archive").await,
            Err(StoreError::CollectionExists(_))
        ));
        assert!(matches!(
            store.create_collection("broken").await,
            Err(StoreError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn test_upsert_sends_text_in_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", Matcher::Regex(r"^/collections/resumes/points".into()))
            .match_query(Matcher::UrlEncoded("wait".into(), "true".into()))
            .match_body(Matcher::PartialJson(json!({
                "points": [{"id": "p1", "payload": {"text": "Rust engineer", "document_id": "jane_0a1b2c3d"}}]
            })))
            .with_body(r#"{"result": {"status": "completed"}}"#)
            .create_async()
            .await;

        store(server.url())
            .upsert("resumes", &[record("p1", vec![0.1, 0.2, 0.3])])
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upsert_rejects_wrong_dimension() {
        let err = store("http://127.0.0.1:1".into())
            .upsert("resumes", &[record("p1", vec![0.1])])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord { .. }));
    }

    #[tokio::test]
    async fn test_query_maps_hits_and_filter() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/collections/resumes/points/search")
            .match_body(Matcher::PartialJson(json!({
                "limit": 2,
                "filter": {"must": [{"key": "key_skills", "match": {"value": "Rust"}}]}
            })))
            .with_body(
                r#"{"result": [
                    {"id": "p1", "score": 0.92, "payload": {"text": "Rust engineer", "candidate_name": "Jane"}}
                ]}"#,
            )
            .create_async()
            .await;

        let filter = MetadataFilter::new().with("key_skills", "Rust");
        let hits = store(server.url())
            .query("resumes", &[0.1, 0.2, 0.3], 2, Some(&filter))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "Rust engineer");
        assert_eq!(hits[0].meta_str("candidate_name"), Some("Jane"));
        assert!(!hits[0].metadata.contains_key("text"));
    }

    #[tokio::test]
    async fn test_missing_collection_maps_to_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/collections/ghost/points/count")
            .with_status(404)
            .with_body(r#"{"status": {"error": "Not found"}}"#)
            .create_async()
            .await;

        let err = store(server.url()).document_exists("ghost", "x").await.unwrap_err();
        assert!(matches!(err, StoreError::CollectionNotFound(name) if name == "ghost"));
    }

    #[tokio::test]
    async fn test_stats_counts_distinct_documents() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/collections/resumes/points/count")
            .with_body(r#"{"result": {"count": 3}}"#)
            .create_async()
            .await;
        let scroll = server
            .mock("POST", "/collections/resumes/points/scroll")
            .match_body(Matcher::PartialJson(json!({"with_payload": ["document_id"], "with_vector": false})))
            .with_body(
                r#"{"result": {"points": [
                    {"id": "p1", "payload": {"document_id": "a"}},
                    {"id": "p2", "payload": {"document_id": "a"}},
                    {"id": "p3", "payload": {"document_id": "b"}}
                ], "next_page_offset": null}}"#,
            )
            .create_async()
            .await;

        let stats = store(server.url()).get_stats("resumes").await.unwrap();
        scroll.assert_async().await;
        assert_eq!(stats, CollectionStats { item_count: 3, document_count: 2 });
    }

    #[tokio::test]
    async fn test_get_document_orders_chunks() {
        let mut server = mockito::Server::new_async().await;
        let scroll = server
            .mock("POST", "/collections/resumes/points/scroll")
            .match_body(Matcher::PartialJson(json!({
                "with_payload": true,
                "filter": {"must": [{"key": "document_id", "match": {"value": "jane_0a1b2c3d"}}]}
            })))
            .with_body(
                r#"{"result": {"points": [
                    {"id": "c1", "payload": {"document_id": "jane_0a1b2c3d", "chunk_index": 1, "text": "Skills"}},
                    {"id": "c0", "payload": {"document_id": "jane_0a1b2c3d", "chunk_index": 0, "text": "Jane Doe"}}
                ], "next_page_offset": null}}"#,
            )
            .create_async()
            .await;

        let chunks = store(server.url()).get_document("resumes", "jane_0a1b2c3d").await.unwrap();
        scroll.assert_async().await;

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].id, "c0");
        assert_eq!(chunks[0].text, "Jane Doe");
        assert!(!chunks[0].metadata.contains_key("text"));
        assert_eq!(chunks[1].chunk_index(), Some(1));
    }
}
