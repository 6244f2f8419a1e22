use axum::{
    Json, Router,
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
};
use pipeline::IngestSummary;
use query::ResumeDetail;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::dto::*;
use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_K: usize = 4;
const DEFAULT_TOP_N: usize = 5;

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/collections", get(list_collections).post(create_collection))
        .route("/collections/:name", delete(delete_collection))
        .route("/collections/:name/clear", post(clear_collection))
        .route("/collections/:name/stats", get(collection_stats))
        .route("/collections/:name/documents", get(list_documents))
        .route(
            "/collections/:name/documents/:document_id",
            get(get_document).delete(delete_document),
        )
        .route("/ingest", post(ingest))
        .route("/query", post(query))
        .layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn track_requests(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let status = response.status();
    state
        .metrics
        .record_request(!status.is_client_error() && !status.is_server_error());
    response
}

/// GET /health - Liveness plus a vector store round trip
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (status, store) = match state.store.list_collections().await {
        Ok(_) => ("ok", "ok".to_string()),
        Err(e) => ("degraded", format!("error: {}", e)),
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        store,
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> Json<crate::metrics::MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

async fn list_collections(State(state): State<Arc<AppState>>) -> Result<Json<CollectionsResponse>, ApiError> {
    let collections = state.store.list_collections().await?;
    let count = collections.len();
    Ok(Json(CollectionsResponse { collections, count }))
}

async fn create_collection(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCollectionRequest>,
) -> Result<(StatusCode, Json<CollectionResponse>), ApiError> {
    state.store.create_collection(&req.name).await?;
    tracing::info!(collection = %req.name, "Collection created");

    Ok((
        StatusCode::CREATED,
        Json(CollectionResponse {
            collection: req.name,
            status: "created",
        }),
    ))
}

async fn delete_collection(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<CollectionResponse>, ApiError> {
    state.store.delete_collection(&name).await?;
    tracing::info!(collection = %name, "Collection deleted");

    Ok(Json(CollectionResponse {
        collection: name,
        status: "deleted",
    }))
}

async fn clear_collection(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<CollectionResponse>, ApiError> {
    state.store.clear_collection(&name).await?;
    tracing::info!(collection = %name, "Collection cleared");

    Ok(Json(CollectionResponse {
        collection: name,
        status: "cleared",
    }))
}

async fn collection_stats(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<StatsResponse>, ApiError> {
    let stats = state.store.get_stats(&name).await?;
    Ok(Json(StatsResponse { collection: name, stats }))
}

async fn list_documents(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<DocumentsResponse>, ApiError> {
    let documents = state.store.list_documents(&name).await?;
    let count = documents.len();
    Ok(Json(DocumentsResponse {
        collection: name,
        documents,
        count,
    }))
}

/// GET /collections/:name/documents/:document_id - All chunks of one resume
async fn get_document(
    State(state): State<Arc<AppState>>,
    Path((name, document_id)): Path<(String, String)>,
) -> Result<Json<ResumeDetail>, ApiError> {
    state
        .query
        .get_resume(&name, &document_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Document not found: {}", document_id)))
}

async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path((name, document_id)): Path<(String, String)>,
) -> Result<Json<DeleteDocumentResponse>, ApiError> {
    let records_removed = state.store.delete_document(&name, &document_id).await?;
    if records_removed == 0 {
        return Err(ApiError::NotFound(format!("Document not found: {}", document_id)));
    }

    Ok(Json(DeleteDocumentResponse {
        document_id,
        records_removed,
    }))
}

/// POST /ingest - Ingest a file or directory readable by the server
async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let collection = state.collection(&req.collection).to_string();
    index::validate_collection_name(&collection)?;

    let path = PathBuf::from(&req.path);
    if !path.exists() {
        return Err(ApiError::NotFound(format!("Path not found: {}", req.path)));
    }

    let started = Instant::now();
    let results = if path.is_dir() {
        state.pipeline.process_directory(&path, &collection).await?
    } else {
        vec![state.pipeline.process_file(&path, &collection).await]
    };

    let summary = IngestSummary::from_results(&results);
    state.metrics.record_ingest(
        started.elapsed(),
        summary.succeeded + summary.partial,
        summary.failed,
        summary.chunks_written,
    );

    Ok(Json(IngestResponse {
        collection,
        summary,
        results,
    }))
}

/// POST /query - Similarity search, candidate ranking or RAG answer
async fn query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let collection = state.collection(&req.collection);
    let k = req.k.unwrap_or(DEFAULT_K).max(1);
    let filter = req.filter.as_ref().filter(|f| !f.is_empty());
    let started = Instant::now();

    let response = match req.mode {
        QueryMode::Search => {
            let sources = state.query.search(collection, &req.query, k, filter).await?;
            QueryResponse::Search {
                sources,
                query_time_ms: started.elapsed().as_millis() as u64,
            }
        }
        QueryMode::Candidates => {
            let top_n = req.top_n.unwrap_or(DEFAULT_TOP_N).max(1);
            let candidates = state
                .query
                .rank_candidates(collection, &req.query, top_n, filter)
                .await?;
            QueryResponse::Candidates {
                candidates,
                query_time_ms: started.elapsed().as_millis() as u64,
            }
        }
        QueryMode::Rag => {
            let answer = state.query.answer(collection, &req.query, k, filter).await?;
            QueryResponse::Rag {
                answer: answer.answer,
                sources: answer.sources,
                query_time_ms: answer.query_time_ms,
            }
        }
    };

    state.metrics.record_query(started.elapsed());
    Ok(Json(response))
}
