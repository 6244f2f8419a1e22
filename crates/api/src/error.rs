use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use index::StoreError;
use ingest::LoadError;
use query::QueryError;
use serde::Serialize;

/// API-layer error type
#[derive(Debug)]
pub enum ApiError {
    /// 400 - Bad request (invalid input)
    BadRequest(String),

    /// 404 - Unknown collection, document or path
    NotFound(String),

    /// 409 - Collection already exists
    Conflict(String),

    /// 500 - Internal error
    Internal(String),

    /// 503 - Vector store or model provider unreachable
    Unavailable(String),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg),
        };

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), %message, "Request failed");
        }

        let body = ErrorBody {
            error: error_type.into(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();
        match err {
            StoreError::CollectionNotFound(_) => ApiError::NotFound(message),
            StoreError::CollectionExists(_) => ApiError::Conflict(message),
            StoreError::InvalidName(_) => ApiError::BadRequest(message),
            StoreError::InvalidRecord { .. } => ApiError::Internal(message),
            StoreError::Backend(_) => ApiError::Unavailable(message),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::EmptyQuery => ApiError::BadRequest("Query cannot be empty".into()),
            QueryError::Store(e) => e.into(),
            QueryError::Embedding(_) | QueryError::Generation(_) => ApiError::Unavailable(err.to_string()),
        }
    }
}

impl From<LoadError> for ApiError {
    fn from(err: LoadError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}
