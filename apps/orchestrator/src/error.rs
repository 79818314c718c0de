use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ransomeye_types::{ErrorKind, ProblemDetails};
use thiserror::Error;

/// Every handler returns this. Each variant wraps one component's error
/// type and defers entirely to its `kind()` for HTTP status and problem
/// code; the orchestrator adds no classification of its own.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    AlertEngine(#[from] ransomeye_alertengine::AlertEngineError),
    #[error(transparent)]
    Graph(#[from] ransomeye_graph::GraphError),
    #[error(transparent)]
    Queue(#[from] ransomeye_queue::QueueError),
    #[error(transparent)]
    Bundle(#[from] ransomeye_bundler::BundleError),
    #[error(transparent)]
    Rehydrate(#[from] ransomeye_rehydrator::RehydrateError),
    #[error(transparent)]
    Storage(#[from] ransomeye_storage::StorageError),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl ApiError {
    fn kind(&self) -> ErrorKind {
        match self {
            ApiError::AlertEngine(e) => e.kind(),
            ApiError::Graph(e) => e.kind(),
            ApiError::Queue(e) => e.kind(),
            ApiError::Bundle(e) => e.kind(),
            ApiError::Rehydrate(e) => e.kind(),
            ApiError::Storage(_) => ErrorKind::Unavailable,
            ApiError::Validation(_) => ErrorKind::Validation,
            ApiError::NotFound(_) => ErrorKind::Validation,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = StatusCode::from_u16(kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ProblemDetails::new(kind, status.canonical_reason().unwrap_or("error"), self.to_string());
        (status, Json(body)).into_response()
    }
}
