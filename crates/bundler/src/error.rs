use ransomeye_types::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BundleError {
    #[error("incident {0} not found")]
    IncidentNotFound(String),

    #[error("integrity error: {0}")]
    Integrity(#[from] ransomeye_integrity::IntegrityError),

    #[error("graph error: {0}")]
    Graph(#[from] ransomeye_graph::GraphError),

    #[error("alert engine error: {0}")]
    AlertEngine(#[from] ransomeye_alertengine::AlertEngineError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] libsql::Error),

    #[error("malformed bundle record: {0}")]
    MalformedRecord(String),
}

impl BundleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BundleError::IncidentNotFound(_) => ErrorKind::Validation,
            BundleError::Integrity(e) => e.kind(),
            BundleError::Graph(e) => e.kind(),
            BundleError::AlertEngine(e) => e.kind(),
            BundleError::Io(_) => ErrorKind::Unavailable,
            BundleError::Json(_) => ErrorKind::Validation,
            BundleError::Storage(_) => ErrorKind::Unavailable,
            BundleError::MalformedRecord(_) => ErrorKind::Fatal,
        }
    }
}
