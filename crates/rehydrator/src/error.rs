use ransomeye_types::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RehydrateError {
    #[error("archive could not be decompressed as zstd or gzip")]
    UnknownCompression,

    #[error("manifest signature verification failed")]
    Signature,

    #[error("merkle root mismatch")]
    Integrity(#[from] ransomeye_integrity::IntegrityError),

    #[error("entry {path} size or hash mismatch")]
    EntryMismatch { path: String },

    #[error("manifest references entry {0} missing from the archive")]
    MissingEntry(String),

    #[error("graph error: {0}")]
    Graph(#[from] ransomeye_graph::GraphError),

    #[error("storage error: {0}")]
    Storage(#[from] ransomeye_storage::StorageError),

    #[error("query rejected: {0}")]
    Query(#[from] libsql::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RehydrateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RehydrateError::UnknownCompression => ErrorKind::Integrity,
            RehydrateError::Signature => ErrorKind::Signature,
            RehydrateError::Integrity(e) => e.kind(),
            RehydrateError::EntryMismatch { .. } => ErrorKind::Integrity,
            RehydrateError::MissingEntry(_) => ErrorKind::Integrity,
            RehydrateError::Graph(e) => e.kind(),
            RehydrateError::Storage(_) => ErrorKind::Unavailable,
            RehydrateError::Query(_) => ErrorKind::Unavailable,
            RehydrateError::Io(_) => ErrorKind::Unavailable,
            RehydrateError::Json(_) => ErrorKind::Validation,
        }
    }
}
