use ransomeye_types::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("incident {0} not found")]
    NotFound(String),

    #[error("incident {0} is frozen (merged into another incident)")]
    Frozen(String),

    #[error("storage error: {0}")]
    Storage(#[from] ransomeye_storage::StorageError),

    #[error("query rejected: {0}")]
    Query(#[from] libsql::Error),
}

impl GraphError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GraphError::NotFound(_) | GraphError::Frozen(_) => ErrorKind::Validation,
            GraphError::Storage(_) | GraphError::Query(_) => ErrorKind::Unavailable,
        }
    }
}
