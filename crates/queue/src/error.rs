use ransomeye_types::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("job {0} not found")]
    NotFound(String),

    #[error("job {0} is not owned by lease holder {1}")]
    LeaseLost(String, String),

    #[error("job {0} is not in a cancellable state")]
    NotCancellable(String),

    #[error("transaction could not be committed")]
    Transaction,

    #[error("storage error: {0}")]
    Storage(#[from] ransomeye_storage::StorageError),

    #[error("query rejected: {0}")]
    Query(#[from] libsql::Error),
}

impl QueueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueueError::NotFound(_) | QueueError::NotCancellable(_) => ErrorKind::Validation,
            QueueError::LeaseLost(_, _) => ErrorKind::Conflict,
            QueueError::Transaction | QueueError::Storage(_) | QueueError::Query(_) => ErrorKind::Unavailable,
        }
    }
}
