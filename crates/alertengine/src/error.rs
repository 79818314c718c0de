use ransomeye_types::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlertEngineError {
    #[error("event dropped: no extractable entities")]
    NoEntities,

    #[error("duplicate fingerprint for existing event {0}")]
    DuplicateFingerprint(String),

    #[error("no policy matched")]
    NoPolicyMatch,

    #[error("invalid status transition from {from:?} to {to:?}")]
    InvalidTransition { from: String, to: String },

    #[error(transparent)]
    Policy(#[from] crate::policy::PolicyError),

    #[error("storage error: {0}")]
    Storage(#[from] ransomeye_storage::StorageError),

    #[error("query rejected: {0}")]
    Query(#[from] libsql::Error),
}

impl AlertEngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AlertEngineError::NoEntities | AlertEngineError::NoPolicyMatch | AlertEngineError::InvalidTransition { .. } => ErrorKind::Validation,
            AlertEngineError::DuplicateFingerprint(_) => ErrorKind::Conflict,
            AlertEngineError::Policy(_) => ErrorKind::Validation,
            AlertEngineError::Storage(_) | AlertEngineError::Query(_) => ErrorKind::Unavailable,
        }
    }
}
