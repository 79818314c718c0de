use ransomeye_types::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("signature verification failed")]
    Signature,

    #[error("malformed input: {0}")]
    Format(String),

    #[error("hash mismatch: expected {expected}, computed {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("merkle root mismatch: expected {expected}, computed {actual}")]
    MerkleMismatch { expected: String, actual: String },

    #[error("size mismatch for {path}: manifest says {expected}, found {actual}")]
    SizeMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },

    #[error("key error: {0}")]
    Key(String),

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IntegrityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IntegrityError::Signature => ErrorKind::Signature,
            IntegrityError::HashMismatch { .. } | IntegrityError::MerkleMismatch { .. } | IntegrityError::SizeMismatch { .. } => {
                ErrorKind::Integrity
            }
            IntegrityError::Format(_) | IntegrityError::Json(_) => ErrorKind::Validation,
            IntegrityError::Key(_) => ErrorKind::Fatal,
            IntegrityError::Io(_) => ErrorKind::Unavailable,
        }
    }
}
