use ransomeye_types::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpdaterError {
    #[error("manifest signature verification failed")]
    Signature,

    #[error("update merkle root mismatch")]
    Integrity(#[from] ransomeye_integrity::IntegrityError),

    #[error("payload entry {path} size or hash mismatch against the manifest")]
    EntryMismatch { path: String },

    #[error("manifest references payload entry {0} missing from the bundle")]
    MissingEntry(String),

    #[error("service controller failed: {0}")]
    Service(String),

    #[error("self-test did not pass within the configured timeout, rolled back")]
    SelfTestFailed,

    #[error("rollback itself failed, the agent must exit non-zero so the service manager escalates: {0}")]
    RollbackFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl UpdaterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UpdaterError::Signature => ErrorKind::Signature,
            UpdaterError::Integrity(e) => e.kind(),
            UpdaterError::EntryMismatch { .. } => ErrorKind::Integrity,
            UpdaterError::MissingEntry(_) => ErrorKind::Integrity,
            UpdaterError::Service(_) => ErrorKind::Unavailable,
            UpdaterError::SelfTestFailed => ErrorKind::Unavailable,
            UpdaterError::RollbackFailed(_) => ErrorKind::Fatal,
            UpdaterError::Io(_) => ErrorKind::Unavailable,
            UpdaterError::Json(_) => ErrorKind::Validation,
        }
    }
}
