use ransomeye_types::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("integrity error: {0}")]
    Integrity(#[from] ransomeye_integrity::IntegrityError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("receipt signature verification failed")]
    ReceiptSignature,

    #[error("receipt body_sha256 {receipt} does not match sent fingerprint {sent}")]
    FingerprintMismatch { sent: String, receipt: String },

    #[error("server rejected the event with HTTP {0}, quarantined")]
    Quarantined(u16),

    #[error("event {0} not found in the buffer")]
    NotBuffered(String),
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::Io(_) => ErrorKind::Unavailable,
            TransportError::Json(_) => ErrorKind::Validation,
            TransportError::Integrity(e) => e.kind(),
            TransportError::Http(_) => ErrorKind::Unavailable,
            TransportError::ReceiptSignature => ErrorKind::Signature,
            TransportError::FingerprintMismatch { .. } => ErrorKind::Integrity,
            TransportError::Quarantined(_) => ErrorKind::Validation,
            TransportError::NotBuffered(_) => ErrorKind::Validation,
        }
    }
}
