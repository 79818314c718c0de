use serde::{Deserialize, Serialize};

/// Error taxonomy shared across crates — kinds, not concrete type names.
/// Every crate's `thiserror` enum implements a `kind(&self) -> ErrorKind`
/// method so the HTTP layer and the job queue can react uniformly
/// regardless of which component raised the error.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Signature verification failed. Fail-closed, surfaced to the
    /// operator, never retried automatically.
    Signature,
    /// Hash mismatch, merkle mismatch, size mismatch. Fail-closed.
    Integrity,
    /// Malformed input or schema violation. Returned as 4xx, not retried.
    Validation,
    /// Duplicate fingerprint or idempotent replay. Returned as 409 with
    /// the pre-existing id.
    Conflict,
    /// Transient storage or network failure. Retried with backoff up to
    /// `max_attempts`, then the job is marked dead.
    Unavailable,
    /// Deadline exceeded or shutdown requested; caller decides whether to
    /// retry.
    Cancelled,
    /// An invariant was violated (e.g. rollback failure). The process
    /// exits non-zero so the supervisor restarts it after investigation.
    Fatal,
}

impl ErrorKind {
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::Signature => 403,
            ErrorKind::Integrity => 422,
            ErrorKind::Validation => 400,
            ErrorKind::Conflict => 409,
            ErrorKind::Unavailable => 503,
            ErrorKind::Cancelled => 499,
            ErrorKind::Fatal => 500,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Signature => "ERR_SIGNATURE",
            ErrorKind::Integrity => "ERR_INTEGRITY",
            ErrorKind::Validation => "ERR_VALIDATION",
            ErrorKind::Conflict => "ERR_CONFLICT",
            ErrorKind::Unavailable => "ERR_UNAVAILABLE",
            ErrorKind::Cancelled => "ERR_CANCELLED",
            ErrorKind::Fatal => "ERR_FATAL",
        }
    }

    /// Whether the job queue should schedule a retry for an error of this
    /// kind.
    pub fn is_retriable(self) -> bool {
        matches!(self, ErrorKind::Unavailable)
    }
}

/// `application/problem+json` body shape used by every HTTP surface.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub code: String,
}

impl ProblemDetails {
    pub fn new(kind: ErrorKind, title: impl Into<String>, detail: impl Into<String>) -> Self {
        ProblemDetails {
            problem_type: format!("https://ransomeye.internal/errors/{}", kind.code().to_lowercase()),
            title: title.into(),
            status: kind.http_status(),
            detail: detail.into(),
            code: kind.code().to_string(),
        }
    }
}
