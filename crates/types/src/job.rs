use serde::{Deserialize, Serialize};

use crate::ids::JobId;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Leased,
    Succeeded,
    Failed,
    Dead,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    BuildBundle,
    RehydrateBundle,
}

/// Unit of work in the durable queue (C2).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    pub kind: JobKind,
    pub payload: Vec<u8>,
    pub idempotency_key: Option<String>,
    pub status: JobStatus,
    pub lease_owner: Option<String>,
    pub lease_expires_at: Option<i64>,
    pub attempts: u32,
    pub max_attempts: u32,
    pub next_visible_at: i64,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Job {
    pub fn is_visible(&self, now_ms: i64) -> bool {
        matches!(self.status, JobStatus::Pending | JobStatus::Leased)
            && now_ms >= self.next_visible_at
            && self
                .lease_expires_at
                .map(|exp| now_ms >= exp)
                .unwrap_or(true)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, JobStatus::Succeeded | JobStatus::Dead)
    }
}

/// Outcome a worker reports back through `complete()`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum JobOutcome {
    Success,
    Retry { error: String },
}

/// Full jitter exponential backoff: `rand(0, min(cap, base * 2^n))`.
pub fn backoff_millis(attempts: u32, base_ms: u64, cap_ms: u64, jitter: impl Fn(u64) -> u64) -> u64 {
    let factor = 2u64.saturating_pow(attempts.min(63));
    let exp = base_ms.saturating_mul(factor);
    let bound = exp.min(cap_ms);
    jitter(bound)
}
