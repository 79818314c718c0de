use std::sync::Arc;

use chrono::Utc;
use libsql::{params, Connection};
use rand::Rng;
use ransomeye_types::job::{backoff_millis, Job, JobKind, JobOutcome, JobStatus};
use ransomeye_types::JobId;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::error::QueueError;
use crate::queries as sql;

/// Terminal-replay TTL for idempotent re-enqueue: a terminal job matched
/// by idempotency key is still returned as-is for 24 hours after it last
/// changed. Past that window the key is freed and a fresh job is created.
const IDEMPOTENCY_REPLAY_TTL_MS: i64 = 24 * 60 * 60 * 1000;
const BACKOFF_BASE_MS: u64 = 1_000;
const BACKOFF_CAP_MS: u64 = 5 * 60 * 1_000;

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn kind_to_str(kind: &JobKind) -> &'static str {
    match kind {
        JobKind::BuildBundle => "build_bundle",
        JobKind::RehydrateBundle => "rehydrate_bundle",
    }
}

fn kind_from_str(s: &str) -> Result<JobKind, QueueError> {
    match s {
        "build_bundle" => Ok(JobKind::BuildBundle),
        "rehydrate_bundle" => Ok(JobKind::RehydrateBundle),
        other => Err(QueueError::NotFound(format!("unknown job kind {other}"))),
    }
}

fn status_to_str(status: &JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "pending",
        JobStatus::Leased => "leased",
        JobStatus::Succeeded => "succeeded",
        JobStatus::Failed => "failed",
        JobStatus::Dead => "dead",
    }
}

fn status_from_str(s: &str) -> JobStatus {
    match s {
        "leased" => JobStatus::Leased,
        "succeeded" => JobStatus::Succeeded,
        "failed" => JobStatus::Failed,
        "dead" => JobStatus::Dead,
        _ => JobStatus::Pending,
    }
}

/// Durable job queue. Lease acquisition is serialized through an
/// in-process mutex: the embedded libsql driver this workspace targets has
/// no `SELECT ... FOR UPDATE SKIP LOCKED`, so mutual exclusion across the
/// "find visible job, then claim it" pair of statements is achieved by
/// never letting two lease attempts run concurrently against the same
/// connection, rather than by a database-side lock.
pub struct JobRepository {
    connection: Connection,
    lease_guard: Arc<Mutex<()>>,
}

impl JobRepository {
    pub fn new(connection: Connection) -> Self {
        JobRepository {
            connection,
            lease_guard: Arc::new(Mutex::new(())),
        }
    }

    /// `enqueue(kind, payload, idempotency_key?) -> job_id`.
    #[instrument(skip(self, payload))]
    pub async fn enqueue(&self, kind: JobKind, payload: Vec<u8>, idempotency_key: Option<String>, max_attempts: u32) -> Result<JobId, QueueError> {
        if let Some(key) = &idempotency_key {
            let mut rows = self.connection.query(sql::FIND_BY_IDEMPOTENCY_KEY, params![key.clone()]).await?;
            if let Some(row) = rows.next().await? {
                let existing_id: String = row.get(0)?;
                let status: String = row.get(1)?;
                let updated_at: i64 = row.get(2)?;
                let job_id: JobId = existing_id.parse().map_err(|_| QueueError::NotFound(existing_id.clone()))?;
                let is_terminal = matches!(status_from_str(&status), JobStatus::Succeeded | JobStatus::Dead);
                if !is_terminal {
                    info!(%job_id, "idempotent enqueue matched a non-terminal job");
                    return Ok(job_id);
                }
                let now = now_ms();
                if now - updated_at < IDEMPOTENCY_REPLAY_TTL_MS {
                    info!(%job_id, "idempotent enqueue matched a terminal job within the replay TTL, replaying");
                    return Ok(job_id);
                }
                // Past the TTL the key is stale: free it from the old row so
                // the unique index doesn't reject the new job below.
                self.connection.execute(sql::CLEAR_IDEMPOTENCY_KEY, params![existing_id.clone()]).await?;
                info!(%job_id, "idempotent enqueue's prior terminal job is past the replay TTL, creating a new job");
            }
        }

        let job_id = JobId::new();
        let now = now_ms();
        self.connection
            .execute(
                sql::INSERT_JOB,
                params![
                    job_id.to_string(),
                    kind_to_str(&kind),
                    payload,
                    idempotency_key,
                    max_attempts as i64,
                    now
                ],
            )
            .await?;
        info!(%job_id, kind = kind_to_str(&kind), "job enqueued");
        Ok(job_id)
    }

    /// `lease(kinds, worker, lease_ttl) -> job | none`.
    #[instrument(skip(self, kinds))]
    pub async fn lease(&self, kinds: &[JobKind], worker: &str, lease_ttl_ms: i64) -> Result<Option<Job>, QueueError> {
        let _guard = self.lease_guard.lock().await;
        let now = now_ms();

        for kind in kinds {
            let mut rows = self
                .connection
                .query(sql::FIND_VISIBLE_JOB_BY_KIND, params![kind_to_str(kind), now])
                .await?;
            let Some(row) = rows.next().await? else { continue };
            let job_id: String = row.get(0)?;

            let lease_expires_at = now + lease_ttl_ms;
            self.connection
                .execute(sql::CLAIM_JOB, params![worker, lease_expires_at, now, job_id.clone()])
                .await?;

            let job = self.fetch(&job_id).await?;
            info!(job_id = %job_id, worker, "job leased");
            return Ok(job);
        }

        Ok(None)
    }

    /// `heartbeat(job_id, worker) -> ok | lost`.
    pub async fn heartbeat(&self, job_id: JobId, worker: &str, lease_ttl_ms: i64) -> Result<(), QueueError> {
        let now = now_ms();
        let lease_expires_at = now + lease_ttl_ms;
        let affected = self
            .connection
            .execute(sql::EXTEND_LEASE, params![lease_expires_at, now, job_id.to_string(), worker])
            .await?;
        if affected == 0 {
            warn!(%job_id, worker, "heartbeat rejected: lease lost or job gone");
            return Err(QueueError::LeaseLost(job_id.to_string(), worker.to_string()));
        }
        Ok(())
    }

    /// `complete(job_id, worker, outcome)`.
    pub async fn complete(&self, job_id: JobId, worker: &str, outcome: JobOutcome) -> Result<(), QueueError> {
        let now = now_ms();
        match outcome {
            JobOutcome::Success => {
                let affected = self
                    .connection
                    .execute(sql::MARK_SUCCEEDED, params![now, job_id.to_string(), worker])
                    .await?;
                if affected == 0 {
                    return Err(QueueError::LeaseLost(job_id.to_string(), worker.to_string()));
                }
                info!(%job_id, "job succeeded");
            }
            JobOutcome::Retry { error } => {
                let job = self.fetch(&job_id.to_string()).await?.ok_or_else(|| QueueError::NotFound(job_id.to_string()))?;
                if job.attempts >= job.max_attempts {
                    self.connection
                        .execute(sql::MARK_DEAD, params![error.clone(), now, job_id.to_string(), worker])
                        .await?;
                    warn!(%job_id, attempts = job.attempts, "job exhausted retries, marked dead");
                } else {
                    let delay = backoff_millis(job.attempts, BACKOFF_BASE_MS, BACKOFF_CAP_MS, |bound| {
                        if bound == 0 {
                            0
                        } else {
                            rand::thread_rng().gen_range(0..=bound)
                        }
                    });
                    let next_visible_at = now + delay as i64;
                    self.connection
                        .execute(sql::SCHEDULE_RETRY, params![next_visible_at, error, now, job_id.to_string(), worker])
                        .await?;
                    info!(%job_id, delay_ms = delay, "job scheduled for retry");
                }
            }
        }
        Ok(())
    }

    /// `cancel(job_id)`, allowed from `pending` only.
    pub async fn cancel(&self, job_id: JobId) -> Result<(), QueueError> {
        let affected = self.connection.execute(sql::CANCEL_PENDING, params![job_id.to_string()]).await?;
        if affected == 0 {
            return Err(QueueError::NotCancellable(job_id.to_string()));
        }
        Ok(())
    }

    pub async fn get(&self, job_id: JobId) -> Result<Option<Job>, QueueError> {
        self.fetch(&job_id.to_string()).await
    }

    async fn fetch(&self, job_id: &str) -> Result<Option<Job>, QueueError> {
        let mut rows = self.connection.query(sql::SELECT_JOB, params![job_id]).await?;
        let Some(row) = rows.next().await? else { return Ok(None) };

        let job_id_str: String = row.get(0)?;
        let kind_str: String = row.get(1)?;
        let payload: Vec<u8> = row.get(2)?;
        let idempotency_key: Option<String> = row.get(3)?;
        let status_str: String = row.get(4)?;
        let lease_owner: Option<String> = row.get(5)?;
        let lease_expires_at: Option<i64> = row.get(6)?;
        let attempts: i64 = row.get(7)?;
        let max_attempts: i64 = row.get(8)?;
        let next_visible_at: i64 = row.get(9)?;
        let last_error: Option<String> = row.get(10)?;
        let created_at: i64 = row.get(11)?;
        let updated_at: i64 = row.get(12)?;

        Ok(Some(Job {
            job_id: job_id_str.parse().map_err(|_| QueueError::NotFound(job_id.to_string()))?,
            kind: kind_from_str(&kind_str)?,
            payload,
            idempotency_key,
            status: status_from_str(&status_str),
            lease_owner,
            lease_expires_at,
            attempts: attempts as u32,
            max_attempts: max_attempts as u32,
            next_visible_at,
            last_error,
            created_at,
            updated_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ransomeye_storage::Db;

    async fn test_repo() -> JobRepository {
        let db = Db::connect(":memory:", None).await.unwrap();
        JobRepository::new(db.connection().unwrap())
    }

    #[tokio::test]
    async fn enqueue_and_lease_round_trip() {
        let repo = test_repo().await;
        let job_id = repo.enqueue(JobKind::BuildBundle, b"payload".to_vec(), None, 8).await.unwrap();

        let leased = repo.lease(&[JobKind::BuildBundle], "worker-a", 60_000).await.unwrap().unwrap();
        assert_eq!(leased.job_id, job_id);
        assert_eq!(leased.attempts, 1);

        // A second worker sees nothing visible while the lease is live.
        assert!(repo.lease(&[JobKind::BuildBundle], "worker-b", 60_000).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn idempotent_enqueue_returns_existing_job_id() {
        let repo = test_repo().await;
        let first = repo
            .enqueue(JobKind::BuildBundle, b"p".to_vec(), Some("key-1".to_string()), 8)
            .await
            .unwrap();
        let second = repo
            .enqueue(JobKind::BuildBundle, b"p".to_vec(), Some("key-1".to_string()), 8)
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn terminal_job_past_replay_ttl_gets_a_fresh_job_id() {
        let repo = test_repo().await;
        let first = repo
            .enqueue(JobKind::BuildBundle, b"p".to_vec(), Some("key-1".to_string()), 8)
            .await
            .unwrap();
        let job = repo.lease(&[JobKind::BuildBundle], "worker-a", 60_000).await.unwrap().unwrap();
        repo.complete(job.job_id, "worker-a", JobOutcome::Success).await.unwrap();

        // Backdate updated_at past the replay TTL to simulate an old terminal job.
        let stale = now_ms() - IDEMPOTENCY_REPLAY_TTL_MS - 1;
        repo.connection
            .execute("UPDATE jobs SET updated_at = ?1 WHERE job_id = ?2", params![stale, first.to_string()])
            .await
            .unwrap();

        let second = repo
            .enqueue(JobKind::BuildBundle, b"p".to_vec(), Some("key-1".to_string()), 8)
            .await
            .unwrap();
        assert_ne!(first, second);

        let old = repo.get(first).await.unwrap().unwrap();
        assert_eq!(old.idempotency_key, None);
    }

    #[tokio::test]
    async fn heartbeat_fails_once_lease_is_lost_to_another_worker() {
        let repo = test_repo().await;
        repo.enqueue(JobKind::BuildBundle, b"p".to_vec(), None, 8).await.unwrap();
        let job = repo.lease(&[JobKind::BuildBundle], "worker-a", 1).await.unwrap().unwrap();

        // Force visibility again by leasing with an already-expired TTL,
        // simulating a crashed worker whose lease has lapsed.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let reclaimed = repo.lease(&[JobKind::BuildBundle], "worker-b", 60_000).await.unwrap().unwrap();
        assert_eq!(reclaimed.job_id, job.job_id);
        assert_eq!(reclaimed.attempts, 2);

        assert!(repo.heartbeat(job.job_id, "worker-a", 60_000).await.is_err());
    }

    #[tokio::test]
    async fn complete_success_is_terminal() {
        let repo = test_repo().await;
        repo.enqueue(JobKind::BuildBundle, b"p".to_vec(), None, 8).await.unwrap();
        let job = repo.lease(&[JobKind::BuildBundle], "worker-a", 60_000).await.unwrap().unwrap();
        repo.complete(job.job_id, "worker-a", JobOutcome::Success).await.unwrap();

        let fetched = repo.get(job.job_id).await.unwrap().unwrap();
        assert_eq!(fetched.status, JobStatus::Succeeded);
    }

    #[tokio::test]
    async fn retries_exhaust_into_dead() {
        let repo = test_repo().await;
        repo.enqueue(JobKind::BuildBundle, b"p".to_vec(), None, 1).await.unwrap();
        let job = repo.lease(&[JobKind::BuildBundle], "worker-a", 60_000).await.unwrap().unwrap();
        repo.complete(job.job_id, "worker-a", JobOutcome::Retry { error: "boom".to_string() }).await.unwrap();

        let fetched = repo.get(job.job_id).await.unwrap().unwrap();
        assert_eq!(fetched.status, JobStatus::Dead);
    }

    #[tokio::test]
    async fn cancel_only_allowed_from_pending() {
        let repo = test_repo().await;
        let job_id = repo.enqueue(JobKind::BuildBundle, b"p".to_vec(), None, 8).await.unwrap();
        repo.cancel(job_id).await.unwrap();
        assert!(repo.get(job_id).await.unwrap().is_none());

        let job_id = repo.enqueue(JobKind::BuildBundle, b"p".to_vec(), None, 8).await.unwrap();
        repo.lease(&[JobKind::BuildBundle], "worker-a", 60_000).await.unwrap();
        assert!(repo.cancel(job_id).await.is_err());
    }
}
