//! SQL text for the job repository, kept apart from the Rust logic so the
//! shape of each statement is easy to audit independently.

pub const INSERT_JOB: &str = r#"
    INSERT INTO jobs (
        job_id, kind, payload, idempotency_key, status,
        attempts, max_attempts, next_visible_at, created_at, updated_at
    ) VALUES (?1, ?2, ?3, ?4, 'pending', 0, ?5, ?6, ?6, ?6)
"#;

pub const FIND_BY_IDEMPOTENCY_KEY: &str = r#"
    SELECT job_id, status, updated_at FROM jobs WHERE idempotency_key = ?1
"#;

pub const CLEAR_IDEMPOTENCY_KEY: &str = r#"
    UPDATE jobs SET idempotency_key = NULL WHERE job_id = ?1
"#;

pub const FIND_VISIBLE_JOB_BY_KIND: &str = r#"
    SELECT job_id FROM jobs
    WHERE kind = ?1
      AND status IN ('pending', 'leased')
      AND next_visible_at <= ?2
      AND (lease_expires_at IS NULL OR lease_expires_at <= ?2)
    ORDER BY created_at ASC
    LIMIT 1
"#;

pub const CLAIM_JOB: &str = r#"
    UPDATE jobs
    SET status = 'leased', lease_owner = ?1, lease_expires_at = ?2,
        attempts = attempts + 1, updated_at = ?3
    WHERE job_id = ?4
"#;

pub const SELECT_JOB: &str = r#"
    SELECT job_id, kind, payload, idempotency_key, status, lease_owner,
           lease_expires_at, attempts, max_attempts, next_visible_at,
           last_error, created_at, updated_at
    FROM jobs WHERE job_id = ?1
"#;

pub const EXTEND_LEASE: &str = r#"
    UPDATE jobs SET lease_expires_at = ?1, updated_at = ?2
    WHERE job_id = ?3 AND lease_owner = ?4 AND status = 'leased'
"#;

pub const MARK_SUCCEEDED: &str = r#"
    UPDATE jobs SET status = 'succeeded', lease_owner = NULL,
        lease_expires_at = NULL, updated_at = ?1
    WHERE job_id = ?2 AND lease_owner = ?3
"#;

pub const SCHEDULE_RETRY: &str = r#"
    UPDATE jobs SET status = 'pending', lease_owner = NULL, lease_expires_at = NULL,
        next_visible_at = ?1, last_error = ?2, updated_at = ?3
    WHERE job_id = ?4 AND lease_owner = ?5
"#;

pub const MARK_DEAD: &str = r#"
    UPDATE jobs SET status = 'dead', lease_owner = NULL, lease_expires_at = NULL,
        last_error = ?1, updated_at = ?2
    WHERE job_id = ?3 AND lease_owner = ?4
"#;

pub const CANCEL_PENDING: &str = r#"
    DELETE FROM jobs WHERE job_id = ?1 AND status = 'pending'
"#;
