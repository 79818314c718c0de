use libsql::Connection;

use crate::error::StorageError;

/// Idempotent schema for every table the DRC's repositories touch. Safe to
/// run on every process start: every statement is `CREATE TABLE IF NOT
/// EXISTS` / `CREATE INDEX IF NOT EXISTS`.
const SCHEMA_STATEMENTS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS jobs (
        job_id TEXT PRIMARY KEY,
        kind TEXT NOT NULL,
        payload BLOB NOT NULL,
        idempotency_key TEXT,
        status TEXT NOT NULL,
        lease_owner TEXT,
        lease_expires_at INTEGER,
        attempts INTEGER NOT NULL DEFAULT 0,
        max_attempts INTEGER NOT NULL DEFAULT 8,
        next_visible_at INTEGER NOT NULL,
        last_error TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )"#,
    r#"CREATE UNIQUE INDEX IF NOT EXISTS idx_jobs_idempotency_key
        ON jobs(idempotency_key) WHERE idempotency_key IS NOT NULL"#,
    r#"CREATE INDEX IF NOT EXISTS idx_jobs_visibility ON jobs(status, next_visible_at)"#,
    r#"CREATE TABLE IF NOT EXISTS events_seen (
        agent_id TEXT NOT NULL,
        fingerprint TEXT NOT NULL,
        event_id TEXT NOT NULL,
        received_at INTEGER NOT NULL,
        PRIMARY KEY (agent_id, fingerprint)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS alerts (
        alert_id TEXT PRIMARY KEY,
        policy_id TEXT NOT NULL,
        severity TEXT NOT NULL,
        source_events TEXT NOT NULL,
        entities TEXT NOT NULL,
        status TEXT NOT NULL,
        dedup_key TEXT NOT NULL,
        hit_count INTEGER NOT NULL DEFAULT 1,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_alerts_dedup_key ON alerts(dedup_key, created_at)"#,
    r#"CREATE TABLE IF NOT EXISTS entities (
        entity_id TEXT PRIMARY KEY,
        type TEXT NOT NULL,
        value TEXT NOT NULL,
        first_seen INTEGER NOT NULL,
        last_seen INTEGER NOT NULL,
        incident_id TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS edges (
        src_id TEXT NOT NULL,
        dst_id TEXT NOT NULL,
        relation TEXT NOT NULL,
        first_seen INTEGER NOT NULL,
        last_seen INTEGER NOT NULL,
        incident_id TEXT,
        PRIMARY KEY (src_id, dst_id, relation)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS incidents (
        incident_id TEXT PRIMARY KEY,
        score REAL NOT NULL DEFAULT 0.0,
        scored_at INTEGER,
        first_seen INTEGER NOT NULL,
        last_seen INTEGER NOT NULL,
        last_mutated INTEGER NOT NULL,
        merged_into TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS incident_alerts (
        incident_id TEXT NOT NULL,
        alert_id TEXT NOT NULL,
        PRIMARY KEY (incident_id, alert_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS bundles (
        bundle_id TEXT PRIMARY KEY,
        incident_id TEXT NOT NULL,
        path TEXT NOT NULL,
        manifest_sha256 TEXT NOT NULL,
        idempotency_key TEXT,
        created_at INTEGER NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS rehydrated_bundles (
        manifest_sha256 TEXT PRIMARY KEY,
        rehydrated_at INTEGER NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS audit_log (
        id TEXT PRIMARY KEY,
        actor TEXT NOT NULL,
        action TEXT NOT NULL,
        subject_id TEXT NOT NULL,
        reason TEXT NOT NULL,
        occurred_at INTEGER NOT NULL
    )"#,
];

pub async fn apply_schema(connection: &Connection) -> Result<(), StorageError> {
    for statement in SCHEMA_STATEMENTS {
        connection.execute(statement, ()).await?;
    }
    Ok(())
}
