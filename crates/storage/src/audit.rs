use libsql::{params, Connection};
use ransomeye_types::AuditRecord;

use crate::error::StorageError;

/// Append-only log of monotonicity exceptions (alert reopen, job
/// resurrection, update rollback). Owned by `storage` rather than any one
/// repository crate since every component that records an exception shares
/// the same `audit_log` table.
pub struct AuditRepository {
    connection: Connection,
}

impl AuditRepository {
    pub fn new(connection: Connection) -> Self {
        AuditRepository { connection }
    }

    pub async fn insert(&self, record: &AuditRecord) -> Result<(), StorageError> {
        self.connection
            .execute(
                "INSERT INTO audit_log (id, actor, action, subject_id, reason, occurred_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.id.to_string(),
                    record.actor.clone(),
                    record.action.clone(),
                    record.subject_id.clone(),
                    record.reason.clone(),
                    record.occurred_at,
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn list_for_subject(&self, subject_id: &str, limit: i64) -> Result<Vec<AuditRecord>, StorageError> {
        let mut rows = self
            .connection
            .query(
                "SELECT id, actor, action, subject_id, reason, occurred_at FROM audit_log WHERE subject_id = ?1 ORDER BY occurred_at DESC LIMIT ?2",
                params![subject_id, limit],
            )
            .await?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            let id: String = row.get(0)?;
            let actor: String = row.get(1)?;
            let action: String = row.get(2)?;
            let subject_id: String = row.get(3)?;
            let reason: String = row.get(4)?;
            let occurred_at: i64 = row.get(5)?;
            records.push(AuditRecord {
                id: id.parse().map_err(|_| StorageError::Mapping(format!("invalid audit id {id}")))?,
                actor,
                action,
                subject_id,
                reason,
                occurred_at,
            });
        }
        Ok(records)
    }
}
