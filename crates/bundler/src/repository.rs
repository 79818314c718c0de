use libsql::{params, Connection};
use ransomeye_types::{BundleId, IncidentId};

use crate::error::BundleError;

/// A materialized bundle, persisted so `POST /rehydrate` can reference one
/// by id instead of the caller re-uploading bytes it already has, and so
/// an idempotent `build_bundle` job replay returns the prior bundle's path.
pub struct BundleRecord {
    pub bundle_id: BundleId,
    pub incident_id: IncidentId,
    pub path: String,
    pub manifest_sha256: String,
    pub idempotency_key: Option<String>,
    pub created_at: i64,
}

pub struct BundleRepository {
    connection: Connection,
}

impl BundleRepository {
    pub fn new(connection: Connection) -> Self {
        BundleRepository { connection }
    }

    pub async fn insert(&self, record: &BundleRecord) -> Result<(), BundleError> {
        self.connection
            .execute(
                "INSERT INTO bundles (bundle_id, incident_id, path, manifest_sha256, idempotency_key, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.bundle_id.to_string(),
                    record.incident_id.to_string(),
                    record.path.clone(),
                    record.manifest_sha256.clone(),
                    record.idempotency_key.clone(),
                    record.created_at,
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn get(&self, bundle_id: BundleId) -> Result<Option<BundleRecord>, BundleError> {
        let mut rows = self
            .connection
            .query(
                "SELECT bundle_id, incident_id, path, manifest_sha256, idempotency_key, created_at FROM bundles WHERE bundle_id = ?1",
                params![bundle_id.to_string()],
            )
            .await?;
        let Some(row) = rows.next().await? else { return Ok(None) };
        Ok(Some(row_to_record(row)?))
    }

    pub async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<BundleRecord>, BundleError> {
        let mut rows = self
            .connection
            .query(
                "SELECT bundle_id, incident_id, path, manifest_sha256, idempotency_key, created_at FROM bundles WHERE idempotency_key = ?1 \
                 ORDER BY created_at DESC LIMIT 1",
                params![key],
            )
            .await?;
        let Some(row) = rows.next().await? else { return Ok(None) };
        Ok(Some(row_to_record(row)?))
    }
}

fn row_to_record(row: libsql::Row) -> Result<BundleRecord, BundleError> {
    let bundle_id: String = row.get(0)?;
    let incident_id: String = row.get(1)?;
    let path: String = row.get(2)?;
    let manifest_sha256: String = row.get(3)?;
    let idempotency_key: Option<String> = row.get(4)?;
    let created_at: i64 = row.get(5)?;
    Ok(BundleRecord {
        bundle_id: bundle_id.parse().map_err(|_| BundleError::MalformedRecord(format!("invalid bundle id {bundle_id}")))?,
        incident_id: incident_id.parse().map_err(|_| BundleError::MalformedRecord(format!("invalid incident id {incident_id}")))?,
        path,
        manifest_sha256,
        idempotency_key,
        created_at,
    })
}
