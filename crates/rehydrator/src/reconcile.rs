//! Idempotent upsert into the same tables the correlation graph owns,
//! using the identical canonicalization (`canonicalize_edge`) so a
//! bundle that overlaps live data converges instead of duplicating rows.

use libsql::{params, Connection};
use ransomeye_graph::canonicalize_edge;
use ransomeye_types::alert::Alert;
use ransomeye_types::incident::{Edge, IncidentNode};
use ransomeye_types::IncidentId;
use tracing::{info, instrument};

use crate::error::RehydrateError;
use crate::verify::read_logical_stream;
use crate::VerifiedBundle;

#[instrument(skip(connection, bundle))]
pub async fn reconcile(connection: &Connection, bundle: &VerifiedBundle) -> Result<ReconcileOutcome, RehydrateError> {
    let already_done: Option<i64> = {
        let mut rows = connection
            .query("SELECT rehydrated_at FROM rehydrated_bundles WHERE manifest_sha256 = ?1", params![bundle.manifest_sha256.clone()])
            .await?;
        match rows.next().await? {
            Some(row) => Some(row.get(0)?),
            None => None,
        }
    };
    if let Some(rehydrated_at) = already_done {
        info!(manifest_sha256 = %bundle.manifest_sha256, rehydrated_at, "bundle already rehydrated, no-op");
        return Ok(ReconcileOutcome {
            incident_id: bundle.manifest.scope.incident_id,
            already_applied: true,
        });
    }

    let nodes: Vec<IncidentNode> = parse_ndjson(bundle, "entities")?;
    let edges: Vec<Edge> = parse_ndjson(bundle, "edges")?;
    let alerts: Vec<Alert> = parse_ndjson(bundle, "alerts")?;
    let incident_id = bundle.manifest.scope.incident_id;

    let tx = connection.transaction().await.map_err(|_| ransomeye_storage::StorageError::Transaction)?;

    let first_seen = nodes.iter().map(|n| n.first_seen).min().unwrap_or(0);
    let last_seen = nodes.iter().map(|n| n.last_seen).max().unwrap_or(first_seen);

    tx.execute(
        "INSERT INTO incidents (incident_id, score, first_seen, last_seen, last_mutated) VALUES (?1, 0.0, ?2, ?3, ?3) \
         ON CONFLICT(incident_id) DO UPDATE SET \
            first_seen = MIN(incidents.first_seen, excluded.first_seen), \
            last_seen = MAX(incidents.last_seen, excluded.last_seen), \
            last_mutated = MAX(incidents.last_mutated, excluded.last_mutated)",
        params![incident_id.to_string(), first_seen, last_seen],
    )
    .await?;

    for node in &nodes {
        tx.execute(
            "INSERT INTO entities (entity_id, type, value, first_seen, last_seen, incident_id) VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(entity_id) DO UPDATE SET \
                first_seen = MIN(entities.first_seen, excluded.first_seen), \
                last_seen = MAX(entities.last_seen, excluded.last_seen), \
                incident_id = COALESCE(entities.incident_id, excluded.incident_id)",
            params![
                node.entity_id.to_hex(),
                serde_json::to_string(&node.entity_type).unwrap_or_default(),
                node.value.clone(),
                node.first_seen,
                node.last_seen,
                incident_id.to_string(),
            ],
        )
        .await?;
    }

    for edge in &edges {
        let canonical = canonicalize_edge(edge.src_id, edge.dst_id, &edge.relation, edge.first_seen, edge.last_seen);
        tx.execute(
            "INSERT INTO edges (src_id, dst_id, relation, first_seen, last_seen, incident_id) VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(src_id, dst_id, relation) DO UPDATE SET \
                first_seen = MIN(edges.first_seen, excluded.first_seen), \
                last_seen = MAX(edges.last_seen, excluded.last_seen), \
                incident_id = COALESCE(edges.incident_id, excluded.incident_id)",
            params![
                canonical.src_id.to_hex(),
                canonical.dst_id.to_hex(),
                canonical.relation,
                canonical.first_seen,
                canonical.last_seen,
                incident_id.to_string(),
            ],
        )
        .await?;
    }

    for alert in &alerts {
        upsert_alert(&tx, alert).await?;
        tx.execute(
            "INSERT OR IGNORE INTO incident_alerts (incident_id, alert_id) VALUES (?1, ?2)",
            params![incident_id.to_string(), alert.alert_id.to_string()],
        )
        .await?;
    }

    tx.execute(
        "INSERT INTO rehydrated_bundles (manifest_sha256, rehydrated_at) VALUES (?1, ?2)",
        params![bundle.manifest_sha256.clone(), last_seen],
    )
    .await?;

    tx.commit().await.map_err(|_| ransomeye_storage::StorageError::Transaction)?;

    info!(incident_id = %incident_id, nodes = nodes.len(), edges = edges.len(), alerts = alerts.len(), "bundle reconciled");
    Ok(ReconcileOutcome {
        incident_id,
        already_applied: false,
    })
}

async fn upsert_alert(tx: &libsql::Transaction, alert: &Alert) -> Result<(), RehydrateError> {
    tx.execute(
        "INSERT INTO alerts (alert_id, policy_id, severity, source_events, entities, status, dedup_key, hit_count, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
         ON CONFLICT(alert_id) DO UPDATE SET \
            status = excluded.status, hit_count = excluded.hit_count, updated_at = excluded.updated_at",
        params![
            alert.alert_id.to_string(),
            serde_json::to_string(&alert.policy_id).unwrap_or_default(),
            serde_json::to_string(&alert.severity).unwrap_or_default(),
            serde_json::to_string(&alert.source_events).unwrap_or_default(),
            serde_json::to_string(&alert.entities).unwrap_or_default(),
            serde_json::to_string(&alert.status).unwrap_or_default(),
            alert.dedup_key.clone(),
            alert.hit_count as i64,
            alert.created_at,
            alert.updated_at,
        ],
    )
    .await?;
    Ok(())
}

fn parse_ndjson<T: serde::de::DeserializeOwned>(bundle: &VerifiedBundle, logical_name: &str) -> Result<Vec<T>, RehydrateError> {
    let bytes = read_logical_stream(bundle.root_dir.path(), &bundle.manifest, logical_name)?;
    let mut items = Vec::new();
    for line in bytes.split(|b| *b == b'\n') {
        if line.is_empty() {
            continue;
        }
        items.push(serde_json::from_slice(line)?);
    }
    Ok(items)
}

pub struct ReconcileOutcome {
    pub incident_id: IncidentId,
    pub already_applied: bool,
}
