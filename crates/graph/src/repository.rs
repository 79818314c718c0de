use std::collections::BTreeSet;

use dashmap::DashMap;
use libsql::{params, Connection};
use ransomeye_types::alert::Alert;
use ransomeye_types::incident::{Edge, Incident, IncidentNode};
use ransomeye_types::{AlertId, EntityId, IncidentId};
use tracing::{info, instrument};

use crate::error::GraphError;

/// Canonicalizes endpoint order so `src_id < dst_id`. Building an `Edge`
/// anywhere else in the workspace is a bug.
pub fn canonicalize_edge(a: EntityId, b: EntityId, relation: &str, first_seen: i64, last_seen: i64) -> Edge {
    let (src_id, dst_id) = if a <= b { (a, b) } else { (b, a) };
    Edge {
        src_id,
        dst_id,
        relation: relation.to_string(),
        first_seen,
        last_seen,
    }
}

/// The persisted store is the source of truth; this map is an advisory
/// read-through cache so repeated lookups of the same incident within a
/// hot window skip a round trip. It is invalidated on every write the
/// same transaction performs.
pub struct GraphRepository {
    connection: Connection,
    cache: DashMap<IncidentId, Incident>,
}

impl GraphRepository {
    pub fn new(connection: Connection) -> Self {
        GraphRepository {
            connection,
            cache: DashMap::new(),
        }
    }

    /// Every mutation this performs — entity upserts, edge upserts,
    /// incident creation/merge — runs inside one transaction.
    #[instrument(skip(self, alert))]
    pub async fn ingest_alert(&self, alert: &Alert, now_ms: i64) -> Result<IncidentId, GraphError> {
        let tx = self.connection.transaction().await.map_err(|_| GraphError::Storage(ransomeye_storage::StorageError::Transaction))?;

        for entity in &alert.entities {
            tx.execute(
                "INSERT INTO entities (entity_id, type, value, first_seen, last_seen) VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(entity_id) DO UPDATE SET last_seen = excluded.last_seen",
                params![entity.id.to_hex(), serde_json::to_string(&entity.kind).unwrap_or_default(), entity.value.clone(), now_ms],
            )
            .await?;
        }

        let mut edges: Vec<Edge> = Vec::new();
        for i in 0..alert.entities.len() {
            for j in (i + 1)..alert.entities.len() {
                edges.push(canonicalize_edge(alert.entities[i].id, alert.entities[j].id, "co-occurs", now_ms, now_ms));
            }
        }
        for edge in &edges {
            tx.execute(
                "INSERT INTO edges (src_id, dst_id, relation, first_seen, last_seen) VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(src_id, dst_id, relation) DO UPDATE SET last_seen = excluded.last_seen",
                params![edge.src_id.to_hex(), edge.dst_id.to_hex(), edge.relation.clone(), now_ms],
            )
            .await?;
        }

        // Which incidents currently own any node in this alert's entity set?
        let mut touched: BTreeSet<IncidentId> = BTreeSet::new();
        for entity in &alert.entities {
            let mut rows = tx
                .query("SELECT incident_id FROM entities WHERE entity_id = ?1 AND incident_id IS NOT NULL", params![entity.id.to_hex()])
                .await?;
            if let Some(row) = rows.next().await? {
                let raw: String = row.get(0)?;
                if let Ok(id) = raw.parse::<IncidentId>() {
                    touched.insert(id);
                }
            }
        }

        let survivor_id = if touched.is_empty() {
            let new_id = IncidentId::new();
            tx.execute(
                "INSERT INTO incidents (incident_id, score, first_seen, last_seen, last_mutated) VALUES (?1, 0.0, ?2, ?2, ?2)",
                params![new_id.to_string(), now_ms],
            )
            .await?;
            new_id
        } else if touched.len() == 1 {
            *touched.iter().next().unwrap()
        } else {
            self.merge_incidents(&tx, &touched, now_ms).await?
        };

        for entity in &alert.entities {
            tx.execute("UPDATE entities SET incident_id = ?1 WHERE entity_id = ?2", params![survivor_id.to_string(), entity.id.to_hex()]).await?;
        }
        for edge in &edges {
            tx.execute(
                "UPDATE edges SET incident_id = ?1 WHERE src_id = ?2 AND dst_id = ?3 AND relation = ?4",
                params![survivor_id.to_string(), edge.src_id.to_hex(), edge.dst_id.to_hex(), edge.relation.clone()],
            )
            .await?;
        }
        tx.execute(
            "INSERT OR IGNORE INTO incident_alerts (incident_id, alert_id) VALUES (?1, ?2)",
            params![survivor_id.to_string(), alert.alert_id.to_string()],
        )
        .await?;
        tx.execute("UPDATE incidents SET last_seen = ?1, last_mutated = ?1 WHERE incident_id = ?2", params![now_ms, survivor_id.to_string()]).await?;

        tx.commit().await.map_err(|_| GraphError::Storage(ransomeye_storage::StorageError::Transaction))?;
        self.cache.remove(&survivor_id);
        for absorbed in &touched {
            self.cache.remove(absorbed);
        }

        info!(incident_id = %survivor_id, alert_id = %alert.alert_id, "alert attached to incident");
        Ok(survivor_id)
    }

    /// The surviving incident is the one with the oldest `first_seen`,
    /// tiebroken by the lower `incident_id`. All nodes/edges/alerts of
    /// the others move to it; the absorbed incidents are marked
    /// `merged_into` and frozen.
    async fn merge_incidents(&self, tx: &libsql::Transaction, touched: &BTreeSet<IncidentId>, now_ms: i64) -> Result<IncidentId, GraphError> {
        let mut candidates: Vec<(IncidentId, i64)> = Vec::new();
        for id in touched {
            let mut rows = tx.query("SELECT first_seen FROM incidents WHERE incident_id = ?1", params![id.to_string()]).await?;
            let Some(row) = rows.next().await? else { continue };
            let first_seen: i64 = row.get(0)?;
            candidates.push((*id, first_seen));
        }
        candidates.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));
        let survivor = candidates[0].0;

        for (absorbed, _) in candidates.iter().skip(1) {
            tx.execute(
                "UPDATE entities SET incident_id = ?1 WHERE incident_id = ?2",
                params![survivor.to_string(), absorbed.to_string()],
            )
            .await?;
            tx.execute(
                "UPDATE edges SET incident_id = ?1 WHERE incident_id = ?2",
                params![survivor.to_string(), absorbed.to_string()],
            )
            .await?;
            tx.execute(
                "INSERT OR IGNORE INTO incident_alerts (incident_id, alert_id) SELECT ?1, alert_id FROM incident_alerts WHERE incident_id = ?2",
                params![survivor.to_string(), absorbed.to_string()],
            )
            .await?;
            tx.execute(
                "UPDATE incidents SET merged_into = ?1, last_mutated = ?2 WHERE incident_id = ?3",
                params![survivor.to_string(), now_ms, absorbed.to_string()],
            )
            .await?;
        }
        Ok(survivor)
    }

    pub async fn get_incident(&self, incident_id: IncidentId) -> Result<Option<Incident>, GraphError> {
        if let Some(cached) = self.cache.get(&incident_id) {
            return Ok(Some(cached.clone()));
        }

        let mut rows = self
            .connection
            .query(
                "SELECT incident_id, score, scored_at, first_seen, last_seen, last_mutated, merged_into FROM incidents WHERE incident_id = ?1",
                params![incident_id.to_string()],
            )
            .await?;
        let Some(row) = rows.next().await? else { return Ok(None) };

        let id_str: String = row.get(0)?;
        let score: f64 = row.get(1)?;
        let scored_at: Option<i64> = row.get(2)?;
        let first_seen: i64 = row.get(3)?;
        let last_seen: i64 = row.get(4)?;
        let last_mutated: i64 = row.get(5)?;
        let merged_into_raw: Option<String> = row.get(6)?;

        let nodes = self.fetch_nodes(incident_id).await?;
        let edges = self.fetch_edges(incident_id).await?;
        let alerts = self.fetch_alerts(incident_id).await?;

        let incident = Incident {
            incident_id: id_str.parse().map_err(|_| GraphError::NotFound(incident_id.to_string()))?,
            nodes,
            edges,
            alerts,
            score,
            scored_at,
            first_seen,
            last_seen,
            last_mutated,
            merged_into: merged_into_raw.and_then(|s| s.parse().ok()),
        };
        self.cache.insert(incident_id, incident.clone());
        Ok(Some(incident))
    }

    async fn fetch_nodes(&self, incident_id: IncidentId) -> Result<Vec<IncidentNode>, GraphError> {
        let mut rows = self
            .connection
            .query(
                "SELECT entity_id, type, value, first_seen, last_seen FROM entities WHERE incident_id = ?1",
                params![incident_id.to_string()],
            )
            .await?;
        let mut nodes = Vec::new();
        while let Some(row) = rows.next().await? {
            let entity_hex: String = row.get(0)?;
            let type_json: String = row.get(1)?;
            let value: String = row.get(2)?;
            let first_seen: i64 = row.get(3)?;
            let last_seen: i64 = row.get(4)?;
            let bytes = hex::decode(&entity_hex).map_err(|_| GraphError::NotFound(entity_hex.clone()))?;
            let mut id_bytes = [0u8; 16];
            id_bytes.copy_from_slice(&bytes[..16]);
            let entity_type = serde_json::from_str(&type_json).map_err(|_| GraphError::NotFound(type_json.clone()))?;
            nodes.push(IncidentNode {
                entity_id: EntityId(id_bytes),
                entity_type,
                value,
                first_seen,
                last_seen,
            });
        }
        Ok(nodes)
    }

    async fn fetch_edges(&self, incident_id: IncidentId) -> Result<Vec<Edge>, GraphError> {
        let mut rows = self
            .connection
            .query("SELECT src_id, dst_id, relation, first_seen, last_seen FROM edges WHERE incident_id = ?1", params![incident_id.to_string()])
            .await?;
        let mut edges = Vec::new();
        while let Some(row) = rows.next().await? {
            let src_hex: String = row.get(0)?;
            let dst_hex: String = row.get(1)?;
            let relation: String = row.get(2)?;
            let first_seen: i64 = row.get(3)?;
            let last_seen: i64 = row.get(4)?;
            edges.push(Edge {
                src_id: parse_entity_id(&src_hex)?,
                dst_id: parse_entity_id(&dst_hex)?,
                relation,
                first_seen,
                last_seen,
            });
        }
        Ok(edges)
    }

    async fn fetch_alerts(&self, incident_id: IncidentId) -> Result<Vec<AlertId>, GraphError> {
        let mut rows = self
            .connection
            .query("SELECT alert_id FROM incident_alerts WHERE incident_id = ?1", params![incident_id.to_string()])
            .await?;
        let mut alerts = Vec::new();
        while let Some(row) = rows.next().await? {
            let raw: String = row.get(0)?;
            if let Ok(id) = raw.parse() {
                alerts.push(id);
            }
        }
        Ok(alerts)
    }

    /// Applies a scorer result, enforcing the monotonic `scored_at` guard:
    /// a stale score never overwrites a newer one.
    pub async fn apply_score(&self, incident_id: IncidentId, score: f64, scored_at: i64) -> Result<(), GraphError> {
        self.connection
            .execute(
                "UPDATE incidents SET score = ?1, scored_at = ?2 WHERE incident_id = ?3 AND (scored_at IS NULL OR scored_at < ?2)",
                params![score, scored_at, incident_id.to_string()],
            )
            .await?;
        self.cache.remove(&incident_id);
        Ok(())
    }
}

fn parse_entity_id(hex_str: &str) -> Result<EntityId, GraphError> {
    let bytes = hex::decode(hex_str).map_err(|_| GraphError::NotFound(hex_str.to_string()))?;
    let mut id_bytes = [0u8; 16];
    id_bytes.copy_from_slice(&bytes[..16]);
    Ok(EntityId(id_bytes))
}
