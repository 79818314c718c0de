use libsql::{params, Connection};
use ransomeye_types::alert::{Alert, AlertStatus, Severity};
use ransomeye_types::{AlertId, EventId};

use crate::error::AlertEngineError;

pub struct AlertRepository {
    connection: Connection,
}

impl AlertRepository {
    pub fn new(connection: Connection) -> Self {
        AlertRepository { connection }
    }

    /// Admits an event's fingerprint once per `(agent_id, fingerprint)`
    /// pair within `window_ms`. A prior row for the same pair older than
    /// the window is replaced rather than treated as a duplicate, so the
    /// same fingerprint becomes admissible again once the window elapses.
    /// Returns the `event_id` that was first admitted within the window
    /// if this call is a duplicate.
    pub async fn admit_fingerprint(&self, agent_id: &str, fingerprint: &str, event_id: EventId, received_at: i64, window_ms: i64) -> Result<Result<(), EventId>, AlertEngineError> {
        let window_start = received_at - window_ms;
        let mut rows = self
            .connection
            .query(
                "SELECT event_id FROM events_seen WHERE agent_id = ?1 AND fingerprint = ?2 AND received_at >= ?3",
                params![agent_id, fingerprint, window_start],
            )
            .await?;
        if let Some(row) = rows.next().await? {
            let existing: String = row.get(0)?;
            let existing_id: EventId = existing.parse().map_err(|_| AlertEngineError::DuplicateFingerprint(existing.clone()))?;
            return Ok(Err(existing_id));
        }

        self.connection
            .execute(
                "INSERT INTO events_seen (agent_id, fingerprint, event_id, received_at) \
                 VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT(agent_id, fingerprint) DO UPDATE SET event_id = excluded.event_id, received_at = excluded.received_at",
                params![agent_id, fingerprint, event_id.to_string(), received_at],
            )
            .await?;
        Ok(Ok(()))
    }

    /// Looks up a live (non-expired-window) alert sharing `dedup_key`.
    pub async fn find_active_by_dedup_key(&self, dedup_key: &str, window_start_ms: i64) -> Result<Option<Alert>, AlertEngineError> {
        let mut rows = self
            .connection
            .query(
                "SELECT alert_id, policy_id, severity, source_events, entities, status, dedup_key, hit_count, created_at, updated_at \
                 FROM alerts WHERE dedup_key = ?1 AND created_at >= ?2 ORDER BY created_at DESC LIMIT 1",
                params![dedup_key, window_start_ms],
            )
            .await?;
        let Some(row) = rows.next().await? else { return Ok(None) };
        Ok(Some(row_to_alert(row)?))
    }

    pub async fn get(&self, alert_id: AlertId) -> Result<Option<Alert>, AlertEngineError> {
        let mut rows = self
            .connection
            .query(
                "SELECT alert_id, policy_id, severity, source_events, entities, status, dedup_key, hit_count, created_at, updated_at \
                 FROM alerts WHERE alert_id = ?1",
                params![alert_id.to_string()],
            )
            .await?;
        let Some(row) = rows.next().await? else { return Ok(None) };
        Ok(Some(row_to_alert(row)?))
    }

    /// Idempotent upsert used by the rehydrator: replaying the same
    /// bundle twice converges to the same row.
    pub async fn upsert(&self, alert: &Alert) -> Result<(), AlertEngineError> {
        self.connection
            .execute(
                "INSERT INTO alerts (alert_id, policy_id, severity, source_events, entities, status, dedup_key, hit_count, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
                 ON CONFLICT(alert_id) DO UPDATE SET \
                    policy_id = excluded.policy_id, severity = excluded.severity, source_events = excluded.source_events, \
                    entities = excluded.entities, status = excluded.status, dedup_key = excluded.dedup_key, \
                    hit_count = excluded.hit_count, updated_at = excluded.updated_at",
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

    pub async fn insert(&self, alert: &Alert) -> Result<(), AlertEngineError> {
        self.connection
            .execute(
                "INSERT INTO alerts (alert_id, policy_id, severity, source_events, entities, status, dedup_key, hit_count, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
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

    pub async fn increment_hit_count(&self, alert_id: AlertId, updated_at: i64) -> Result<(), AlertEngineError> {
        self.connection
            .execute(
                "UPDATE alerts SET hit_count = hit_count + 1, updated_at = ?1 WHERE alert_id = ?2",
                params![updated_at, alert_id.to_string()],
            )
            .await?;
        Ok(())
    }

    /// Backs `GET /alerts?status=&severity=&limit=&offset=`. Filters are
    /// matched against the same JSON-encoded representation `insert`/`upsert`
    /// write, so callers pass the typed enum rather than its wire string.
    pub async fn list(&self, status: Option<AlertStatus>, severity: Option<Severity>, limit: i64, offset: i64) -> Result<Vec<Alert>, AlertEngineError> {
        let status_filter = status.map(|s| serde_json::to_string(&s).unwrap_or_default());
        let severity_filter = severity.map(|s| serde_json::to_string(&s).unwrap_or_default());
        let mut rows = self
            .connection
            .query(
                "SELECT alert_id, policy_id, severity, source_events, entities, status, dedup_key, hit_count, created_at, updated_at \
                 FROM alerts WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR severity = ?2) \
                 ORDER BY created_at DESC LIMIT ?3 OFFSET ?4",
                params![status_filter, severity_filter, limit, offset],
            )
            .await?;
        let mut alerts = Vec::new();
        while let Some(row) = rows.next().await? {
            alerts.push(row_to_alert(row)?);
        }
        Ok(alerts)
    }

    pub async fn transition_status(&self, alert_id: AlertId, next: AlertStatus, updated_at: i64) -> Result<(), AlertEngineError> {
        self.connection
            .execute(
                "UPDATE alerts SET status = ?1, updated_at = ?2 WHERE alert_id = ?3",
                params![serde_json::to_string(&next).unwrap_or_default(), updated_at, alert_id.to_string()],
            )
            .await?;
        Ok(())
    }
}

fn row_to_alert(row: libsql::Row) -> Result<Alert, AlertEngineError> {
    let alert_id: String = row.get(0)?;
    let policy_id: String = row.get(1)?;
    let severity: String = row.get(2)?;
    let source_events: String = row.get(3)?;
    let entities: String = row.get(4)?;
    let status: String = row.get(5)?;
    let dedup_key: String = row.get(6)?;
    let hit_count: i64 = row.get(7)?;
    let created_at: i64 = row.get(8)?;
    let updated_at: i64 = row.get(9)?;

    Ok(Alert {
        alert_id: alert_id.parse().map_err(|_| AlertEngineError::NoPolicyMatch)?,
        policy_id: serde_json::from_str(&policy_id).unwrap_or_default(),
        severity: serde_json::from_str(&severity).map_err(|_| AlertEngineError::NoPolicyMatch)?,
        source_events: serde_json::from_str(&source_events).unwrap_or_default(),
        entities: serde_json::from_str(&entities).unwrap_or_default(),
        status: serde_json::from_str(&status).map_err(|_| AlertEngineError::NoPolicyMatch)?,
        dedup_key,
        created_at,
        updated_at,
        hit_count: hit_count as u64,
    })
}
