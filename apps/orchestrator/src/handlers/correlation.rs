use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use ransomeye_types::alert::Alert;
use ransomeye_types::incident::Incident;
use ransomeye_types::IncidentId;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct IngestResult {
    pub alert_id: String,
    pub incident_id: String,
}

/// `POST /correlation/ingest`. Internal service-to-service path: the
/// alert engine (or a rehydrate replay) pushes already-admitted alerts in
/// here for graph merge; this never re-runs admission.
pub async fn ingest_batch(State(state): State<AppState>, Json(alerts): Json<Vec<Alert>>) -> Result<(StatusCode, Json<Vec<IngestResult>>), ApiError> {
    let now = Utc::now().timestamp_millis();
    let mut results = Vec::with_capacity(alerts.len());
    for alert in &alerts {
        let incident_id = state.graph.ingest_alert(alert, now).await?;
        results.push(IngestResult {
            alert_id: alert.alert_id.to_string(),
            incident_id: incident_id.to_string(),
        });
    }
    Ok((StatusCode::OK, Json(results)))
}

pub async fn get_incident(State(state): State<AppState>, Path(incident_id): Path<IncidentId>) -> Result<Json<Incident>, ApiError> {
    let incident = state
        .graph
        .get_incident(incident_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("incident {incident_id} not found")))?;
    Ok(Json(incident))
}
