use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use ransomeye_types::alert::{Alert, AlertStatus, Severity};
use ransomeye_types::{AlertId, AuditRecord};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ListAlertsQuery {
    pub status: Option<AlertStatus>,
    pub severity: Option<Severity>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `GET /alerts`. Page size defaults to 50 and is capped at 500; there
/// is no cursor, only offset pagination, matching the rest of this
/// workspace's list endpoints.
pub async fn list_alerts(State(state): State<AppState>, Query(query): Query<ListAlertsQuery>) -> Result<Json<Vec<Alert>>, ApiError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let offset = query.offset.unwrap_or(0).max(0);
    let alerts = state.alerts.list(query.status, query.severity, limit, offset).await?;
    Ok(Json(alerts))
}

pub async fn get_alert(State(state): State<AppState>, Path(alert_id): Path<AlertId>) -> Result<Json<Alert>, ApiError> {
    let alert = state
        .alerts
        .get(alert_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("alert {alert_id} not found")))?;
    Ok(Json(alert))
}

#[derive(Deserialize)]
pub struct TransitionRequest {
    pub status: AlertStatus,
    /// Required when `status` is `open` and the current status is
    /// `resolved` or `false_positive` — every reopen is audited.
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct TransitionResponse {
    pub alert_id: AlertId,
    pub status: AlertStatus,
}

/// `PATCH /alerts/{id}`. Forward transitions follow
/// `AlertStatus::can_transition_to`; `resolved -> open` and
/// `false_positive -> open` are a separate reopen path that requires a
/// reason and leaves an audit trail instead of being rejected outright.
pub async fn transition_alert(State(state): State<AppState>, Path(alert_id): Path<AlertId>, Json(req): Json<TransitionRequest>) -> Result<Json<TransitionResponse>, ApiError> {
    let alert = state
        .alerts
        .get(alert_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("alert {alert_id} not found")))?;
    let now = Utc::now().timestamp_millis();

    let is_reopen = matches!(alert.status, AlertStatus::Resolved | AlertStatus::FalsePositive) && req.status == AlertStatus::Open;

    if is_reopen {
        let reason = req
            .reason
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| ApiError::Validation("reopening a resolved alert requires a reason".to_string()))?;

        state
            .audit
            .insert(&AuditRecord::new("operator", "alert_reopen", alert_id.to_string(), reason, now))
            .await
            .map_err(ransomeye_alertengine::AlertEngineError::from)?;
        state.alerts.transition_status(alert_id, AlertStatus::Open, now).await?;
    } else if alert.status.can_transition_to(req.status) {
        state.alerts.transition_status(alert_id, req.status, now).await?;
    } else {
        return Err(ApiError::Validation(format!("cannot transition alert from {:?} to {:?}", alert.status, req.status)));
    }

    Ok(Json(TransitionResponse { alert_id, status: req.status }))
}

/// `POST /alerts/batch` (legacy path). Each event is admitted
/// independently; a failure in one does not abort the rest, matching the
/// "best-effort per-item outcome" contract callers of this endpoint expect.
#[derive(Serialize)]
pub struct BatchOutcome {
    pub event_id: String,
    pub ok: bool,
    pub detail: Option<String>,
}

pub async fn ingest_batch(State(state): State<AppState>, Json(events): Json<Vec<ransomeye_types::Event>>) -> Result<(StatusCode, Json<Vec<BatchOutcome>>), ApiError> {
    let now = Utc::now().timestamp_millis();
    let mut outcomes = Vec::with_capacity(events.len());

    for mut event in events {
        event.received_at = now;
        let event_id = event.event_id.to_string();
        match state.engine.admit(&event, now).await {
            Ok(_) => outcomes.push(BatchOutcome { event_id, ok: true, detail: None }),
            Err(e) => outcomes.push(BatchOutcome { event_id, ok: false, detail: Some(e.to_string()) }),
        }
    }

    Ok((StatusCode::MULTI_STATUS, Json(outcomes)))
}
