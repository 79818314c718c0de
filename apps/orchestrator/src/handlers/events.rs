use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use ransomeye_alertengine::AdmissionOutcome;
use ransomeye_integrity::{canonical_bytes, sha256_hex};
use ransomeye_types::{Event, Receipt};
use serde_json::json;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// `POST /events`. Canonical ingest path: admits the event through the
/// alert engine, then returns a signed receipt regardless of whether
/// the event produced a new alert, was suppressed as a duplicate alert,
/// or carried no extractable entities — all three are successful
/// admissions. A duplicate *fingerprint* is the one case that is not:
/// `AlertEngine::admit` returns an error for it, which `ApiError`
/// classifies as 409 via `ErrorKind::Conflict`.
pub async fn ingest_event(State(state): State<AppState>, Json(mut event): Json<Event>) -> Result<(StatusCode, Json<Receipt>), ApiError> {
    let now = Utc::now().timestamp_millis();
    event.received_at = now;

    let body_bytes = canonical_bytes(&event.fingerprint_subject()).unwrap_or_default();
    let body_sha256 = sha256_hex(&body_bytes);

    let outcome = state.engine.admit(&event, now).await?;
    match &outcome {
        AdmissionOutcome::NewAlert(alert) => info!(alert_id = %alert.alert_id, "event admitted, new alert"),
        AdmissionOutcome::DuplicateSuppressed { alert_id, hit_count } => info!(%alert_id, hit_count, "event admitted, suppressed as duplicate"),
        AdmissionOutcome::DroppedNoEntities => info!(event_id = %event.event_id, "event admitted, dropped (no entities)"),
    }

    let receipt_subject = json!({
        "event_id": event.event_id,
        "body_sha256": body_sha256,
        "server_ts": now,
    });
    let receipt_bytes = canonical_bytes(&receipt_subject).unwrap_or_default();
    let sig = hex::encode(state.receipt_signer.sign(&receipt_bytes));

    let receipt = Receipt {
        event_id: event.event_id,
        body_sha256,
        server_ts: now,
        sig,
    };

    Ok((StatusCode::ACCEPTED, Json(receipt)))
}
