//! Local collector worker: a loopback-only HTTP endpoint local sensors
//! (the probe, or any other telemetry source running on the same host)
//! post raw observations to. The collector's only job is
//! `canonical(event) -> write_atomic(pending/...)` — it does not talk to
//! the network itself, the uploader worker (`drain_once`, run separately)
//! does that.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use ransomeye_integrity::{canonical_bytes, sha256_hex};
use ransomeye_transport::AgentBuffer;
use ransomeye_types::{Event, EventId, EventKind};
use serde::Deserialize;
use tracing::warn;

#[derive(Clone)]
pub struct CollectorState {
    pub buffer: Arc<AgentBuffer>,
    pub agent_id: String,
    pub tenant_id: String,
}

#[derive(Deserialize)]
pub struct RecordRequest {
    pub kind: EventKind,
    pub occurred_at: i64,
    pub payload: serde_json::Value,
}

pub fn router(state: CollectorState) -> Router {
    Router::new().route("/record", post(record)).with_state(state)
}

async fn record(State(state): State<CollectorState>, Json(req): Json<RecordRequest>) -> StatusCode {
    let mut event = Event {
        event_id: EventId::new(),
        agent_id: state.agent_id.clone(),
        tenant_id: state.tenant_id.clone(),
        occurred_at: req.occurred_at,
        received_at: req.occurred_at,
        kind: req.kind,
        payload: req.payload,
        fingerprint: String::new(),
    };
    let subject = event.fingerprint_subject();
    event.fingerprint = match canonical_bytes(&subject) {
        Ok(bytes) => sha256_hex(&bytes),
        Err(e) => {
            warn!(error = %e, "failed to canonicalize event fingerprint subject");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    match state.buffer.record(&event) {
        Ok(()) => StatusCode::ACCEPTED,
        Err(e) => {
            warn!(error = %e, "failed to record event into the local buffer");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
