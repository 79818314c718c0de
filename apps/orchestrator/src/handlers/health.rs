use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use tracing::info;

use crate::state::AppState;

/// `GET /healthz`. Deliberately bypasses `health_guard` (it is the one
/// route that must answer even while the service is in maintenance mode)
/// so an external liveness probe can distinguish "not ready yet" from
/// "process is dead".
pub async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    match state.is_operational() {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(reason) => (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "maintenance", "reason": reason }))),
    }
}

/// `GET /metrics`, Prometheus text exposition format.
pub async fn metrics() -> impl IntoResponse {
    (StatusCode::OK, ransomeye_telemetry::render_metrics())
}

/// `POST /heartbeat`. Best-effort liveness/counters report from an agent;
/// there is no agent registry in scope, so this only confirms the agent
/// reached the orchestrator and surfaces its counters in the log.
pub async fn heartbeat(Json(payload): Json<serde_json::Value>) -> impl IntoResponse {
    info!(?payload, "agent heartbeat received");
    StatusCode::NO_CONTENT
}
