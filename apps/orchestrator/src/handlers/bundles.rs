use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use ransomeye_types::bundle::BundleScopeRequest;
use ransomeye_types::{IncidentId, JobId, JobKind};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::job_payloads::BuildBundlePayload;
use crate::state::AppState;

const MAX_BUNDLE_ATTEMPTS: u32 = 5;

#[derive(Deserialize)]
pub struct BundleRequest {
    pub incident_id: IncidentId,
    pub scope: BundleScopeRequest,
    pub idempotency_key: Option<String>,
}

#[derive(Serialize)]
pub struct BundleResponse {
    pub job_id: JobId,
}

/// `POST /bundles`. Enqueues a `build_bundle` job rather than building
/// synchronously — an incident's full scope can span a large number of
/// alerts, so the HTTP surface only ever schedules the work and hands
/// back a job id for `GET /jobs/{id}` to poll.
pub async fn enqueue_bundle(State(state): State<AppState>, Json(req): Json<BundleRequest>) -> Result<(StatusCode, Json<BundleResponse>), ApiError> {
    let payload = BuildBundlePayload {
        incident_id: req.incident_id,
        scope: req.scope,
    };
    let payload_bytes = serde_json::to_vec(&payload).map_err(|e| ApiError::Validation(e.to_string()))?;

    let job_id = state.jobs.enqueue(JobKind::BuildBundle, payload_bytes, req.idempotency_key, MAX_BUNDLE_ATTEMPTS).await?;
    Ok((StatusCode::ACCEPTED, Json(BundleResponse { job_id })))
}
