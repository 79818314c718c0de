use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use ransomeye_types::{BundleId, JobId, JobKind};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::job_payloads::RehydratePayload;
use crate::state::AppState;

const MAX_REHYDRATE_ATTEMPTS: u32 = 5;

#[derive(Deserialize)]
pub struct RehydrateRequest {
    /// Base64 is not used here: the archive is binary and callers send it
    /// as a JSON array of bytes or, more commonly, reference an already
    /// materialized bundle by id instead of re-uploading it.
    pub archive_bytes: Option<Vec<u8>>,
    pub bundle_id: Option<BundleId>,
}

#[derive(Serialize)]
pub struct RehydrateResponse {
    pub job_id: JobId,
}

/// `POST /rehydrate`. Accepts either an uploaded archive or a reference
/// to a bundle this node already produced; either way the enqueued job
/// payload carries the bytes directly so the worker never needs a
/// second fetch.
pub async fn enqueue_rehydrate(State(state): State<AppState>, Json(req): Json<RehydrateRequest>) -> Result<(StatusCode, Json<RehydrateResponse>), ApiError> {
    let (archive_bytes, source_bundle_id) = match (req.archive_bytes, req.bundle_id) {
        (Some(bytes), _) => (bytes, req.bundle_id),
        (None, Some(bundle_id)) => {
            let record = state
                .bundles
                .get(bundle_id)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("bundle {bundle_id} not found")))?;
            let bytes = tokio::fs::read(&record.path).await.map_err(|e| ApiError::Validation(format!("failed to read bundle {bundle_id}: {e}")))?;
            (bytes, Some(bundle_id))
        }
        (None, None) => return Err(ApiError::Validation("one of archive_bytes or bundle_id is required".to_string())),
    };

    let payload = RehydratePayload { source_bundle_id, archive_bytes };
    let payload_bytes = serde_json::to_vec(&payload).map_err(|e| ApiError::Validation(e.to_string()))?;

    let job_id = state.jobs.enqueue(JobKind::RehydrateBundle, payload_bytes, None, MAX_REHYDRATE_ATTEMPTS).await?;
    Ok((StatusCode::ACCEPTED, Json(RehydrateResponse { job_id })))
}
