use axum::extract::{Path, State};
use axum::Json;
use ransomeye_types::{Job, JobId};

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /jobs/{id}`. Polling target for both `POST /bundles` and
/// `POST /rehydrate`; exposes attempts/last_error so a caller can tell a
/// job that is still retrying from one that has gone terminal.
pub async fn get_job(State(state): State<AppState>, Path(job_id): Path<JobId>) -> Result<Json<Job>, ApiError> {
    let job = state
        .jobs
        .get(job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("job {job_id} not found")))?;
    Ok(Json(job))
}
