use std::time::Duration;

use chrono::Utc;
use ransomeye_bundler::{BundleBuilder, BundleRecord};
use ransomeye_integrity::{manifest_canonical_bytes, sha256_hex};
use ransomeye_types::job::{Job, JobKind, JobOutcome};
use ransomeye_types::{BundleId, JobId};
use tracing::{error, info, warn};

use crate::job_payloads::{BuildBundlePayload, RehydratePayload};
use crate::state::AppState;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Runs forever, leasing and executing `build_bundle` and
/// `rehydrate_bundle` jobs off the durable queue (C2/C7/C8 composed).
/// One worker loop handles both kinds; neither is CPU-bound enough on its
/// own to warrant a dedicated pool.
pub async fn run(state: AppState, worker_id: String) {
    loop {
        match state.jobs.lease(&[JobKind::BuildBundle, JobKind::RehydrateBundle], &worker_id, state.config.queue_lease_ttl_ms).await {
            Ok(Some(job)) => {
                let job_id = job.job_id;
                if let Err(e) = execute(&state, job).await {
                    warn!(%job_id, error = %e, "job failed, reporting retry");
                    let _ = state.jobs.complete(job_id, &worker_id, JobOutcome::Retry { error: e }).await;
                } else {
                    info!(%job_id, "job completed");
                }
            }
            Ok(None) => tokio::time::sleep(POLL_INTERVAL).await,
            Err(e) => {
                error!(error = %e, "failed to lease a job");
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }
}

async fn execute(state: &AppState, job: Job) -> Result<(), String> {
    match job.kind {
        JobKind::BuildBundle => build_bundle(state, job.job_id, &job.payload, job.idempotency_key.clone()).await,
        JobKind::RehydrateBundle => rehydrate(state, &job.payload).await,
    }
}

async fn build_bundle(state: &AppState, job_id: JobId, payload: &[u8], idempotency_key: Option<String>) -> Result<(), String> {
    let request: BuildBundlePayload = serde_json::from_slice(payload).map_err(|e| format!("malformed build_bundle payload: {e}"))?;
    info!(%job_id, incident_id = %request.incident_id, "building bundle");

    let builder = BundleBuilder::new(&state.graph, &state.alerts, &state.bundle_signer, state.config.node_id.clone(), state.config.bundle_chunk_size_bytes, state.config.bundle_zstd_level);

    let artifact = builder
        .build(request.incident_id, request.scope, &state.config.bundle_store_dir)
        .await
        .map_err(|e| e.to_string())?;

    let manifest_bytes = manifest_canonical_bytes(&artifact.manifest).map_err(|e| e.to_string())?;
    let record = BundleRecord {
        bundle_id: BundleId::new(),
        incident_id: request.incident_id,
        path: artifact.bundle_path.to_string_lossy().to_string(),
        manifest_sha256: sha256_hex(&manifest_bytes),
        idempotency_key,
        created_at: Utc::now().timestamp_millis(),
    };
    state.bundles.insert(&record).await.map_err(|e| e.to_string())?;
    Ok(())
}

async fn rehydrate(state: &AppState, payload: &[u8]) -> Result<(), String> {
    let request: RehydratePayload = serde_json::from_slice(payload).map_err(|e| format!("malformed rehydrate_bundle payload: {e}"))?;
    let connection = state.db.connection().map_err(|e| e.to_string())?;
    ransomeye_rehydrator::rehydrate(&connection, &request.archive_bytes, &state.bundle_verifier).await.map_err(|e| e.to_string())?;
    Ok(())
}
