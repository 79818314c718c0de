use ransomeye_types::bundle::BundleScopeRequest;
use ransomeye_types::{BundleId, IncidentId};
use serde::{Deserialize, Serialize};

/// `Job.payload` shape for `JobKind::BuildBundle`, produced by
/// `POST /bundles` and consumed by the bundle worker.
#[derive(Serialize, Deserialize)]
pub struct BuildBundlePayload {
    pub incident_id: IncidentId,
    pub scope: BundleScopeRequest,
}

/// `Job.payload` shape for `JobKind::RehydrateBundle`. Carries the bundle
/// bytes directly rather than a reference, so the worker never needs a
/// second round trip to fetch them — whether the caller uploaded the
/// archive or pointed at an existing one, by the time the job is
/// enqueued the bytes are already in hand.
#[derive(Serialize, Deserialize)]
pub struct RehydratePayload {
    pub source_bundle_id: Option<BundleId>,
    pub archive_bytes: Vec<u8>,
}
