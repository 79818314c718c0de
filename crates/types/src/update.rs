use serde::{Deserialize, Serialize};

use crate::bundle::{ManifestAlgorithms, ManifestEntry, ManifestProducer};

/// Manifest schema for a signed update bundle. Shares its entry, producer,
/// and algorithm shapes with the incident bundle manifest since both are
/// built by the same `manifest_build`/`merkle_root` contract in the
/// integrity kernel; the scope is different enough (a target version and
/// self-test path rather than an incident) to warrant its own top-level
/// type instead of reusing `Manifest` as-is.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdateManifest {
    pub version: String,
    pub producer: ManifestProducer,
    pub created_at: String,
    pub algorithms: ManifestAlgorithms,
    pub target_version: String,
    pub self_test_path: String,
    pub entries: Vec<ManifestEntry>,
    pub merkle_root: String,
}
