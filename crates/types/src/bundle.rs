use serde::{Deserialize, Serialize};

use crate::ids::IncidentId;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Zstd,
    Gzip,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ManifestAlgorithms {
    pub hash: String,
    pub signature: String,
    pub compression: Compression,
}

impl Default for ManifestAlgorithms {
    fn default() -> Self {
        ManifestAlgorithms {
            hash: "sha-256".to_string(),
            signature: "rsa-pss-sha256".to_string(),
            compression: Compression::Zstd,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ManifestProducer {
    pub name: String,
    pub version: String,
    pub node_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BundleScope {
    pub incident_id: IncidentId,
    pub since: Option<i64>,
    pub entities: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    pub size: u64,
    pub sha256: String,
    pub chunk_index: Option<u32>,
}

/// Canonical manifest schema. Field order here is the order they are
/// emitted in `canonical()`'s top-level object, matching the wire schema.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub producer: ManifestProducer,
    pub created_at: String,
    pub algorithms: ManifestAlgorithms,
    pub scope: BundleScope,
    pub entries: Vec<ManifestEntry>,
    pub merkle_root: String,
}

/// Scope policy requested when enqueuing a `build_bundle` job.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleScopeRequest {
    Full,
    SinceTimestamp(i64),
    Entities(Vec<String>),
}
