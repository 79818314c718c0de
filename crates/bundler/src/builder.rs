use std::path::{Path, PathBuf};

use chrono::Utc;
use ransomeye_alertengine::AlertRepository;
use ransomeye_graph::GraphRepository;
use ransomeye_integrity::{manifest_canonical_bytes, merkle_root, write_atomic, SigningIdentity};
use ransomeye_types::bundle::{
    BundleScope, BundleScopeRequest, Manifest, ManifestAlgorithms, ManifestEntry, ManifestProducer,
};
use ransomeye_types::incident::Incident;
use ransomeye_types::IncidentId;
use tracing::{info, instrument};

use crate::compression::{compress_tree, decide_compression};
use crate::error::BundleError;
use crate::writer::ChunkedWriter;

pub struct BundleArtifact {
    pub bundle_path: PathBuf,
    pub manifest: Manifest,
    pub manifest_sig: Vec<u8>,
}

/// Builds a signed, chunked, verifiable archive for one incident.
pub struct BundleBuilder<'a> {
    graph: &'a GraphRepository,
    alerts: &'a AlertRepository,
    signer: &'a SigningIdentity,
    node_id: String,
    chunk_size: u64,
    zstd_level: i32,
}

impl<'a> BundleBuilder<'a> {
    pub fn new(
        graph: &'a GraphRepository,
        alerts: &'a AlertRepository,
        signer: &'a SigningIdentity,
        node_id: impl Into<String>,
        chunk_size: u64,
        zstd_level: i32,
    ) -> Self {
        BundleBuilder {
            graph,
            alerts,
            signer,
            node_id: node_id.into(),
            chunk_size,
            zstd_level,
        }
    }

    #[instrument(skip(self, bundle_store_dir))]
    pub async fn build(&self, incident_id: IncidentId, scope: BundleScopeRequest, bundle_store_dir: &Path) -> Result<BundleArtifact, BundleError> {
        let incident = self
            .graph
            .get_incident(incident_id)
            .await?
            .ok_or_else(|| BundleError::IncidentNotFound(incident_id.to_string()))?;

        let scratch = tempfile::tempdir()?;
        let mut entries: Vec<ManifestEntry> = Vec::new();

        entries.extend(self.write_nodes(scratch.path(), &incident)?);
        entries.extend(self.write_edges(scratch.path(), &incident)?);
        entries.extend(self.write_alerts(scratch.path(), &incident).await?);

        let algo = decide_compression(self.zstd_level);
        let root = merkle_root(&entries);
        let manifest = Manifest {
            version: "1".to_string(),
            producer: ManifestProducer {
                name: "ransomeye-bundler".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                node_id: self.node_id.clone(),
            },
            created_at: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            algorithms: ManifestAlgorithms {
                compression: algo,
                ..ManifestAlgorithms::default()
            },
            scope: scope_to_bundle_scope(incident_id, &scope),
            entries,
            merkle_root: root,
        };

        let manifest_bytes = manifest_canonical_bytes(&manifest)?;
        write_atomic(&scratch.path().join("manifest.json"), &manifest_bytes)?;
        let manifest_sig = self.signer.sign(&manifest_bytes);
        write_atomic(&scratch.path().join("manifest.sig"), &manifest_sig)?;

        let compressed = compress_tree(scratch.path(), self.zstd_level, algo)?;

        std::fs::create_dir_all(bundle_store_dir)?;
        let extension = match algo {
            ransomeye_types::bundle::Compression::Zstd => "tar.zst",
            ransomeye_types::bundle::Compression::Gzip => "tar.gz",
        };
        let bundle_path = bundle_store_dir.join(format!("{}.{}", incident_id, extension));
        write_atomic(&bundle_path, &compressed)?;

        info!(incident_id = %incident_id, bundle_path = %bundle_path.display(), "bundle materialized");
        Ok(BundleArtifact {
            bundle_path,
            manifest,
            manifest_sig,
        })
    }

    fn write_nodes(&self, scratch_dir: &Path, incident: &Incident) -> Result<Vec<ManifestEntry>, BundleError> {
        let mut sorted = incident.nodes.clone();
        sorted.sort_by_key(|n| n.entity_id);
        let mut buf = Vec::new();
        for node in &sorted {
            serde_json::to_writer(&mut buf, node)?;
            buf.push(b'\n');
        }
        self.write_chunked(scratch_dir, "entities", &buf)
    }

    fn write_edges(&self, scratch_dir: &Path, incident: &Incident) -> Result<Vec<ManifestEntry>, BundleError> {
        let mut sorted = incident.edges.clone();
        sorted.sort_by(|a, b| (a.src_id, a.dst_id).cmp(&(b.src_id, b.dst_id)));
        let mut buf = Vec::new();
        for edge in &sorted {
            serde_json::to_writer(&mut buf, edge)?;
            buf.push(b'\n');
        }
        self.write_chunked(scratch_dir, "edges", &buf)
    }

    async fn write_alerts(&self, scratch_dir: &Path, incident: &Incident) -> Result<Vec<ManifestEntry>, BundleError> {
        let mut sorted = incident.alerts.clone();
        sorted.sort();
        let mut buf = Vec::new();
        for alert_id in &sorted {
            if let Some(alert) = self.alerts.get(*alert_id).await? {
                serde_json::to_writer(&mut buf, &alert)?;
                buf.push(b'\n');
            }
        }
        self.write_chunked(scratch_dir, "alerts", &buf)
    }

    fn write_chunked(&self, scratch_dir: &Path, name: &str, bytes: &[u8]) -> Result<Vec<ManifestEntry>, BundleError> {
        let mut writer = ChunkedWriter::new(scratch_dir, name, self.chunk_size)?;
        writer.write_artifact(bytes)?;
        writer.finish()
    }
}

fn scope_to_bundle_scope(incident_id: IncidentId, scope: &BundleScopeRequest) -> BundleScope {
    match scope {
        BundleScopeRequest::Full => BundleScope {
            incident_id,
            since: None,
            entities: None,
        },
        BundleScopeRequest::SinceTimestamp(ts) => BundleScope {
            incident_id,
            since: Some(*ts),
            entities: None,
        },
        BundleScopeRequest::Entities(entities) => BundleScope {
            incident_id,
            since: None,
            entities: Some(entities.clone()),
        },
    }
}
