//! Streaming, single-pass bundle builder. Reads an incident out of the
//! correlation graph, writes its entities/edges/alerts as chunked,
//! incrementally-hashed artifacts, signs the resulting manifest, and
//! archives the scratch tree into a compressed bundle file.

mod builder;
mod compression;
mod error;
mod repository;
mod writer;

pub use builder::{BundleArtifact, BundleBuilder};
pub use compression::compress_tree;
pub use error::BundleError;
pub use repository::{BundleRecord, BundleRepository};
pub use writer::{write_whole_file, ChunkedWriter};

#[cfg(test)]
mod tests {
    use super::*;
    use ransomeye_alertengine::AlertRepository;
    use ransomeye_graph::GraphRepository;
    use ransomeye_integrity::SigningIdentity;
    use ransomeye_storage::Db;
    use ransomeye_types::alert::{Alert, AlertStatus, Severity};
    use ransomeye_types::bundle::BundleScopeRequest;
    use ransomeye_types::entity::{Entity, EntityType};
    use ransomeye_types::{AlertId, EventId};
    use rsa::pkcs8::{EncodePrivateKey, LineEnding};
    use rsa::RsaPrivateKey;
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    fn signer() -> SigningIdentity {
        let mut rng = rand::rngs::OsRng;
        let key = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let pem = key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
        SigningIdentity::from_pkcs8_pem(&pem).unwrap()
    }

    async fn seeded_graph() -> (Db, GraphRepository, AlertRepository) {
        let db = Db::connect(":memory:", None).await.unwrap();
        let graph = GraphRepository::new(db.connection().unwrap());
        let alerts = AlertRepository::new(db.connection().unwrap());
        (db, graph, alerts)
    }

    fn alert_with(entities: Vec<Entity>) -> Alert {
        let mut source_events = BTreeSet::new();
        source_events.insert(EventId::new());
        Alert {
            alert_id: AlertId::new(),
            policy_id: "policy-1".to_string(),
            dedup_key: format!("dk-{}", AlertId::new()),
            severity: Severity::High,
            status: AlertStatus::Open,
            source_events,
            entities,
            hit_count: 1,
            created_at: 1,
            updated_at: 1,
        }
    }

    #[tokio::test]
    async fn builds_a_signed_bundle_with_matching_merkle_root() {
        let (_db, graph, alerts) = seeded_graph().await;
        let host = Entity::new(EntityType::Host, "workstation-1".to_string());
        let ip = Entity::new(EntityType::Ip, "10.0.0.5".to_string());
        let alert = alert_with(vec![host, ip]);
        alerts.insert(&alert).await.unwrap();
        let incident_id = graph.ingest_alert(&alert, 1_000).await.unwrap();

        let signer = signer();
        let builder = BundleBuilder::new(&graph, &alerts, &signer, "node-a", 4096, 3);
        let store = tempdir().unwrap();

        let artifact = builder.build(incident_id, BundleScopeRequest::Full, store.path()).await.unwrap();

        assert!(artifact.bundle_path.exists());
        assert_eq!(artifact.manifest.merkle_root, ransomeye_integrity::merkle_root(&artifact.manifest.entries));
        assert!(!artifact.manifest.entries.is_empty());

        // The signed manifest's declared algorithm must match what the
        // archive was actually compressed with.
        let archive_bytes = std::fs::read(&artifact.bundle_path).unwrap();
        match artifact.manifest.algorithms.compression {
            ransomeye_types::bundle::Compression::Zstd => {
                assert!(zstd::decode_all(archive_bytes.as_slice()).is_ok());
                assert!(artifact.bundle_path.extension().unwrap() == "zst");
            }
            ransomeye_types::bundle::Compression::Gzip => {
                let mut decoder = flate2::read::GzDecoder::new(archive_bytes.as_slice());
                let mut out = Vec::new();
                use std::io::Read;
                assert!(decoder.read_to_end(&mut out).is_ok());
                assert!(artifact.bundle_path.extension().unwrap() == "gz");
            }
        }
    }

    #[tokio::test]
    async fn two_builds_of_the_same_incident_share_a_merkle_root_but_differ_in_signature() {
        let (_db, graph, alerts) = seeded_graph().await;
        let host = Entity::new(EntityType::Host, "workstation-2".to_string());
        let alert = alert_with(vec![host]);
        alerts.insert(&alert).await.unwrap();
        let incident_id = graph.ingest_alert(&alert, 1_000).await.unwrap();

        let signer = signer();
        let builder = BundleBuilder::new(&graph, &alerts, &signer, "node-a", 4096, 3);
        let store = tempdir().unwrap();

        let first = builder.build(incident_id, BundleScopeRequest::Full, store.path()).await.unwrap();
        let second = builder.build(incident_id, BundleScopeRequest::Full, store.path()).await.unwrap();

        assert_eq!(first.manifest.merkle_root, second.manifest.merkle_root);
        assert_ne!(first.manifest_sig, second.manifest_sig);
    }
}
