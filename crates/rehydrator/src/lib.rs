//! Fail-closed bundle verification followed by idempotent
//! reconciliation into the correlation graph.

mod error;
mod reconcile;
mod verify;

pub use error::RehydrateError;
pub use reconcile::ReconcileOutcome;
pub use verify::{read_logical_stream, verify_bundle, VerifiedBundle};

use libsql::Connection;
use ransomeye_integrity::VerifyingIdentity;
use tracing::instrument;

/// Verifies, then reconciles. Any verification failure returns before
/// `connection` is touched at all.
#[instrument(skip(connection, archive_bytes, verifier))]
pub async fn rehydrate(connection: &Connection, archive_bytes: &[u8], verifier: &VerifyingIdentity) -> Result<ReconcileOutcome, RehydrateError> {
    let bundle = verify_bundle(archive_bytes, verifier)?;
    reconcile::reconcile(connection, &bundle).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use ransomeye_alertengine::AlertRepository;
    use ransomeye_bundler::BundleBuilder;
    use ransomeye_graph::GraphRepository;
    use ransomeye_integrity::SigningIdentity;
    use ransomeye_storage::Db;
    use ransomeye_types::alert::{Alert, AlertStatus, Severity};
    use ransomeye_types::bundle::BundleScopeRequest;
    use ransomeye_types::entity::{Entity, EntityType};
    use ransomeye_types::{AlertId, EventId};
    use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
    use rsa::RsaPrivateKey;
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    fn keypair() -> (SigningIdentity, VerifyingIdentity) {
        let mut rng = rand::rngs::OsRng;
        let key = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let private_pem = key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
        let public_pem = rsa::RsaPublicKey::from(&key).to_public_key_pem(LineEnding::LF).unwrap();
        (SigningIdentity::from_pkcs8_pem(&private_pem).unwrap(), VerifyingIdentity::from_public_pkcs8_pem(&public_pem).unwrap())
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
    async fn round_trips_an_incident_through_a_bundle() {
        let source_db = Db::connect(":memory:", None).await.unwrap();
        let graph = GraphRepository::new(source_db.connection().unwrap());
        let alerts = AlertRepository::new(source_db.connection().unwrap());

        let host = Entity::new(EntityType::Host, "workstation-1".to_string());
        let ip = Entity::new(EntityType::Ip, "10.0.0.5".to_string());
        let alert = alert_with(vec![host, ip]);
        alerts.insert(&alert).await.unwrap();
        let incident_id = graph.ingest_alert(&alert, 1_000).await.unwrap();

        let (signer, verifier) = keypair();
        let builder = BundleBuilder::new(&graph, &alerts, &signer, "node-a", 4096, 3);
        let store = tempdir().unwrap();
        let artifact = builder.build(incident_id, BundleScopeRequest::Full, store.path()).await.unwrap();
        let archive_bytes = std::fs::read(&artifact.bundle_path).unwrap();

        let target_db = Db::connect(":memory:", None).await.unwrap();
        let target_connection = target_db.connection().unwrap();

        let outcome = rehydrate(&target_connection, &archive_bytes, &verifier).await.unwrap();
        assert_eq!(outcome.incident_id, incident_id);
        assert!(!outcome.already_applied);

        let target_graph = GraphRepository::new(target_db.connection().unwrap());
        let rehydrated = target_graph.get_incident(incident_id).await.unwrap().unwrap();
        assert_eq!(rehydrated.nodes.len(), 2);
        assert_eq!(rehydrated.edges.len(), 1);
        assert_eq!(rehydrated.alerts.len(), 1);
    }

    #[tokio::test]
    async fn rehydrating_the_same_bundle_twice_is_a_no_op_the_second_time() {
        let source_db = Db::connect(":memory:", None).await.unwrap();
        let graph = GraphRepository::new(source_db.connection().unwrap());
        let alerts = AlertRepository::new(source_db.connection().unwrap());

        let host = Entity::new(EntityType::Host, "workstation-2".to_string());
        let alert = alert_with(vec![host]);
        alerts.insert(&alert).await.unwrap();
        let incident_id = graph.ingest_alert(&alert, 1_000).await.unwrap();

        let (signer, verifier) = keypair();
        let builder = BundleBuilder::new(&graph, &alerts, &signer, "node-a", 4096, 3);
        let store = tempdir().unwrap();
        let artifact = builder.build(incident_id, BundleScopeRequest::Full, store.path()).await.unwrap();
        let archive_bytes = std::fs::read(&artifact.bundle_path).unwrap();

        let target_db = Db::connect(":memory:", None).await.unwrap();
        let target_connection = target_db.connection().unwrap();

        let first = rehydrate(&target_connection, &archive_bytes, &verifier).await.unwrap();
        let second = rehydrate(&target_connection, &archive_bytes, &verifier).await.unwrap();
        assert!(!first.already_applied);
        assert!(second.already_applied);
    }

    #[tokio::test]
    async fn a_flipped_byte_in_the_archive_aborts_before_any_write() {
        let source_db = Db::connect(":memory:", None).await.unwrap();
        let graph = GraphRepository::new(source_db.connection().unwrap());
        let alerts = AlertRepository::new(source_db.connection().unwrap());

        let host = Entity::new(EntityType::Host, "workstation-3".to_string());
        let alert = alert_with(vec![host]);
        alerts.insert(&alert).await.unwrap();
        let incident_id = graph.ingest_alert(&alert, 1_000).await.unwrap();

        let (signer, verifier) = keypair();
        let builder = BundleBuilder::new(&graph, &alerts, &signer, "node-a", 4096, 3);
        let store = tempdir().unwrap();
        let artifact = builder.build(incident_id, BundleScopeRequest::Full, store.path()).await.unwrap();
        let mut archive_bytes = std::fs::read(&artifact.bundle_path).unwrap();
        let last = archive_bytes.len() - 1;
        archive_bytes[last] ^= 0xff;

        let target_db = Db::connect(":memory:", None).await.unwrap();
        let target_connection = target_db.connection().unwrap();

        let result = rehydrate(&target_connection, &archive_bytes, &verifier).await;
        assert!(result.is_err());

        let target_graph = GraphRepository::new(target_connection);
        assert!(target_graph.get_incident(incident_id).await.unwrap().is_none());
    }
}
