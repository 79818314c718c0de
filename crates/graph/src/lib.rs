pub mod error;
pub mod repository;

pub use error::GraphError;
pub use repository::{canonicalize_edge, GraphRepository};

#[cfg(test)]
mod tests {
    use super::*;
    use ransomeye_storage::Db;
    use ransomeye_types::alert::{Alert, AlertStatus};
    use ransomeye_types::entity::{Entity, EntityType};
    use ransomeye_types::{AlertId, EventId, Severity};

    fn alert_with(entities: Vec<Entity>, now_ms: i64) -> Alert {
        let mut source_events = std::collections::BTreeSet::new();
        source_events.insert(EventId::new());
        Alert {
            alert_id: AlertId::new(),
            policy_id: "p".to_string(),
            severity: Severity::Medium,
            source_events,
            entities,
            status: AlertStatus::Open,
            dedup_key: "k".to_string(),
            created_at: now_ms,
            updated_at: now_ms,
            hit_count: 1,
        }
    }

    /// Three alerts whose entity sets overlap pairwise should end up in
    /// a single incident with 4 nodes.
    #[tokio::test]
    async fn three_overlapping_alerts_merge_into_one_incident() {
        let db = Db::connect(":memory:", None).await.unwrap();
        let repo = GraphRepository::new(db.connection().unwrap());

        let host1 = Entity::new(EntityType::Host, "h1".to_string());
        let host2 = Entity::new(EntityType::Host, "h2".to_string());
        let ip = Entity::new(EntityType::Ip, "10.0.0.1".to_string());
        let hash = Entity::new(EntityType::FileHash, "sha256:abcd".to_string());

        let id_a = repo.ingest_alert(&alert_with(vec![host1.clone(), ip.clone()], 1), 1).await.unwrap();
        let id_b = repo.ingest_alert(&alert_with(vec![ip.clone(), hash.clone()], 2), 2).await.unwrap();
        let id_c = repo.ingest_alert(&alert_with(vec![host2.clone(), hash.clone()], 3), 3).await.unwrap();

        assert_eq!(id_a, id_b);
        assert_eq!(id_b, id_c);

        let incident = repo.get_incident(id_c).await.unwrap().unwrap();
        assert_eq!(incident.nodes.len(), 4);
        assert_eq!(incident.alerts.len(), 3);
    }

    #[tokio::test]
    async fn stale_score_does_not_overwrite_newer_score() {
        let db = Db::connect(":memory:", None).await.unwrap();
        let repo = GraphRepository::new(db.connection().unwrap());
        let host = Entity::new(EntityType::Host, "h1".to_string());
        let id = repo.ingest_alert(&alert_with(vec![host], 1), 1).await.unwrap();

        repo.apply_score(id, 0.9, 100).await.unwrap();
        repo.apply_score(id, 0.1, 50).await.unwrap();

        let incident = repo.get_incident(id).await.unwrap().unwrap();
        assert_eq!(incident.score, 0.9);
    }
}
