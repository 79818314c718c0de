use std::sync::Arc;

use arc_swap::ArcSwap;
use ransomeye_integrity::{canonical_bytes, sha256_hex};
use ransomeye_types::alert::Alert;
use ransomeye_types::entity::Entity;
use ransomeye_types::{AlertId, Event};
use tracing::{info, instrument, warn};

use crate::error::AlertEngineError;
use crate::extract::extract_entities;
use crate::policy::{PolicyRule, PolicySet};
use crate::repository::AlertRepository;

/// Read-mostly, atomically swapped policy pointer. Readers take a
/// snapshot at the start of event evaluation so a single event is never
/// evaluated against a mix of two policy generations.
#[derive(Clone)]
pub struct PolicyHandle(Arc<ArcSwap<PolicySet>>);

impl PolicyHandle {
    pub fn new(initial: PolicySet) -> Self {
        PolicyHandle(Arc::new(ArcSwap::new(Arc::new(initial))))
    }

    pub fn snapshot(&self) -> Arc<PolicySet> {
        self.0.load_full()
    }

    /// Swaps in a new policy set only if it parses and validates; on
    /// failure the old set stays active.
    pub fn try_reload(&self, bytes: &[u8]) -> Result<(), crate::policy::PolicyError> {
        let parsed = PolicySet::parse_and_validate(bytes)?;
        self.0.store(Arc::new(parsed));
        Ok(())
    }
}

/// Default fingerprint dedup window when a deployment doesn't override it.
pub const DEFAULT_FINGERPRINT_DEDUP_WINDOW_MS: i64 = 60_000;

pub struct AlertEngine {
    policy: PolicyHandle,
    repository: AlertRepository,
    fingerprint_window_ms: i64,
}

/// Derived from an admitted event: what the ingest handler calling this
/// should do with it.
pub enum AdmissionOutcome {
    NewAlert(Alert),
    DuplicateSuppressed { alert_id: AlertId, hit_count: u64 },
    DroppedNoEntities,
}

impl AlertEngine {
    pub fn new(policy: PolicyHandle, repository: AlertRepository, fingerprint_window_ms: i64) -> Self {
        AlertEngine { policy, repository, fingerprint_window_ms }
    }

    /// The admission pipeline: normalize -> policy match -> dedup -> emit.
    /// Returns `Ok` even when the event is dropped or deduplicated; those
    /// are expected outcomes, not errors.
    #[instrument(skip(self, event))]
    pub async fn admit(&self, event: &Event, now_ms: i64) -> Result<AdmissionOutcome, AlertEngineError> {
        match self
            .repository
            .admit_fingerprint(&event.agent_id, &event.fingerprint, event.event_id, now_ms, self.fingerprint_window_ms)
            .await?
        {
            Ok(Err(existing_event_id)) => {
                return Err(AlertEngineError::DuplicateFingerprint(existing_event_id.to_string()));
            }
            _ => {}
        }

        let entities = extract_entities(&event.payload);
        if entities.is_empty() && !event.kind.permits_empty_entities() {
            return Ok(AdmissionOutcome::DroppedNoEntities);
        }

        let snapshot = self.policy.snapshot();
        let entity_types: Vec<_> = entities.iter().map(|e| e.kind).collect();
        let Some(rule) = snapshot.first_match(event.kind, &event.payload, &entity_types) else {
            return Err(AlertEngineError::NoPolicyMatch);
        };

        let dedup_key = compute_dedup_key(rule, &entities, event.occurred_at);
        let window_start = now_ms - rule.dedup_window_secs * 1000;

        if let Some(existing) = self.repository.find_active_by_dedup_key(&dedup_key, window_start).await? {
            self.repository.increment_hit_count(existing.alert_id, now_ms).await?;
            info!(alert_id = %existing.alert_id, "duplicate suppressed by dedup window");
            return Ok(AdmissionOutcome::DuplicateSuppressed {
                alert_id: existing.alert_id,
                hit_count: existing.hit_count + 1,
            });
        }

        let mut source_events = std::collections::BTreeSet::new();
        source_events.insert(event.event_id);

        let alert = Alert {
            alert_id: AlertId::new(),
            policy_id: rule.policy_id.clone(),
            severity: rule.severity,
            source_events,
            entities,
            status: ransomeye_types::alert::AlertStatus::Open,
            dedup_key,
            created_at: now_ms,
            updated_at: now_ms,
            hit_count: 1,
        };
        self.repository.insert(&alert).await?;
        warn!(alert_id = %alert.alert_id, policy_id = %alert.policy_id, "alert emitted");
        Ok(AdmissionOutcome::NewAlert(alert))
    }
}

/// `dedup_key = sha256(canonical(policy_id, sorted entities, bucket))`.
/// Entities are sorted by id first so the key is stable under permutation
/// of the extracted entity set.
fn compute_dedup_key(rule: &PolicyRule, entities: &[Entity], occurred_at_ms: i64) -> String {
    let mut sorted: Vec<&Entity> = entities.iter().collect();
    sorted.sort_by_key(|e| e.id);
    let bucket = rule.dedup_bucket(occurred_at_ms);
    let subject = serde_json::json!({
        "policy_id": rule.policy_id,
        "entities": sorted.iter().map(|e| e.id.to_hex()).collect::<Vec<_>>(),
        "bucket": bucket,
    });
    let bytes = canonical_bytes(&subject).unwrap_or_default();
    sha256_hex(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ransomeye_storage::Db;
    use ransomeye_types::{EventKind, EventId};

    async fn test_engine() -> AlertEngine {
        let db = Db::connect(":memory:", None).await.unwrap();
        let policy = PolicySet {
            rules: vec![PolicyRule {
                policy_id: "host-seen".to_string(),
                predicate: crate::policy::RulePredicate::EntityPresence { entity_type: ransomeye_types::EntityType::Host },
                severity: ransomeye_types::Severity::Medium,
                dedup_window_secs: 300,
                dedup_bucket_secs: 0,
            }],
        };
        AlertEngine::new(PolicyHandle::new(policy), AlertRepository::new(db.connection().unwrap()), DEFAULT_FINGERPRINT_DEDUP_WINDOW_MS)
    }

    fn test_event(fingerprint: &str) -> Event {
        Event {
            event_id: EventId::new(),
            agent_id: "agent-1".to_string(),
            tenant_id: "tenant-1".to_string(),
            occurred_at: 1_000,
            received_at: 1_000,
            kind: EventKind::Process,
            payload: serde_json::json!({"host": "h1"}),
            fingerprint: fingerprint.to_string(),
        }
    }

    #[tokio::test]
    async fn second_event_with_same_fingerprint_is_rejected() {
        let engine = test_engine().await;
        let event = test_event("fp-1");
        engine.admit(&event, 1_000).await.unwrap();

        let mut replay = test_event("fp-1");
        replay.event_id = ransomeye_types::EventId::new();
        let err = engine.admit(&replay, 1_010).await.unwrap_err();
        assert!(matches!(err, AlertEngineError::DuplicateFingerprint(_)));
    }

    #[tokio::test]
    async fn same_fingerprint_is_readmitted_once_the_dedup_window_elapses() {
        let engine = test_engine().await;
        let event = test_event("fp-1");
        engine.admit(&event, 1_000).await.unwrap();

        let mut replay = test_event("fp-1");
        replay.event_id = ransomeye_types::EventId::new();
        let after_window = 1_000 + DEFAULT_FINGERPRINT_DEDUP_WINDOW_MS + 1;
        // Once the fingerprint window elapses the replay is admitted past
        // the fingerprint check (it may still collapse into the existing
        // alert via the separate entity-based dedup window).
        assert!(engine.admit(&replay, after_window).await.is_ok());
    }

    #[tokio::test]
    async fn distinct_events_same_entities_dedup_into_one_alert() {
        let engine = test_engine().await;
        let first = engine.admit(&test_event("fp-a"), 1_000).await.unwrap();
        assert!(matches!(first, AdmissionOutcome::NewAlert(_)));

        let second = engine.admit(&test_event("fp-b"), 1_050).await.unwrap();
        assert!(matches!(second, AdmissionOutcome::DuplicateSuppressed { .. }));
    }
}
