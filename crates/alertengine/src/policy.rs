//! Policy predicates: a tagged union of rule variants rather than dynamic
//! dispatch over stringly-typed policy/rule objects. A policy bundle is a
//! JSON document; it is parsed and validated once per hot-reload cycle
//! and compiled into `PolicySet`, never re-parsed per event.

use ransomeye_types::{EntityType, EventKind, Severity};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RulePredicate {
    /// Matches if any extracted entity has this type.
    EntityPresence { entity_type: EntityType },
    /// Matches if `payload[field]` equals `value` (string comparison).
    PayloadField { field: String, value: String },
    /// Matches if `payload[field]` exists at all.
    PayloadFieldExists { field: String },
    All { rules: Vec<RulePredicate> },
    Any { rules: Vec<RulePredicate> },
}

impl RulePredicate {
    pub fn matches(&self, kind: EventKind, payload: &serde_json::Value, entity_types: &[EntityType]) -> bool {
        match self {
            RulePredicate::EntityPresence { entity_type } => entity_types.contains(entity_type),
            RulePredicate::PayloadField { field, value } => {
                payload.get(field).and_then(|v| v.as_str()).map(|s| s == value).unwrap_or(false)
            }
            RulePredicate::PayloadFieldExists { field } => payload.get(field).is_some(),
            RulePredicate::All { rules } => rules.iter().all(|r| r.matches(kind, payload, entity_types)),
            RulePredicate::Any { rules } => rules.iter().any(|r| r.matches(kind, payload, entity_types)),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyRule {
    pub policy_id: String,
    pub predicate: RulePredicate,
    pub severity: Severity,
    /// Suppression window in seconds for alerts sharing this policy's
    /// dedup bucket: `(policy, sorted entities, bucket)`, with bucket
    /// size itself a policy-level field.
    pub dedup_window_secs: i64,
    /// Coarsens the time dimension of the dedup key; `0` disables
    /// bucketing (dedup keyed only on policy + entities).
    pub dedup_bucket_secs: i64,
}

impl PolicyRule {
    pub fn dedup_bucket(&self, occurred_at_ms: i64) -> i64 {
        if self.dedup_bucket_secs <= 0 {
            0
        } else {
            (occurred_at_ms / 1000) / self.dedup_bucket_secs
        }
    }
}

/// An ordered, compiled set of rules. First match wins; ordering is
/// explicit and preserved from the source document.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct PolicySet {
    pub rules: Vec<PolicyRule>,
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("policy document is not valid json: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("policy set is empty")]
    Empty,
    #[error("duplicate policy_id: {0}")]
    DuplicateId(String),
}

impl PolicySet {
    pub fn parse_and_validate(bytes: &[u8]) -> Result<Self, PolicyError> {
        let set: PolicySet = serde_json::from_slice(bytes)?;
        if set.rules.is_empty() {
            return Err(PolicyError::Empty);
        }
        let mut seen = std::collections::HashSet::new();
        for rule in &set.rules {
            if !seen.insert(rule.policy_id.clone()) {
                return Err(PolicyError::DuplicateId(rule.policy_id.clone()));
            }
        }
        Ok(set)
    }

    pub fn first_match(&self, kind: EventKind, payload: &serde_json::Value, entity_types: &[EntityType]) -> Option<&PolicyRule> {
        self.rules.iter().find(|rule| rule.predicate.matches(kind, payload, entity_types))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_matching_rule_wins() {
        let set = PolicySet {
            rules: vec![
                PolicyRule {
                    policy_id: "p1".to_string(),
                    predicate: RulePredicate::EntityPresence { entity_type: EntityType::Host },
                    severity: Severity::Low,
                    dedup_window_secs: 60,
                    dedup_bucket_secs: 0,
                },
                PolicyRule {
                    policy_id: "p2".to_string(),
                    predicate: RulePredicate::EntityPresence { entity_type: EntityType::Host },
                    severity: Severity::Critical,
                    dedup_window_secs: 60,
                    dedup_bucket_secs: 0,
                },
            ],
        };
        let matched = set.first_match(EventKind::Process, &serde_json::json!({}), &[EntityType::Host]).unwrap();
        assert_eq!(matched.policy_id, "p1");
    }

    #[test]
    fn rejects_empty_or_duplicate_policy_ids() {
        assert!(PolicySet::parse_and_validate(br#"{"rules":[]}"#).is_err());
        let dup = br#"{"rules":[
            {"policy_id":"p1","predicate":{"op":"payload_field_exists","field":"x"},"severity":"low","dedup_window_secs":1,"dedup_bucket_secs":0},
            {"policy_id":"p1","predicate":{"op":"payload_field_exists","field":"y"},"severity":"low","dedup_window_secs":1,"dedup_bucket_secs":0}
        ]}"#;
        assert!(PolicySet::parse_and_validate(dup).is_err());
    }
}
