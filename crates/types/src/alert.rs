use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::ids::{AlertId, EventId};

#[derive(Copy, Clone, Eq, PartialEq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Open,
    Acknowledged,
    Resolved,
    FalsePositive,
}

impl AlertStatus {
    /// Forward transitions only; a resolved or false-positive alert
    /// reopening to `open` is handled as a separate, audited path by the
    /// caller rather than through this table.
    pub fn can_transition_to(self, next: AlertStatus) -> bool {
        use AlertStatus::*;
        matches!(
            (self, next),
            (Open, Acknowledged)
                | (Open, Resolved)
                | (Open, FalsePositive)
                | (Acknowledged, Resolved)
                | (Acknowledged, FalsePositive)
        )
    }
}

/// Derived by the alert engine from one or more events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Alert {
    pub alert_id: AlertId,
    pub policy_id: String,
    pub severity: Severity,
    pub source_events: BTreeSet<EventId>,
    pub entities: Vec<Entity>,
    pub status: AlertStatus,
    pub dedup_key: String,
    pub created_at: i64,
    pub updated_at: i64,
    /// Running count of suppressed duplicate occurrences within the
    /// dedup window; incremented instead of emitting a new alert.
    pub hit_count: u64,
}

impl Alert {
    pub fn is_source_events_valid(&self) -> bool {
        !self.source_events.is_empty()
    }
}
