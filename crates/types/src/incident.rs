use serde::{Deserialize, Serialize};

use crate::entity::EntityType;
use crate::ids::{AlertId, EntityId, IncidentId};

/// Canonicalized so `src_id < dst_id` always holds; see
/// `Edge::canonicalize` in the graph crate, which is the only place an
/// `Edge` should be constructed.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct Edge {
    pub src_id: EntityId,
    pub dst_id: EntityId,
    pub relation: String,
    pub first_seen: i64,
    pub last_seen: i64,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct IncidentNode {
    pub entity_id: EntityId,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub value: String,
    pub first_seen: i64,
    pub last_seen: i64,
}

/// A connected component of entities linked by co-occurring alerts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Incident {
    pub incident_id: IncidentId,
    pub nodes: Vec<IncidentNode>,
    pub edges: Vec<Edge>,
    pub alerts: Vec<AlertId>,
    /// `[0, 1]`, produced by the external scorer; `0` if none is wired up.
    pub score: f64,
    /// Guards against a stale scorer response overwriting a newer score.
    pub scored_at: Option<i64>,
    pub first_seen: i64,
    pub last_seen: i64,
    pub last_mutated: i64,
    /// `Some(survivor)` once this incident has been absorbed by a merge;
    /// an absorbed incident is frozen and read-only.
    pub merged_into: Option<IncidentId>,
}

impl Incident {
    pub fn is_frozen(&self) -> bool {
        self.merged_into.is_some()
    }

    pub fn new(incident_id: IncidentId, now_ms: i64) -> Self {
        Incident {
            incident_id,
            nodes: Vec::new(),
            edges: Vec::new(),
            alerts: Vec::new(),
            score: 0.0,
            scored_at: None,
            first_seen: now_ms,
            last_seen: now_ms,
            last_mutated: now_ms,
            merged_into: None,
        }
    }

    /// A new score only applies if it is not stale.
    pub fn apply_score(&mut self, score: f64, scored_at: i64) {
        if self.scored_at.map(|prev| scored_at > prev).unwrap_or(true) {
            self.score = score;
            self.scored_at = Some(scored_at);
        }
    }
}

/// Fixed feature vector handed to the external scorer. Scorer internals
/// are never inspected; absence of a scorer degrades to `score = 0`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IncidentFeatures {
    pub host_count: u32,
    pub user_count: u32,
    pub alert_count_by_severity: [u32; 5],
    pub span_seconds: i64,
    pub entity_type_distribution: Vec<(String, u32)>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoreResult {
    pub score: f64,
    pub explanation_blob: serde_json::Value,
}
