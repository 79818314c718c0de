use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Append-only record of a monotonicity exception: an alert reopen, an
/// operator-initiated job resurrection, or an update rollback. Never
/// mutated after insert.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Ulid,
    pub actor: String,
    pub action: String,
    pub subject_id: String,
    pub reason: String,
    pub occurred_at: i64,
}

impl AuditRecord {
    pub fn new(actor: impl Into<String>, action: impl Into<String>, subject_id: impl Into<String>, reason: impl Into<String>, occurred_at: i64) -> Self {
        AuditRecord {
            id: Ulid::new(),
            actor: actor.into(),
            action: action.into(),
            subject_id: subject_id.into(),
            reason: reason.into(),
            occurred_at,
        }
    }
}
