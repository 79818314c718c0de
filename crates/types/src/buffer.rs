use serde::{Deserialize, Serialize};

/// Agent-local buffer sub-paths. Events move between them by atomic
/// rename only; no sub-path is ever written to by more than one worker.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferStage {
    Pending,
    Inflight,
    Archived,
}

impl BufferStage {
    pub fn dir_name(self) -> &'static str {
        match self {
            BufferStage::Pending => "pending",
            BufferStage::Inflight => "inflight",
            BufferStage::Archived => "archived",
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BufferStats {
    pub pending_bytes: u64,
    pub pending_count: u64,
    pub dropped_total: u64,
}
