//! Agent-local event buffer: `pending/`, `inflight/`, `archived/` under
//! one root directory. Files only ever move between them by atomic
//! rename, so a crash mid-upload leaves every event in exactly one of the
//! three states, never duplicated and never lost.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use prometheus::IntCounter;
use ransomeye_integrity::{canonical_bytes_of, rename_atomic, write_atomic};
use ransomeye_types::buffer::{BufferStage, BufferStats};
use ransomeye_types::{Event, EventId};
use tracing::warn;

use crate::error::TransportError;

static EVENTS_DROPPED: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new("ransomeye_agent_buffer_dropped_total", "Events dropped from the agent buffer due to quota overflow").unwrap();
    ransomeye_telemetry::REGISTRY.register(Box::new(counter.clone())).ok();
    counter
});

fn register_events_dropped() -> &'static IntCounter {
    Lazy::force(&EVENTS_DROPPED)
}

pub struct AgentBuffer {
    root: PathBuf,
    max_bytes: u64,
}

impl AgentBuffer {
    /// Creates `pending/`, `inflight/`, `archived/`, and `quarantine/`
    /// under `root` if they do not already exist. `quarantine/` holds
    /// events a receipt check or a non-retriable server rejection flagged
    /// for operator inspection, separate from the three upload-cycle
    /// stages since events there are no longer part of that cycle.
    pub fn open(root: &Path, max_bytes: u64) -> Result<Self, TransportError> {
        for stage in [BufferStage::Pending, BufferStage::Inflight, BufferStage::Archived] {
            std::fs::create_dir_all(root.join(stage.dir_name()))?;
        }
        std::fs::create_dir_all(root.join("quarantine"))?;
        register_events_dropped();
        Ok(AgentBuffer {
            root: root.to_path_buf(),
            max_bytes,
        })
    }

    fn dir(&self, stage: BufferStage) -> PathBuf {
        self.root.join(stage.dir_name())
    }

    /// `record(event)`: canonicalizes and atomically writes `event` into
    /// `pending/<event_id>.json`. If the buffer is over `max_bytes`
    /// afterward, the oldest pending file (by filename, which sorts by
    /// the ULID's encoded timestamp) is dropped and counted.
    pub fn record(&self, event: &Event) -> Result<(), TransportError> {
        let bytes = canonical_bytes_of(event)?;
        let path = self.dir(BufferStage::Pending).join(format!("{}.json", event.event_id));
        write_atomic(&path, &bytes)?;

        while self.pending_bytes()? > self.max_bytes {
            if !self.drop_oldest_pending()? {
                break;
            }
        }
        Ok(())
    }

    fn drop_oldest_pending(&self) -> Result<bool, TransportError> {
        let mut entries = self.list_dir(BufferStage::Pending)?;
        entries.sort();
        let Some(oldest) = entries.into_iter().next() else {
            return Ok(false);
        };
        std::fs::remove_file(&oldest)?;
        EVENTS_DROPPED.inc();
        warn!(path = %oldest.display(), "agent buffer over quota, dropped oldest pending event");
        Ok(true)
    }

    fn list_dir(&self, stage: BufferStage) -> Result<Vec<PathBuf>, TransportError> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir(self.dir(stage))? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                out.push(entry.path());
            }
        }
        Ok(out)
    }

    fn pending_bytes(&self) -> Result<u64, TransportError> {
        let mut total = 0u64;
        for path in self.list_dir(BufferStage::Pending)? {
            total += std::fs::metadata(&path)?.len();
        }
        Ok(total)
    }

    /// Pending files in ascending filename (ULID) order, i.e. oldest
    /// `event_id` first — the order `drain()` uploads in.
    pub fn pending_in_order(&self) -> Result<Vec<PathBuf>, TransportError> {
        let mut entries = self.list_dir(BufferStage::Pending)?;
        entries.sort();
        Ok(entries)
    }

    pub fn mark_inflight(&self, event_id: EventId) -> Result<PathBuf, TransportError> {
        let from = self.dir(BufferStage::Pending).join(format!("{}.json", event_id));
        let to = self.dir(BufferStage::Inflight).join(format!("{}.json", event_id));
        if !from.exists() {
            return Err(TransportError::NotBuffered(event_id.to_string()));
        }
        rename_atomic(&from, &to)?;
        Ok(to)
    }

    /// A retriable failure returns the event to `pending` unchanged, to
    /// be retried after backoff.
    pub fn requeue(&self, event_id: EventId) -> Result<(), TransportError> {
        let from = self.dir(BufferStage::Inflight).join(format!("{}.json", event_id));
        let to = self.dir(BufferStage::Pending).join(format!("{}.json", event_id));
        rename_atomic(&from, &to)?;
        Ok(())
    }

    /// Content-addressed archival on confirmed delivery.
    pub fn mark_archived(&self, event_id: EventId, body_sha256: &str) -> Result<(), TransportError> {
        let from = self.dir(BufferStage::Inflight).join(format!("{}.json", event_id));
        let to = self.dir(BufferStage::Archived).join(format!("{}.json", body_sha256));
        rename_atomic(&from, &to)?;
        Ok(())
    }

    /// Receipt mismatch or a non-409 4xx: quarantined for operator
    /// inspection rather than retried or silently dropped.
    pub fn quarantine(&self, event_id: EventId) -> Result<(), TransportError> {
        let from = self.dir(BufferStage::Inflight).join(format!("{}.json", event_id));
        let to = self.root.join("quarantine").join(format!("{}.json", event_id));
        rename_atomic(&from, &to)?;
        Ok(())
    }

    pub fn stats(&self) -> Result<BufferStats, TransportError> {
        let pending = self.list_dir(BufferStage::Pending)?;
        let mut pending_bytes = 0u64;
        for path in &pending {
            pending_bytes += std::fs::metadata(path)?.len();
        }
        Ok(BufferStats {
            pending_bytes,
            pending_count: pending.len() as u64,
            dropped_total: EVENTS_DROPPED.get(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ransomeye_types::EventKind;
    use tempfile::tempdir;

    fn sample_event() -> Event {
        Event {
            event_id: EventId::new(),
            agent_id: "agent-1".to_string(),
            tenant_id: "tenant-1".to_string(),
            occurred_at: 1,
            received_at: 1,
            kind: EventKind::Process,
            payload: serde_json::json!({"pid": 1234}),
            fingerprint: "f".repeat(64),
        }
    }

    #[test]
    fn record_then_drain_cycle_moves_the_file_through_every_stage() {
        let dir = tempdir().unwrap();
        let buffer = AgentBuffer::open(dir.path(), 1_000_000).unwrap();
        let event = sample_event();
        buffer.record(&event).unwrap();

        let pending = buffer.pending_in_order().unwrap();
        assert_eq!(pending.len(), 1);

        buffer.mark_inflight(event.event_id).unwrap();
        assert!(buffer.pending_in_order().unwrap().is_empty());

        buffer.mark_archived(event.event_id, "deadbeef").unwrap();
        assert!(dir.path().join("archived").join("deadbeef.json").exists());
    }

    #[test]
    fn requeue_returns_an_inflight_event_to_pending() {
        let dir = tempdir().unwrap();
        let buffer = AgentBuffer::open(dir.path(), 1_000_000).unwrap();
        let event = sample_event();
        buffer.record(&event).unwrap();
        buffer.mark_inflight(event.event_id).unwrap();
        buffer.requeue(event.event_id).unwrap();
        assert_eq!(buffer.pending_in_order().unwrap().len(), 1);
    }

    #[test]
    fn quarantine_moves_the_event_out_of_the_upload_cycle() {
        let dir = tempdir().unwrap();
        let buffer = AgentBuffer::open(dir.path(), 1_000_000).unwrap();
        let event = sample_event();
        buffer.record(&event).unwrap();
        buffer.mark_inflight(event.event_id).unwrap();
        buffer.quarantine(event.event_id).unwrap();
        assert!(dir.path().join("quarantine").join(format!("{}.json", event.event_id)).exists());
    }

    #[test]
    fn over_quota_drops_the_oldest_pending_event() {
        let dir = tempdir().unwrap();
        let buffer = AgentBuffer::open(dir.path(), 1).unwrap();
        let first = sample_event();
        buffer.record(&first).unwrap();
        let second = sample_event();
        buffer.record(&second).unwrap();

        let pending = buffer.pending_in_order().unwrap();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].to_string_lossy().contains(&second.event_id.to_string()));
    }
}
