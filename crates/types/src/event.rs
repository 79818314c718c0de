use serde::{Deserialize, Serialize};

use crate::ids::EventId;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Process,
    Network,
    File,
    Auth,
    Integrity,
    Scan,
}

impl EventKind {
    /// `integrity` events are allowed to carry no extractable entities;
    /// every other kind is dropped by the normalizer if entity extraction
    /// yields nothing.
    pub fn permits_empty_entities(self) -> bool {
        matches!(self, EventKind::Integrity)
    }
}

/// Telemetry unit produced by an agent or probe. Opaque and append-only
/// once signed; the fingerprint is what the alert engine dedups on.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub event_id: EventId,
    pub agent_id: String,
    pub tenant_id: String,
    /// Milliseconds since epoch, monotonic within the originating agent.
    pub occurred_at: i64,
    pub received_at: i64,
    pub kind: EventKind,
    pub payload: serde_json::Value,
    /// `sha256(canonical(agent_id, kind, payload))`, hex-encoded.
    pub fingerprint: String,
}

impl Event {
    /// The subset of fields the fingerprint is computed over, in a stable
    /// shape so callers never need to reconstruct this by hand.
    pub fn fingerprint_subject(&self) -> serde_json::Value {
        serde_json::json!({
            "agent_id": self.agent_id,
            "kind": self.kind,
            "payload": self.payload,
        })
    }
}

/// A signed acknowledgment returned by the ingest endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Receipt {
    pub event_id: EventId,
    pub body_sha256: String,
    pub server_ts: i64,
    pub sig: String,
}
