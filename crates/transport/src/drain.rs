//! One pass over every currently pending event, in ULID order, driving
//! each through the inflight/archived/quarantine states. The uploader
//! worker's scheduling loop invokes `drain_once` repeatedly; backoff
//! state lives across calls in the `Backoff` the caller owns.

use std::time::Duration;

use rand::Rng;
use ransomeye_types::job::backoff_millis;
use ransomeye_types::{Event, EventId};
use tracing::{info, warn};

use crate::buffer::AgentBuffer;
use crate::client::{UploadClient, UploadOutcome};
use crate::error::TransportError;

const BACKOFF_BASE_MS: u64 = 500;
const BACKOFF_CAP_MS: u64 = 30_000;

/// Full-jitter backoff state for the uploader worker, incremented on
/// every retriable failure and reset on the next successful drain pass.
#[derive(Default)]
pub struct Backoff {
    consecutive_failures: u32,
}

impl Backoff {
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    pub fn delay(&self) -> Duration {
        if self.consecutive_failures == 0 {
            return Duration::ZERO;
        }
        let millis = backoff_millis(self.consecutive_failures, BACKOFF_BASE_MS, BACKOFF_CAP_MS, |bound| {
            if bound == 0 {
                0
            } else {
                rand::thread_rng().gen_range(0..=bound)
            }
        });
        Duration::from_millis(millis)
    }
}

#[derive(Default, Debug)]
pub struct DrainStats {
    pub delivered: u64,
    pub already_delivered: u64,
    pub retried: u64,
    pub quarantined: u64,
}

/// One pass over the buffer's pending files. Stops early (without error)
/// on the first retriable failure, since later files are likely to hit
/// the same transient condition and backoff applies to the whole
/// uploader, not per file.
pub async fn drain_once(buffer: &AgentBuffer, client: &UploadClient, backoff: &mut Backoff) -> Result<DrainStats, TransportError> {
    let mut stats = DrainStats::default();

    for path in buffer.pending_in_order()? {
        let event: Event = serde_json::from_slice(&std::fs::read(&path)?)?;
        let event_id = event.event_id;

        buffer.mark_inflight(event_id)?;

        match client.upload(&event).await {
            Ok(UploadOutcome::Delivered(receipt)) => {
                buffer.mark_archived(event_id, &receipt.body_sha256)?;
                stats.delivered += 1;
                backoff.reset();
            }
            Ok(UploadOutcome::AlreadyDelivered) => {
                buffer.mark_archived(event_id, &event.fingerprint)?;
                stats.already_delivered += 1;
                backoff.reset();
            }
            Ok(UploadOutcome::Retriable) => {
                buffer.requeue(event_id)?;
                stats.retried += 1;
                backoff.record_failure();
                warn!(%event_id, "upload retriable, requeued and backing off");
                return Ok(stats);
            }
            Ok(UploadOutcome::Quarantine) => {
                buffer.quarantine(event_id)?;
                stats.quarantined += 1;
            }
            Err(TransportError::FingerprintMismatch { .. }) | Err(TransportError::ReceiptSignature) => {
                buffer.quarantine(event_id)?;
                stats.quarantined += 1;
                warn!(%event_id, "receipt verification failed, quarantined");
            }
            Err(e) => {
                buffer.requeue(event_id)?;
                backoff.record_failure();
                return Err(e);
            }
        }
    }

    if stats.retried == 0 && stats.quarantined == 0 {
        backoff.reset();
    }
    info!(delivered = stats.delivered, already_delivered = stats.already_delivered, retried = stats.retried, quarantined = stats.quarantined, "drain pass complete");
    Ok(stats)
}

/// The uploader's current HTTP request is not interrupted here (the
/// caller's `select!` around a bounded timeout handles that) — this
/// function is for returning any file the shutdown path observes stuck
/// in `inflight` back to `pending` so it is retried on the next start.
pub fn return_inflight_to_pending(buffer: &AgentBuffer, event_id: EventId) -> Result<(), TransportError> {
    buffer.requeue(event_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_backoff_has_no_delay() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay(), Duration::ZERO);
    }

    #[test]
    fn repeated_failures_grow_the_delay_bound_up_to_the_cap() {
        let mut backoff = Backoff::default();
        for _ in 0..20 {
            backoff.record_failure();
        }
        assert!(backoff.delay() <= Duration::from_millis(BACKOFF_CAP_MS));
    }

    #[test]
    fn reset_clears_accumulated_failures() {
        let mut backoff = Backoff::default();
        backoff.record_failure();
        backoff.record_failure();
        backoff.reset();
        assert_eq!(backoff.delay(), Duration::ZERO);
    }
}
