//! mTLS uplink to the alert ingestion endpoint, plus the heartbeat call.
//! One `reqwest::Client` per agent process, built once from the client
//! credential bundle and held for the agent's lifetime.

use ransomeye_integrity::{canonical_bytes_of, sha256_hex, VerifyingIdentity};
use ransomeye_types::{Event, Receipt};
use reqwest::{Certificate, Identity, StatusCode};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::error::TransportError;

/// What an upload attempt resolved to, so the caller's drain loop can
/// decide renaming/backoff without re-deriving HTTP semantics.
pub enum UploadOutcome {
    /// 2xx with a verified receipt; the caller archives the event.
    Delivered(Receipt),
    /// 409 (dedup) or any other success-shaped rejection the server
    /// already has this event for; treated like delivery without a
    /// receipt to verify.
    AlreadyDelivered,
    /// 5xx or a transport-level timeout; the caller requeues and backs off.
    Retriable,
    /// Receipt verification failed, or a 4xx other than 409; the caller
    /// quarantines the event.
    Quarantine,
}

#[derive(Serialize)]
struct HeartbeatPayload<'a> {
    agent_id: &'a str,
    version: &'a str,
    counters: serde_json::Value,
}

pub struct UploadClient {
    http: reqwest::Client,
    base_url: String,
    receipt_verifier: VerifyingIdentity,
}

impl UploadClient {
    /// `client_identity_pem` is a PEM blob containing the client
    /// certificate followed by its private key, as `reqwest::Identity`
    /// expects. `ca_bundle_pem` verifies the server's certificate chain.
    pub fn new(base_url: impl Into<String>, client_identity_pem: &[u8], ca_bundle_pem: &[u8], receipt_verifier: VerifyingIdentity) -> Result<Self, TransportError> {
        let identity = Identity::from_pem(client_identity_pem)?;
        let ca = Certificate::from_pem(ca_bundle_pem)?;
        let http = reqwest::Client::builder()
            .identity(identity)
            .add_root_certificate(ca)
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(UploadClient {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            receipt_verifier,
        })
    }

    /// POSTs the canonical event body with its fingerprint header, then
    /// verifies the signed receipt against that same body.
    #[instrument(skip(self, event))]
    pub async fn upload(&self, event: &Event) -> Result<UploadOutcome, TransportError> {
        let body = canonical_bytes_of(event)?;
        let fingerprint = sha256_hex(&body);

        let response = match self
            .http
            .post(format!("{}/events", self.base_url))
            .header("X-Fingerprint", &fingerprint)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() || e.is_connect() => return Ok(UploadOutcome::Retriable),
            Err(e) => return Err(e.into()),
        };

        match response.status() {
            status if status.is_success() => {
                let receipt: Receipt = response.json().await?;
                self.verify_receipt(&receipt, &fingerprint)?;
                Ok(UploadOutcome::Delivered(receipt))
            }
            StatusCode::CONFLICT => Ok(UploadOutcome::AlreadyDelivered),
            status if status.is_server_error() => Ok(UploadOutcome::Retriable),
            status => {
                warn!(%status, event_id = %event.event_id, "server rejected event, quarantining");
                Ok(UploadOutcome::Quarantine)
            }
        }
    }

    fn verify_receipt(&self, receipt: &Receipt, sent_fingerprint: &str) -> Result<(), TransportError> {
        if receipt.body_sha256 != sent_fingerprint {
            return Err(TransportError::FingerprintMismatch {
                sent: sent_fingerprint.to_string(),
                receipt: receipt.body_sha256.clone(),
            });
        }
        let signed_subject = serde_json::json!({
            "event_id": receipt.event_id,
            "body_sha256": receipt.body_sha256,
            "server_ts": receipt.server_ts,
        });
        let subject_bytes = canonical_bytes_of(&signed_subject)?;
        let sig_bytes = hex::decode(&receipt.sig).map_err(|_| TransportError::ReceiptSignature)?;
        self.receipt_verifier.verify(&subject_bytes, &sig_bytes).map_err(|_| TransportError::ReceiptSignature)
    }

    /// Periodic POST carrying liveness and counters. Best effort — the
    /// caller decides how failures affect backoff, since a missed
    /// heartbeat is not itself a data-loss risk.
    #[instrument(skip(self, counters))]
    pub async fn heartbeat(&self, agent_id: &str, version: &str, counters: serde_json::Value) -> Result<(), TransportError> {
        let payload = HeartbeatPayload { agent_id, version, counters };
        let response = self.http.post(format!("{}/heartbeat", self.base_url)).json(&payload).send().await?;
        if response.status().is_success() {
            info!(agent_id, "heartbeat delivered");
        } else {
            warn!(agent_id, status = %response.status(), "heartbeat rejected");
        }
        Ok(())
    }
}
