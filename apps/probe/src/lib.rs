//! DPI probe composition root: a scanner worker producing `network` events
//! from `scan::scan()`, an uploader worker driving the same
//! `ransomeye_transport::drain_once` the endpoint agent uses, and a
//! heartbeat worker. Grounded on the same three-cooperative-worker shape
//! as `ransomeye_agent`, minus the local collector (the probe is its own
//! event source) and the updater (the probe is not update-managed here).

pub mod config;
pub mod scan;

use std::sync::Arc;

use ransomeye_integrity::{canonical_bytes, sha256_hex, VerifyingIdentity};
use ransomeye_transport::{drain_once, AgentBuffer, Backoff, UploadClient};
use ransomeye_types::{Event, EventId, EventKind};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::ProbeConfig;

fn read_identity(config: &ProbeConfig) -> std::io::Result<(Vec<u8>, Vec<u8>)> {
    let mut identity_pem = std::fs::read(&config.agent_cert_path)?;
    identity_pem.extend_from_slice(&std::fs::read(&config.agent_key_path)?);
    let ca_pem = std::fs::read(&config.ca_cert_path)?;
    Ok((identity_pem, ca_pem))
}

fn build_event(agent_id: &str, tenant_id: &str, conn: &scan::Connection, now: i64, local_host: &str) -> Event {
    let payload = serde_json::json!({
        "host": local_host,
        "ip": conn.remote_ip,
        "local_port": conn.local_port,
        "remote_port": conn.remote_port,
    });
    let mut event = Event {
        event_id: EventId::new(),
        agent_id: agent_id.to_string(),
        tenant_id: tenant_id.to_string(),
        occurred_at: now,
        received_at: now,
        kind: EventKind::Network,
        payload,
        fingerprint: String::new(),
    };
    let subject = event.fingerprint_subject();
    event.fingerprint = canonical_bytes(&subject).map(|b| sha256_hex(&b)).unwrap_or_default();
    event
}

/// Runs the scanner, uploader, and heartbeat workers until `Ctrl-C`.
pub async fn run(config: ProbeConfig) -> anyhow::Result<()> {
    let buffer = Arc::new(AgentBuffer::open(&config.buffer_dir, config.max_buffer_bytes)?);
    let receipt_verifier_pem = std::fs::read_to_string(&config.receipt_verify_key_path)?;
    let receipt_verifier = VerifyingIdentity::from_public_pkcs8_pem(&receipt_verifier_pem)?;
    let (identity_pem, ca_pem) = read_identity(&config)?;
    let client = Arc::new(UploadClient::new(config.core_api_url.clone(), &identity_pem, &ca_pem, receipt_verifier)?);
    let local_host = hostname::get().map(|h| h.to_string_lossy().to_string()).unwrap_or_else(|_| "unknown-host".to_string());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scanner_buffer = buffer.clone();
    let scan_interval = config.scan_interval;
    let agent_id = config.agent_id.clone();
    let tenant_id = config.tenant_id.clone();
    let mut scanner_shutdown = shutdown_rx.clone();
    let scanner_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(scan_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let connections = scan::scan();
                    let now = now_millis();
                    for conn in &connections {
                        let event = build_event(&agent_id, &tenant_id, conn, now, &local_host);
                        if let Err(e) = scanner_buffer.record(&event) {
                            warn!(error = %e, "failed to record scanned connection");
                        }
                    }
                    if !connections.is_empty() {
                        info!(count = connections.len(), "recorded scanned connections");
                    }
                }
                _ = scanner_shutdown.changed() => {
                    if *scanner_shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    });

    let uploader_buffer = buffer.clone();
    let uploader_client = client.clone();
    let mut uploader_shutdown = shutdown_rx.clone();
    let uploader_task = tokio::spawn(async move {
        let mut backoff = Backoff::default();
        loop {
            tokio::select! {
                result = drain_once(&uploader_buffer, &uploader_client, &mut backoff) => {
                    if let Err(e) = result {
                        error!(error = %e, "drain pass failed");
                    }
                    tokio::time::sleep(backoff.delay().max(std::time::Duration::from_millis(250))).await;
                }
                _ = uploader_shutdown.changed() => {
                    if *uploader_shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    });

    let heartbeat_client = client.clone();
    let heartbeat_agent_id = config.agent_id.clone();
    let heartbeat_interval = config.heartbeat_interval;
    let mut heartbeat_shutdown = shutdown_rx.clone();
    let heartbeat_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(heartbeat_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = heartbeat_client.heartbeat(&heartbeat_agent_id, env!("CARGO_PKG_VERSION"), serde_json::json!({})).await {
                        warn!(error = %e, "heartbeat failed");
                    }
                }
                _ = heartbeat_shutdown.changed() => {
                    if *heartbeat_shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(scanner_task, uploader_task, heartbeat_task);
    Ok(())
}

fn now_millis() -> i64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}
