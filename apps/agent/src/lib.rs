//! Endpoint agent composition root: a loopback collector, an uploader
//! worker driving `ransomeye_transport::drain_once`, a heartbeat worker,
//! and an update watcher driving `ransomeye_updater`. Four cooperative
//! tokio tasks — collector, uploader, heartbeat, update watcher — with
//! no lock held across I/O; the buffer is the only shared state and it is
//! protected by atomic rename alone.

pub mod collector;
pub mod config;
pub mod service;
pub mod update_watch;

use std::sync::Arc;

use ransomeye_integrity::VerifyingIdentity;
use ransomeye_transport::{drain_once, AgentBuffer, Backoff, UploadClient};
use ransomeye_updater::ApplyConfig;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::collector::CollectorState;
use crate::config::AgentConfig;
use crate::service::SystemServiceController;
use crate::update_watch::UpdateWatcher;

fn read_identity(config: &AgentConfig) -> std::io::Result<(Vec<u8>, Vec<u8>)> {
    let mut identity_pem = std::fs::read(&config.agent_cert_path)?;
    identity_pem.extend_from_slice(&std::fs::read(&config.agent_key_path)?);
    let ca_pem = std::fs::read(&config.ca_cert_path)?;
    Ok((identity_pem, ca_pem))
}

fn load_verifier(path: &std::path::Path) -> anyhow::Result<VerifyingIdentity> {
    let pem = std::fs::read_to_string(path)?;
    Ok(VerifyingIdentity::from_public_pkcs8_pem(&pem)?)
}

/// Runs every worker until `Ctrl-C` or `shutdown_tx` fires. Returns once
/// the uploader has drained any in-flight file back to `pending`: no
/// event is lost, duplicates are possible and the server deduplicates by
/// `event_id`.
pub async fn run(config: AgentConfig) -> anyhow::Result<()> {
    let buffer = Arc::new(AgentBuffer::open(&config.buffer_dir, config.max_buffer_bytes)?);
    let receipt_verifier = load_verifier(&config.receipt_verify_key_path)?;
    let (identity_pem, ca_pem) = read_identity(&config)?;
    let client = Arc::new(UploadClient::new(config.core_api_url.clone(), &identity_pem, &ca_pem, receipt_verifier)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let collector_state = CollectorState {
        buffer: buffer.clone(),
        agent_id: config.agent_id.clone(),
        tenant_id: config.tenant_id.clone(),
    };
    let collector_listener = tokio::net::TcpListener::bind(&config.collector_bind).await?;
    info!(addr = %config.collector_bind, "local collector listening");
    let collector_shutdown = shutdown_rx.clone();
    let collector_task = tokio::spawn(async move {
        let mut shutdown = collector_shutdown;
        axum::serve(collector_listener, collector::router(collector_state))
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await
    });

    let uploader_buffer = buffer.clone();
    let uploader_client = client.clone();
    let mut uploader_shutdown = shutdown_rx.clone();
    let uploader_task = tokio::spawn(async move {
        let mut backoff = Backoff::default();
        loop {
            tokio::select! {
                result = drain_once(&uploader_buffer, &uploader_client, &mut backoff) => {
                    match result {
                        Ok(stats) if stats.delivered > 0 || stats.retried > 0 || stats.quarantined > 0 => {
                            info!(?stats, "drain pass");
                        }
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "drain pass failed"),
                    }
                    tokio::time::sleep(backoff.delay().max(std::time::Duration::from_millis(250))).await;
                }
                _ = uploader_shutdown.changed() => {
                    if *uploader_shutdown.borrow() {
                        info!("uploader worker shutting down");
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
    let heartbeat_buffer = buffer.clone();
    let heartbeat_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(heartbeat_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let counters = heartbeat_buffer.stats().map(|s| serde_json::json!({
                        "pending_bytes": s.pending_bytes,
                        "pending_count": s.pending_count,
                        "dropped_total": s.dropped_total,
                    })).unwrap_or_default();
                    if let Err(e) = heartbeat_client.heartbeat(&heartbeat_agent_id, env!("CARGO_PKG_VERSION"), counters).await {
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

    let update_verifier = load_verifier(&config.update_pubkey_path)?;
    let apply_config = ApplyConfig {
        install_dir: config.install_dir.clone(),
        rollback_dir: config.rollback_dir.clone(),
        self_test_timeout: config.self_test_timeout,
        keep_rollbacks: 2,
    };
    let controller = SystemServiceController::new(config.service_name.clone(), config.self_test_cmd.clone());
    let watcher = UpdateWatcher::new(config.update_bundle_dir.clone(), update_verifier, apply_config, controller);
    let update_shutdown = shutdown_rx.clone();
    let update_task = tokio::spawn(async move {
        watcher.run(update_shutdown).await;
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    let _ = shutdown_tx.send(true);

    let _ = tokio::join!(collector_task, uploader_task, heartbeat_task, update_task);
    Ok(())
}
