//! Polls `update_bundle_dir` for unapplied update bundles and drives them
//! through the verify-then-apply-with-rollback algorithm. A bundle
//! directory is expected to already be unpacked (`manifest.json`,
//! `manifest.sig`, `payload/`); fetching and unpacking the bundle archive
//! itself is the orchestrator/operator's delivery mechanism, out of scope
//! for the agent's own loop.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ransomeye_integrity::VerifyingIdentity;
use ransomeye_updater::{apply_update, verify_update, ApplyConfig, ServiceController};
use tracing::{error, info, warn};

const MARKER_APPLIED: &str = ".applied";
const MARKER_FAILED: &str = ".failed";
const POLL_INTERVAL: Duration = Duration::from_secs(30);

pub struct UpdateWatcher<C: ServiceController> {
    update_bundle_dir: PathBuf,
    verifier: VerifyingIdentity,
    apply_config: ApplyConfig,
    controller: C,
}

impl<C: ServiceController> UpdateWatcher<C> {
    pub fn new(update_bundle_dir: PathBuf, verifier: VerifyingIdentity, apply_config: ApplyConfig, controller: C) -> Self {
        UpdateWatcher {
            update_bundle_dir,
            verifier,
            apply_config,
            controller,
        }
    }

    /// Runs until `shutdown` fires. One poll every [`POLL_INTERVAL`]; each
    /// poll processes at most one bundle so a bad bundle's rollback has
    /// fully settled before the next one is considered.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        loop {
            if let Err(e) = self.poll_once() {
                error!(error = %e, "update watcher poll failed");
            }
            tokio::select! {
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("update watcher shutting down");
                        return;
                    }
                }
            }
        }
    }

    fn poll_once(&self) -> std::io::Result<()> {
        let Some(candidate) = self.next_unprocessed_bundle()? else {
            return Ok(());
        };
        self.process(&candidate);
        Ok(())
    }

    fn next_unprocessed_bundle(&self) -> std::io::Result<Option<PathBuf>> {
        if !self.update_bundle_dir.exists() {
            return Ok(None);
        }
        let mut candidates: Vec<PathBuf> = std::fs::read_dir(&self.update_bundle_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .filter(|p| !p.join(MARKER_APPLIED).exists() && !p.join(MARKER_FAILED).exists())
            .collect();
        candidates.sort();
        Ok(candidates.into_iter().next())
    }

    fn process(&self, bundle_dir: &Path) {
        info!(path = %bundle_dir.display(), "found candidate update bundle");
        let verified = match verify_update(bundle_dir, &self.verifier) {
            Ok(v) => v,
            Err(e) => {
                warn!(path = %bundle_dir.display(), error = %e, "update bundle failed verification, leaving unprocessed for operator inspection");
                let _ = std::fs::write(bundle_dir.join(MARKER_FAILED), format!("verify: {e}\n"));
                return;
            }
        };

        match apply_update(&verified, bundle_dir, &self.apply_config, &self.controller) {
            Ok(()) => {
                info!(target_version = %verified.manifest.target_version, "update applied successfully");
                let _ = std::fs::write(bundle_dir.join(MARKER_APPLIED), b"ok\n");
            }
            Err(e) => {
                error!(target_version = %verified.manifest.target_version, error = %e, "update apply failed, rolled back to the previous version");
                let _ = std::fs::write(bundle_dir.join(MARKER_FAILED), format!("apply: {e}\n"));
            }
        }
    }
}
