//! Stop, snapshot, atomic swap, start, self-test, rollback-on-failure,
//! prune. Verification lives in `verify.rs` and must have already
//! succeeded before `apply` is called — this module never re-checks a
//! signature or a hash.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{error, info, warn};

use crate::error::UpdaterError;
use crate::verify::VerifiedUpdate;

/// Starts, stops, and self-tests the agent service. Production wiring
/// implements this against the platform service manager (systemd unit,
/// Windows service control manager); tests use an in-memory fake.
pub trait ServiceController {
    fn stop(&self) -> Result<(), UpdaterError>;
    fn start(&self) -> Result<(), UpdaterError>;
    /// Runs the self-test script at `self_test_path` relative to
    /// `install_dir`, returning `Ok(())` only if it exits zero within
    /// `timeout`.
    fn self_test(&self, install_dir: &Path, self_test_path: &str, timeout: Duration) -> Result<(), UpdaterError>;
}

pub struct ApplyConfig {
    pub install_dir: PathBuf,
    pub rollback_dir: PathBuf,
    pub self_test_timeout: Duration,
    pub keep_rollbacks: usize,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        ApplyConfig {
            install_dir: PathBuf::from("/opt/ransomeye/agent"),
            rollback_dir: PathBuf::from("/opt/ransomeye/agent-rollback"),
            self_test_timeout: Duration::from_secs(60),
            keep_rollbacks: 2,
        }
    }
}

/// Runs the full atomic-apply-with-rollback algorithm. `bundle_root` is
/// the already-verified, already-unpacked update bundle (its `payload/`
/// directory holds the new install tree).
pub fn apply_update(verified: &VerifiedUpdate, bundle_root: &Path, config: &ApplyConfig, controller: &dyn ServiceController) -> Result<(), UpdaterError> {
    controller.stop()?;

    let snapshot_dir = snapshot_install_dir(&config.install_dir, &config.rollback_dir)?;

    if let Err(e) = swap_in_new_payload(bundle_root, &config.install_dir) {
        // The install directory may be left partially swapped; restore
        // immediately from the snapshot we just took rather than leaving
        // the agent running a half-applied tree.
        restore_snapshot(&snapshot_dir, &config.install_dir)?;
        controller.start()?;
        return Err(e);
    }

    controller.start()?;

    match controller.self_test(&config.install_dir, &verified.manifest.self_test_path, config.self_test_timeout) {
        Ok(()) => {
            info!(target_version = %verified.manifest.target_version, "update applied and self-test passed");
            prune_old_rollbacks(&config.rollback_dir, config.keep_rollbacks)?;
            Ok(())
        }
        Err(_) => {
            warn!(target_version = %verified.manifest.target_version, "self-test failed, rolling back");
            rollback(&snapshot_dir, &config.install_dir, controller)?;
            Err(UpdaterError::SelfTestFailed)
        }
    }
}

fn snapshot_install_dir(install_dir: &Path, rollback_root: &Path) -> Result<PathBuf, UpdaterError> {
    let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
    let snapshot_dir = rollback_root.join(timestamp.to_string());
    std::fs::create_dir_all(&snapshot_dir)?;
    copy_tree(install_dir, &snapshot_dir)?;
    Ok(snapshot_dir)
}

fn swap_in_new_payload(bundle_root: &Path, install_dir: &Path) -> Result<(), UpdaterError> {
    let payload_dir = bundle_root.join("payload");
    let scratch = tempfile::tempdir_in(install_dir.parent().unwrap_or(install_dir))?;
    copy_tree(&payload_dir, scratch.path())?;

    // Per-file rename into the install path rather than replacing the
    // whole directory in one rename, so a mid-swap crash leaves the
    // install directory a mix of old and new files rather than
    // vanishing — the next apply's verify-before-touch step is what
    // actually protects against running a half-swapped tree, but this
    // keeps the window as short as possible.
    for entry in walk_files(scratch.path())? {
        let relative = entry.strip_prefix(scratch.path()).expect("entry is under scratch.path()");
        let target = install_dir.join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(&entry, &target)?;
    }
    Ok(())
}

fn restore_snapshot(snapshot_dir: &Path, install_dir: &Path) -> Result<(), UpdaterError> {
    if install_dir.exists() {
        std::fs::remove_dir_all(install_dir)?;
    }
    std::fs::create_dir_all(install_dir)?;
    copy_tree(snapshot_dir, install_dir)?;
    Ok(())
}

fn rollback(snapshot_dir: &Path, install_dir: &Path, controller: &dyn ServiceController) -> Result<(), UpdaterError> {
    controller.stop().map_err(|e| UpdaterError::RollbackFailed(e.to_string()))?;
    restore_snapshot(snapshot_dir, install_dir).map_err(|e| UpdaterError::RollbackFailed(e.to_string()))?;
    controller.start().map_err(|e| UpdaterError::RollbackFailed(e.to_string()))?;
    leave_breadcrumb(install_dir, snapshot_dir)?;
    Ok(())
}

fn leave_breadcrumb(install_dir: &Path, snapshot_dir: &Path) -> Result<(), UpdaterError> {
    let breadcrumb = install_dir.join("ROLLBACK_OCCURRED");
    let body = format!("rolled back from {} at {:?}\n", snapshot_dir.display(), SystemTime::now());
    std::fs::write(breadcrumb, body)?;
    Ok(())
}

fn prune_old_rollbacks(rollback_root: &Path, keep: usize) -> Result<(), UpdaterError> {
    if !rollback_root.exists() {
        return Ok(());
    }
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(rollback_root)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .map(|e| e.path())
        .collect();
    dirs.sort();
    dirs.reverse();
    for stale in dirs.into_iter().skip(keep) {
        if let Err(e) = std::fs::remove_dir_all(&stale) {
            error!(path = %stale.display(), error = %e, "failed to prune old rollback, leaving it in place");
        }
    }
    Ok(())
}

fn copy_tree(from: &Path, to: &Path) -> Result<(), UpdaterError> {
    for entry in walk_files(from)? {
        let relative = entry.strip_prefix(from).expect("entry is under from");
        let target = to.join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&entry, &target)?;
    }
    Ok(())
}

fn walk_files(root: &Path) -> Result<Vec<PathBuf>, UpdaterError> {
    let mut out = Vec::new();
    if !root.exists() {
        return Ok(out);
    }
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                stack.push(path);
            } else {
                out.push(path);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ransomeye_integrity::{merkle_root, sha256_hex, SigningIdentity, VerifyingIdentity};
    use ransomeye_types::bundle::{Compression, ManifestAlgorithms, ManifestEntry, ManifestProducer};
    use ransomeye_types::UpdateManifest;
    use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
    use rsa::RsaPrivateKey;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct FakeController {
        self_test_calls: AtomicUsize,
        self_test_should_pass: Mutex<bool>,
    }

    impl ServiceController for FakeController {
        fn stop(&self) -> Result<(), UpdaterError> {
            Ok(())
        }
        fn start(&self) -> Result<(), UpdaterError> {
            Ok(())
        }
        fn self_test(&self, _install_dir: &Path, _self_test_path: &str, _timeout: Duration) -> Result<(), UpdaterError> {
            self.self_test_calls.fetch_add(1, Ordering::SeqCst);
            if *self.self_test_should_pass.lock().unwrap() {
                Ok(())
            } else {
                Err(UpdaterError::SelfTestFailed)
            }
        }
    }

    fn keypair() -> (SigningIdentity, VerifyingIdentity) {
        let mut rng = rand::rngs::OsRng;
        let key = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let private_pem = key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
        let public_pem = rsa::RsaPublicKey::from(&key).to_public_key_pem(LineEnding::LF).unwrap();
        (SigningIdentity::from_pkcs8_pem(&private_pem).unwrap(), VerifyingIdentity::from_public_pkcs8_pem(&public_pem).unwrap())
    }

    fn verified_update_with(bundle_root: &Path, payload_contents: &[u8]) -> VerifiedUpdate {
        std::fs::create_dir_all(bundle_root.join("payload")).unwrap();
        std::fs::write(bundle_root.join("payload").join("agent.bin"), payload_contents).unwrap();
        let entry = ManifestEntry {
            path: "payload/agent.bin".to_string(),
            size: payload_contents.len() as u64,
            sha256: sha256_hex(payload_contents),
            chunk_index: None,
        };
        let entries = vec![entry];
        let root = merkle_root(&entries);
        VerifiedUpdate {
            manifest: UpdateManifest {
                version: "1".to_string(),
                producer: ManifestProducer {
                    name: "ransomeye-updater".to_string(),
                    version: "0.1.0".to_string(),
                    node_id: "node-a".to_string(),
                },
                created_at: "2026-01-01T00:00:00.000Z".to_string(),
                algorithms: ManifestAlgorithms {
                    compression: Compression::Zstd,
                    ..ManifestAlgorithms::default()
                },
                target_version: "1.2.3".to_string(),
                self_test_path: "self_test.sh".to_string(),
                entries,
                merkle_root: root,
            },
        }
    }

    #[test]
    fn a_passing_self_test_keeps_the_new_payload_in_place() {
        let bundle_dir = tempdir().unwrap();
        let verified = verified_update_with(bundle_dir.path(), b"new-binary");

        let workspace = tempdir().unwrap();
        let install_dir = workspace.path().join("install");
        std::fs::create_dir_all(&install_dir).unwrap();
        std::fs::write(install_dir.join("agent.bin"), b"old-binary").unwrap();

        let config = ApplyConfig {
            install_dir: install_dir.clone(),
            rollback_dir: workspace.path().join("rollback"),
            self_test_timeout: Duration::from_secs(1),
            keep_rollbacks: 2,
        };
        let controller = FakeController {
            self_test_calls: AtomicUsize::new(0),
            self_test_should_pass: Mutex::new(true),
        };

        apply_update(&verified, bundle_dir.path(), &config, &controller).unwrap();

        assert_eq!(std::fs::read(install_dir.join("agent.bin")).unwrap(), b"new-binary");
        assert_eq!(controller.self_test_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn a_failing_self_test_restores_the_previous_payload() {
        let bundle_dir = tempdir().unwrap();
        let verified = verified_update_with(bundle_dir.path(), b"new-binary");

        let workspace = tempdir().unwrap();
        let install_dir = workspace.path().join("install");
        std::fs::create_dir_all(&install_dir).unwrap();
        std::fs::write(install_dir.join("agent.bin"), b"old-binary").unwrap();

        let config = ApplyConfig {
            install_dir: install_dir.clone(),
            rollback_dir: workspace.path().join("rollback"),
            self_test_timeout: Duration::from_secs(1),
            keep_rollbacks: 2,
        };
        let controller = FakeController {
            self_test_calls: AtomicUsize::new(0),
            self_test_should_pass: Mutex::new(false),
        };

        let result = apply_update(&verified, bundle_dir.path(), &config, &controller);
        assert!(result.is_err());
        assert_eq!(std::fs::read(install_dir.join("agent.bin")).unwrap(), b"old-binary");
        assert!(install_dir.join("ROLLBACK_OCCURRED").exists());
    }
}
