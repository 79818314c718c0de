use std::sync::{Arc, RwLock};

use ransomeye_alertengine::{AlertEngine, AlertRepository, PolicyHandle};
use ransomeye_bundler::BundleRepository;
use ransomeye_graph::GraphRepository;
use ransomeye_integrity::{SigningIdentity, VerifyingIdentity};
use ransomeye_queue::JobRepository;
use ransomeye_storage::{AuditRepository, Db};

use crate::config::OrchestratorConfig;

/// Liveness gate consulted by `health_guard`. Mirrors the shape of a
/// startup integrity check gating traffic until it passes, without the
/// rest of this workspace's one extra indirection (there is no separate
/// bootstrap-vs-nexus split here — one mode, one guard).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemMode {
    Operational,
    Maintenance(String),
}

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub jobs: Arc<JobRepository>,
    pub alerts: Arc<AlertRepository>,
    pub graph: Arc<GraphRepository>,
    pub bundles: Arc<BundleRepository>,
    pub audit: Arc<AuditRepository>,
    pub engine: Arc<AlertEngine>,
    pub policy: PolicyHandle,
    pub receipt_signer: Arc<SigningIdentity>,
    pub bundle_signer: Arc<SigningIdentity>,
    pub bundle_verifier: Arc<VerifyingIdentity>,
    pub config: Arc<OrchestratorConfig>,
    mode: Arc<RwLock<SystemMode>>,
}

impl AppState {
    pub fn new(
        db: Db,
        policy: PolicyHandle,
        receipt_signer: SigningIdentity,
        bundle_signer: SigningIdentity,
        bundle_verifier: VerifyingIdentity,
        config: OrchestratorConfig,
    ) -> Result<Self, ransomeye_storage::StorageError> {
        let engine_repository = AlertRepository::new(db.connection()?);
        let engine = AlertEngine::new(policy.clone(), engine_repository, config.fingerprint_dedup_window_ms);

        Ok(AppState {
            jobs: Arc::new(JobRepository::new(db.connection()?)),
            alerts: Arc::new(AlertRepository::new(db.connection()?)),
            graph: Arc::new(GraphRepository::new(db.connection()?)),
            bundles: Arc::new(BundleRepository::new(db.connection()?)),
            audit: Arc::new(AuditRepository::new(db.connection()?)),
            engine: Arc::new(engine),
            policy,
            receipt_signer: Arc::new(receipt_signer),
            bundle_signer: Arc::new(bundle_signer),
            bundle_verifier: Arc::new(bundle_verifier),
            config: Arc::new(config),
            mode: Arc::new(RwLock::new(SystemMode::Operational)),
            db,
        })
    }

    pub fn set_mode(&self, mode: SystemMode) {
        match self.mode.write() {
            Ok(mut guard) => *guard = mode,
            Err(poisoned) => *poisoned.into_inner() = mode,
        }
    }

    pub fn is_operational(&self) -> Result<(), String> {
        match self.mode.read() {
            Ok(guard) => match &*guard {
                SystemMode::Operational => Ok(()),
                SystemMode::Maintenance(reason) => Err(reason.clone()),
            },
            Err(poisoned) => match &*poisoned.into_inner() {
                SystemMode::Operational => Ok(()),
                SystemMode::Maintenance(reason) => Err(reason.clone()),
            },
        }
    }
}
