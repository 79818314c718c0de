use ransomeye_alertengine::{PolicyHandle, PolicySet};
use ransomeye_integrity::{SigningIdentity, VerifyingIdentity};
use ransomeye_storage::Db;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::OrchestratorConfig;
use crate::routes::build_router;
use crate::state::AppState;
use crate::workers;

pub struct Kernel {
    state: AppState,
    listener: TcpListener,
}

impl Kernel {
    pub async fn ignite(config: OrchestratorConfig) -> Result<Self, String> {
        let db = Db::connect(&config.db_url, config.db_auth_token.clone()).await.map_err(|e| e.to_string())?;

        let policy_bytes = std::fs::read(&config.policy_path).map_err(|e| format!("failed to read policy file {}: {e}", config.policy_path.display()))?;
        let policy_set = PolicySet::parse_and_validate(&policy_bytes).map_err(|e| e.to_string())?;
        let policy = PolicyHandle::new(policy_set);

        let receipt_signer = load_signer(&config.receipt_sign_key_path)?;
        let bundle_signer = load_signer(&config.orch_sign_key_path)?;
        let bundle_verifier = load_verifier(&config.orch_verify_key_path)?;

        let port = config.port;
        let state = AppState::new(db, policy, receipt_signer, bundle_signer, bundle_verifier, config).map_err(|e| e.to_string())?;

        let listener = TcpListener::bind(("0.0.0.0", port)).await.map_err(|e| e.to_string())?;
        info!(%port, "orchestrator listening");

        Ok(Kernel { state, listener })
    }

    pub async fn run(self) -> Result<(), String> {
        let worker_id = format!("{}-worker-0", self.state.config.node_id);
        tokio::spawn(workers::run(self.state.clone(), worker_id));

        let router = build_router(self.state);
        axum::serve(self.listener, router).await.map_err(|e| e.to_string())
    }
}

fn load_signer(path: &std::path::Path) -> Result<SigningIdentity, String> {
    let pem = std::fs::read_to_string(path).map_err(|e| format!("failed to read signing key {}: {e}", path.display()))?;
    SigningIdentity::from_pkcs8_pem(&pem).map_err(|e| e.to_string())
}

fn load_verifier(path: &std::path::Path) -> Result<VerifyingIdentity, String> {
    let pem = std::fs::read_to_string(path).map_err(|e| format!("failed to read verifying key {}: {e}", path.display()))?;
    VerifyingIdentity::from_public_pkcs8_pem(&pem).map_err(|e| e.to_string())
}
