use std::path::PathBuf;

/// Environment-sourced configuration. Every field here corresponds to one
/// of the service-side env vars; there is no config file format, only env
/// vars and their defaults, matching how the rest of the workspace's
/// binaries are configured.
pub struct OrchestratorConfig {
    pub db_url: String,
    pub db_auth_token: Option<String>,
    pub port: u16,
    pub bearer_token: String,
    pub receipt_sign_key_path: PathBuf,
    pub orch_sign_key_path: PathBuf,
    pub orch_verify_key_path: PathBuf,
    pub queue_lease_ttl_ms: i64,
    pub bundle_chunk_size_bytes: u64,
    pub bundle_zstd_level: i32,
    pub bundle_store_dir: PathBuf,
    pub policy_path: PathBuf,
    pub node_id: String,
    pub fingerprint_dedup_window_ms: i64,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl OrchestratorConfig {
    pub fn from_env() -> Result<Self, String> {
        let port: u16 = env_or("PORT", "8443").parse().map_err(|_| "PORT is not a valid u16".to_string())?;
        let queue_lease_ttl_sec: i64 = env_or("QUEUE_LEASE_TTL_SEC", "300").parse().map_err(|_| "QUEUE_LEASE_TTL_SEC is not a valid integer".to_string())?;
        let bundle_chunk_mb: u64 = env_or("BUNDLE_CHUNK_SIZE_MB", "16").parse().map_err(|_| "BUNDLE_CHUNK_SIZE_MB is not a valid integer".to_string())?;
        let fingerprint_dedup_window_sec: i64 = env_or("FINGERPRINT_DEDUP_WINDOW_SEC", "60")
            .parse()
            .map_err(|_| "FINGERPRINT_DEDUP_WINDOW_SEC is not a valid integer".to_string())?;

        Ok(OrchestratorConfig {
            db_url: std::env::var("DB_URL").map_err(|_| "DB_URL is required".to_string())?,
            db_auth_token: std::env::var("DB_AUTH_TOKEN").ok(),
            port,
            bearer_token: std::env::var("ORCH_BEARER_TOKEN").map_err(|_| "ORCH_BEARER_TOKEN is required".to_string())?,
            receipt_sign_key_path: PathBuf::from(std::env::var("RECEIPT_SIGN_KEY_PATH").map_err(|_| "RECEIPT_SIGN_KEY_PATH is required".to_string())?),
            orch_sign_key_path: PathBuf::from(std::env::var("ORCH_SIGN_KEY_PATH").map_err(|_| "ORCH_SIGN_KEY_PATH is required".to_string())?),
            orch_verify_key_path: PathBuf::from(std::env::var("ORCH_VERIFY_KEY_PATH").map_err(|_| "ORCH_VERIFY_KEY_PATH is required".to_string())?),
            queue_lease_ttl_ms: queue_lease_ttl_sec * 1000,
            bundle_chunk_size_bytes: bundle_chunk_mb * 1024 * 1024,
            bundle_zstd_level: env_or("BUNDLE_ZSTD_LEVEL", "3").parse().map_err(|_| "BUNDLE_ZSTD_LEVEL is not a valid integer".to_string())?,
            bundle_store_dir: PathBuf::from(env_or("BUNDLE_STORE_DIR", "./var/bundles")),
            policy_path: PathBuf::from(env_or("POLICY_PATH", "./var/policy.json")),
            node_id: env_or("NODE_ID", "orchestrator-0"),
            fingerprint_dedup_window_ms: fingerprint_dedup_window_sec * 1000,
        })
    }
}
