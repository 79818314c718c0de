use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Agent-side configuration. Every field is CLI-flag-or-env-var per the
/// `clap` `env` feature, matching the directive-struct pattern this
/// workspace's other endpoint binaries use; there is no config file format.
#[derive(Parser, Debug)]
#[command(version, about = "RansomEye endpoint agent: local event collector, mTLS uploader, heartbeat, and signed-update apply loop.")]
pub struct AgentArgs {
    #[arg(long, env = "AGENT_ID")]
    agent_id: String,

    #[arg(long, env = "TENANT_ID")]
    tenant_id: String,

    #[arg(long, env = "CORE_API_URL")]
    core_api_url: String,

    #[arg(long, env = "AGENT_CERT_PATH")]
    agent_cert_path: PathBuf,

    #[arg(long, env = "AGENT_KEY_PATH")]
    agent_key_path: PathBuf,

    #[arg(long, env = "CA_CERT_PATH")]
    ca_cert_path: PathBuf,

    #[arg(long, env = "UPDATE_PUBKEY_PATH")]
    update_pubkey_path: PathBuf,

    #[arg(long, env = "RECEIPT_VERIFY_KEY_PATH")]
    receipt_verify_key_path: PathBuf,

    #[arg(long, env = "BUFFER_DIR", default_value = "./var/agent-buffer")]
    buffer_dir: PathBuf,

    #[arg(long, env = "MAX_BUFFER_MB", default_value_t = 1024)]
    max_buffer_mb: u64,

    #[arg(long, env = "HEARTBEAT_INTERVAL_SEC", default_value_t = 60)]
    heartbeat_interval_sec: u64,

    #[arg(long, env = "COLLECTOR_BIND_ADDR", default_value = "127.0.0.1:8753")]
    collector_bind: String,

    #[arg(long, env = "UPDATE_BUNDLE_DIR", default_value = "./var/updates")]
    update_bundle_dir: PathBuf,

    #[arg(long, env = "AGENT_INSTALL_DIR", default_value = "./var/install")]
    install_dir: PathBuf,

    #[arg(long, env = "AGENT_ROLLBACK_DIR", default_value = "./var/install-rollback")]
    rollback_dir: PathBuf,

    #[arg(long, env = "SELF_TEST_CMD", default_value = "self_test.sh")]
    self_test_cmd: String,

    #[arg(long, env = "SELF_TEST_TIMEOUT_SEC", default_value_t = 60)]
    self_test_timeout_sec: u64,

    #[arg(long, env = "AGENT_SERVICE_NAME", default_value = "ransomeye-agent")]
    service_name: String,
}

pub struct AgentConfig {
    pub agent_id: String,
    pub tenant_id: String,
    pub core_api_url: String,
    pub agent_cert_path: PathBuf,
    pub agent_key_path: PathBuf,
    pub ca_cert_path: PathBuf,
    pub update_pubkey_path: PathBuf,
    pub receipt_verify_key_path: PathBuf,
    pub buffer_dir: PathBuf,
    pub max_buffer_bytes: u64,
    pub heartbeat_interval: Duration,
    pub collector_bind: String,
    pub update_bundle_dir: PathBuf,
    pub install_dir: PathBuf,
    pub rollback_dir: PathBuf,
    pub self_test_cmd: String,
    pub self_test_timeout: Duration,
    pub service_name: String,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, String> {
        let args = AgentArgs::try_parse().map_err(|e| e.to_string())?;
        Ok(AgentConfig {
            agent_id: args.agent_id,
            tenant_id: args.tenant_id,
            core_api_url: args.core_api_url,
            agent_cert_path: args.agent_cert_path,
            agent_key_path: args.agent_key_path,
            ca_cert_path: args.ca_cert_path,
            update_pubkey_path: args.update_pubkey_path,
            receipt_verify_key_path: args.receipt_verify_key_path,
            buffer_dir: args.buffer_dir,
            max_buffer_bytes: args.max_buffer_mb * 1024 * 1024,
            heartbeat_interval: Duration::from_secs(args.heartbeat_interval_sec),
            collector_bind: args.collector_bind,
            update_bundle_dir: args.update_bundle_dir,
            install_dir: args.install_dir,
            rollback_dir: args.rollback_dir,
            self_test_cmd: args.self_test_cmd,
            self_test_timeout: Duration::from_secs(args.self_test_timeout_sec),
            service_name: args.service_name,
        })
    }
}
