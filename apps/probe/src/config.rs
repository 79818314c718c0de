use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about = "RansomEye DPI probe: local network observation turned into canonical events.")]
pub struct ProbeArgs {
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

    #[arg(long, env = "RECEIPT_VERIFY_KEY_PATH")]
    receipt_verify_key_path: PathBuf,

    #[arg(long, env = "BUFFER_DIR", default_value = "./var/probe-buffer")]
    buffer_dir: PathBuf,

    #[arg(long, env = "MAX_BUFFER_MB", default_value_t = 1024)]
    max_buffer_mb: u64,

    #[arg(long, env = "HEARTBEAT_INTERVAL_SEC", default_value_t = 60)]
    heartbeat_interval_sec: u64,

    #[arg(long, env = "SCAN_INTERVAL_SEC", default_value_t = 10)]
    scan_interval_sec: u64,
}

pub struct ProbeConfig {
    pub agent_id: String,
    pub tenant_id: String,
    pub core_api_url: String,
    pub agent_cert_path: PathBuf,
    pub agent_key_path: PathBuf,
    pub ca_cert_path: PathBuf,
    pub receipt_verify_key_path: PathBuf,
    pub buffer_dir: PathBuf,
    pub max_buffer_bytes: u64,
    pub heartbeat_interval: Duration,
    pub scan_interval: Duration,
}

impl ProbeConfig {
    pub fn from_env() -> Result<Self, String> {
        let args = ProbeArgs::try_parse().map_err(|e| e.to_string())?;
        Ok(ProbeConfig {
            agent_id: args.agent_id,
            tenant_id: args.tenant_id,
            core_api_url: args.core_api_url,
            agent_cert_path: args.agent_cert_path,
            agent_key_path: args.agent_key_path,
            ca_cert_path: args.ca_cert_path,
            receipt_verify_key_path: args.receipt_verify_key_path,
            buffer_dir: args.buffer_dir,
            max_buffer_bytes: args.max_buffer_mb * 1024 * 1024,
            heartbeat_interval: Duration::from_secs(args.heartbeat_interval_sec),
            scan_interval: Duration::from_secs(args.scan_interval_sec),
        })
    }
}
