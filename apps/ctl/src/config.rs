use clap::Parser;

/// Global flags every subcommand shares: one top-level struct for
/// connection settings, subcommands for the actual verb.
#[derive(Parser, Debug)]
#[command(version, about = "RansomEye operator CLI: job enqueue/inspect and bundle/alert/incident operations against the orchestrator.")]
pub struct CtlArgs {
    #[arg(long, env = "CORE_API_URL", global = true)]
    pub core_api_url: String,

    #[arg(long, env = "CTL_BEARER_TOKEN", global = true)]
    pub bearer_token: String,

    /// Emit machine-readable JSON instead of a human summary.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: crate::commands::Command,
}
