//! Operator CLI composition root: a verb-per-subcommand HTTP client
//! talking to the orchestrator's HTTP surface rather than the database
//! directly.

pub mod client;
pub mod commands;
pub mod config;

use client::CtlClient;
use config::CtlArgs;

pub async fn run(args: CtlArgs) -> i32 {
    let client = CtlClient::new(args.core_api_url, args.bearer_token);
    commands::run(&client, args.command, args.json).await
}
