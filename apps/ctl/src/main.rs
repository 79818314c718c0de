use clap::Parser;
use dotenvy::dotenv;
use ransomeye_ctl::config::CtlArgs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    ransomeye_telemetry::init_tracing("ctl");

    let args = CtlArgs::parse();
    let exit_code = ransomeye_ctl::run(args).await;
    std::process::exit(exit_code);
}
