use dotenvy::dotenv;
use ransomeye_probe::config::ProbeConfig;
use tracing::error;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    ransomeye_telemetry::init_tracing("probe");

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().thread_stack_size(4 * 1024 * 1024).build()?;

    let outcome = runtime.block_on(async {
        let config = ProbeConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
        ransomeye_probe::run(config).await
    });

    if let Err(e) = outcome {
        error!(error = %e, "probe exited with an error");
        std::process::exit(1);
    }

    Ok(())
}
