use dotenvy::dotenv;
use ransomeye_orchestrator::prelude::*;
use tracing::{error, info};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    ransomeye_telemetry::init_tracing("orchestrator");

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().thread_stack_size(4 * 1024 * 1024).build()?;

    let outcome = runtime.block_on(async {
        let config = OrchestratorConfig::from_env()?;
        info!("igniting orchestrator");
        let kernel = Kernel::ignite(config).await?;
        kernel.run().await
    });

    if let Err(e) = outcome {
        error!(error = %e, "orchestrator exited with an error");
        std::process::exit(1);
    }

    Ok(())
}
