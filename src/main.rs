//! finetune-gateway server binary
//!
//! Reads configuration from the environment (and an optional `.env` file)
//! and serves the API until SIGTERM or Ctrl+C.

use finetune_gateway::{Config, Gateway, run_with_shutdown};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "finetune-gateway exited with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> finetune_gateway::Result<()> {
    let config = Config::from_env()?;
    tracing::info!(
        upload_dir = ?config.storage.upload_dir,
        interpreter = ?config.pipeline.interpreter,
        scripts_dir = ?config.pipeline.scripts_dir,
        step_timeout = ?config.pipeline.step_timeout,
        "configuration loaded"
    );

    let gateway = Arc::new(Gateway::new(config).await?);
    run_with_shutdown(gateway).await
}
