//! # finetune-gateway
//!
//! HTTP gateway in front of a two-step JSONL generation pipeline.
//!
//! Clients upload one or more chat exports. The gateway concatenates them
//! into a single input file, runs the smart-JSONL generator and then the
//! fine-tune dataset preparer as child processes, and hands back download
//! references for the produced artifacts.
//!
//! Every upload gets its own job directory under the working directory, so
//! concurrent requests never overwrite each other's files.
//!
//! ## Quick Start
//!
//! ```no_run
//! use finetune_gateway::{Config, Gateway, run_with_shutdown};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let gateway = Arc::new(Gateway::new(config).await?);
//!
//!     // Serve until SIGTERM or Ctrl+C
//!     run_with_shutdown(gateway).await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Upload-to-artifact orchestration
pub mod gateway;
/// External processing steps
pub mod pipeline;
/// Working directory and job directories
pub mod storage;

use std::sync::Arc;

// Re-export commonly used types
pub use config::{ApiConfig, Config, OutputCheck, PipelineConfig, StorageConfig};
pub use error::{ApiError, Error, ErrorDetail, Result, StepError, StorageError, ToHttpStatus};
pub use gateway::{Gateway, JobOutcome};
pub use pipeline::{
    PipelineOutcome, PipelineRunner, ProcessExecutor, Step, StepArg, StepExecutor,
    StepInvocation, StepOutput, StepStatus, standard_steps,
};
pub use storage::{Storage, UploadedFile};

/// Serve the API until a termination signal arrives.
///
/// In-flight requests are allowed to finish before this returns. Child
/// processes of requests that are dropped mid-flight are killed.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use finetune_gateway::{Config, Gateway, run_with_shutdown};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let gateway = Arc::new(Gateway::new(Config::default()).await?);
///     run_with_shutdown(gateway).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(gateway: Arc<Gateway>) -> Result<()> {
    let config = gateway.config().clone();
    api::serve_with_shutdown(gateway, config, wait_for_signal()).await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, falling back to ctrl_c");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            std::future::pending::<()>().await;
        }
    }
}
