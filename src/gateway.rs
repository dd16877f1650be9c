//! Upload-to-artifact orchestration
//!
//! [`Gateway`] ties the storage adapter to the pipeline runner. The HTTP
//! layer in [`crate::api`] is a thin wrapper around it.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::pipeline::{PipelineRunner, ProcessExecutor, Step, StepExecutor, standard_steps};
use crate::storage::{Storage, UploadedFile};
use std::path::PathBuf;
use std::sync::Arc;

/// Route prefix under which artifacts are served
pub const DOWNLOAD_ROUTE: &str = "/api/download";

/// Artifacts produced for one upload
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    /// Job directory name
    pub job_id: String,
    /// Path of the combined input artifact
    pub combined_input: PathBuf,
    /// File names of the step outputs, in step order
    pub artifacts: Vec<String>,
}

impl JobOutcome {
    /// Download reference for an artifact of this job
    pub fn download_reference(&self, name: &str) -> String {
        format!("{DOWNLOAD_ROUTE}/{}/{name}", self.job_id)
    }

    /// Download references for every step output, in step order
    pub fn references(&self) -> Vec<String> {
        self.artifacts
            .iter()
            .map(|name| self.download_reference(name))
            .collect()
    }
}

/// Main gateway instance (cloneable - all fields are cheap to clone)
#[derive(Clone)]
pub struct Gateway {
    pub(crate) config: Arc<Config>,
    pub(crate) storage: Storage,
    pub(crate) runner: PipelineRunner,
    pub(crate) steps: Arc<Vec<Step>>,
}

impl Gateway {
    /// Create a gateway running the standard two-script pipeline as child processes
    ///
    /// Creates the working directory if it does not exist.
    pub async fn new(config: Config) -> Result<Self> {
        let steps = standard_steps(&config.pipeline);
        let executor = Arc::new(ProcessExecutor::from_config(&config.pipeline));
        Self::with_pipeline(config, steps, executor).await
    }

    /// Create a gateway with custom steps and executor
    pub async fn with_pipeline(
        config: Config,
        steps: Vec<Step>,
        executor: Arc<dyn StepExecutor>,
    ) -> Result<Self> {
        let storage = Storage::new(config.storage.upload_dir.clone());
        storage.ensure_root().await?;

        let runner = PipelineRunner::new(executor, config.pipeline.output_check);

        tracing::info!(
            upload_dir = ?storage.root(),
            steps = steps.len(),
            output_check = ?runner.output_check(),
            "gateway initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            storage,
            runner,
            steps: Arc::new(steps),
        })
    }

    /// Active configuration
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Storage adapter
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Configured pipeline steps
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Store uploads in a fresh job, combine them and run the pipeline
    ///
    /// Fails with [`Error::InvalidUpload`] when `uploads` is empty. On a step
    /// failure the job directory and everything written so far are kept.
    pub async fn process_upload(&self, uploads: Vec<UploadedFile>) -> Result<JobOutcome> {
        if uploads.is_empty() {
            return Err(Error::InvalidUpload(
                "no files provided in 'files' field".to_string(),
            ));
        }

        let job = self.storage.allocate_job().await?;
        tracing::info!(
            job_id = %job.id(),
            files = uploads.len(),
            bytes = uploads.iter().map(|u| u.bytes.len()).sum::<usize>(),
            "processing upload"
        );

        self.storage.save_uploads(&job, &uploads).await?;
        let combined_input = self.storage.write_combined(&job, &uploads).await?;

        let outcome = self
            .runner
            .run(&self.steps, &combined_input, job.path())
            .await
            .inspect_err(|e| tracing::error!(job_id = %job.id(), error = %e, "job failed"))?;

        let artifacts = outcome
            .outputs
            .iter()
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();

        tracing::info!(job_id = %job.id(), "job completed");
        Ok(JobOutcome {
            job_id: job.id().to_string(),
            combined_input,
            artifacts,
        })
    }

    /// Read an artifact from the working directory or from a job directory
    pub async fn download(&self, job: Option<&str>, name: &str) -> Result<Vec<u8>> {
        self.storage.retrieve(job, name).await
    }

    /// Spawn the API server in a background task
    ///
    /// Returns a JoinHandle that resolves when the server stops.
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let gateway = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(gateway, config).await })
    }
}
