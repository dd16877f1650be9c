//! Sequential, fail-fast pipeline execution

use super::process::{StepExecutor, StepInvocation, StepStatus};
use super::step::Step;
use crate::config::OutputCheck;
use crate::error::{Result, StepError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Output paths of a successful pipeline run, in step order
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    /// One path per step; the initial input alone for an empty pipeline
    pub outputs: Vec<PathBuf>,
}

impl PipelineOutcome {
    /// Path produced by the last step
    pub fn final_output(&self) -> Option<&Path> {
        self.outputs.last().map(PathBuf::as_path)
    }
}

/// Runs an ordered list of steps over one working directory
///
/// Step `i + 1` starts only after step `i` exited with status 0 and passed
/// the output check. The first failure aborts the run; outputs already
/// written stay on disk.
#[derive(Clone)]
pub struct PipelineRunner {
    executor: Arc<dyn StepExecutor>,
    output_check: OutputCheck,
}

impl PipelineRunner {
    /// Create a runner around an executor
    pub fn new(executor: Arc<dyn StepExecutor>, output_check: OutputCheck) -> Self {
        Self {
            executor,
            output_check,
        }
    }

    /// Active output verification policy
    pub fn output_check(&self) -> OutputCheck {
        self.output_check
    }

    /// Run `steps` starting from `input`, writing outputs inside `workdir`
    pub async fn run(&self, steps: &[Step], input: &Path, workdir: &Path) -> Result<PipelineOutcome> {
        if steps.is_empty() {
            return Ok(PipelineOutcome {
                outputs: vec![input.to_path_buf()],
            });
        }

        let mut outputs = Vec::with_capacity(steps.len());
        let mut current = input.to_path_buf();

        for (index, step) in steps.iter().enumerate() {
            let output = step.output_path(workdir);
            let command = step.command_line(&current, &output);
            let invocation = StepInvocation {
                index,
                name: step.name.clone(),
                program: step.program.clone(),
                args: step.arguments(&current, &output),
                input: current.clone(),
                output: output.clone(),
            };

            info!(
                step = %step.name,
                index,
                command = %command,
                executor = self.executor.name(),
                "running pipeline step"
            );
            let started = Instant::now();

            let result = self.executor.execute(&invocation).await.map_err(|e| {
                error!(step = %step.name, command = %command, error = %e, "failed to start step");
                StepError::SpawnFailed {
                    index,
                    command: command.clone(),
                    description: step.description.clone(),
                    reason: e.to_string(),
                }
            })?;

            match result.status {
                StepStatus::Success => {}
                StepStatus::Failed { exit_code } => {
                    error!(
                        step = %step.name,
                        exit_code = ?exit_code,
                        diagnostic = %result.diagnostic,
                        "pipeline step failed"
                    );
                    return Err(StepError::Failed {
                        index,
                        command,
                        description: step.description.clone(),
                        exit_code,
                        diagnostic: result.diagnostic,
                    }
                    .into());
                }
                StepStatus::TimedOut { after } => {
                    error!(
                        step = %step.name,
                        timeout = ?after,
                        diagnostic = %result.diagnostic,
                        "pipeline step timed out"
                    );
                    return Err(StepError::TimedOut {
                        index,
                        command,
                        description: step.description.clone(),
                        timeout: after,
                        diagnostic: result.diagnostic,
                    }
                    .into());
                }
            }

            if !self.output_satisfies_check(&output).await {
                warn!(
                    step = %step.name,
                    path = ?output,
                    policy = ?self.output_check,
                    "step exited successfully without usable output"
                );
                return Err(StepError::MissingOutput {
                    index,
                    command,
                    description: step.description.clone(),
                    path: output,
                }
                .into());
            }

            info!(
                step = %step.name,
                elapsed_ms = started.elapsed().as_millis() as u64,
                output = ?output,
                "pipeline step finished"
            );
            outputs.push(output.clone());
            current = output;
        }

        Ok(PipelineOutcome { outputs })
    }

    async fn output_satisfies_check(&self, output: &Path) -> bool {
        match self.output_check {
            OutputCheck::Trust => true,
            OutputCheck::Exists => tokio::fs::metadata(output)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false),
            OutputCheck::NonEmpty => tokio::fs::metadata(output)
                .await
                .map(|m| m.is_file() && m.len() > 0)
                .unwrap_or(false),
        }
    }
}
