//! External process execution for pipeline steps

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::config::PipelineConfig;

/// Size of each read from a step's error stream
const DRAIN_CHUNK_SIZE: usize = 8 * 1024;

/// Shortest time spent collecting error output after a step exits
const MIN_DRAIN_WINDOW: Duration = Duration::from_secs(1);

/// Fully expanded description of one step run
#[derive(Debug, Clone)]
pub struct StepInvocation {
    /// Position of the step in the pipeline
    pub index: usize,
    /// Step name for logs
    pub name: String,
    /// Executable
    pub program: PathBuf,
    /// Arguments with input and output paths substituted
    pub args: Vec<OsString>,
    /// Path the step reads
    pub input: PathBuf,
    /// Path the step is expected to write
    pub output: PathBuf,
}

/// How a step process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// Exit code 0
    Success,
    /// Non-zero exit code, or `None` when killed by a signal
    Failed {
        /// Exit code if the process exited normally
        exit_code: Option<i32>,
    },
    /// Exceeded its time limit and was killed
    TimedOut {
        /// The limit that was exceeded
        after: Duration,
    },
}

/// Result of running one step
#[must_use]
#[derive(Debug, Clone)]
pub struct StepOutput {
    /// How the process ended
    pub status: StepStatus,
    /// Everything the process wrote to its error stream, lossily decoded
    pub diagnostic: String,
}

impl StepOutput {
    /// Whether the step exited with status 0
    pub fn success(&self) -> bool {
        self.status == StepStatus::Success
    }
}

/// Runs a single step invocation
///
/// The production implementation is [`ProcessExecutor`]. Tests substitute
/// in-process fakes to observe which steps were invoked.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Run the step to completion
    ///
    /// Returns `Err` only when the step could not be started; every outcome
    /// of a started process, including a failed wait, is reported through
    /// [`StepOutput`].
    async fn execute(&self, invocation: &StepInvocation) -> std::io::Result<StepOutput>;

    /// Name of the executor implementation
    fn name(&self) -> &'static str;
}

/// Executes steps as child processes
///
/// Standard input is closed, standard output is discarded and standard error
/// is drained by a separate task while the process runs, so a step that
/// writes a lot of diagnostics never blocks on a full pipe.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    timeout: Option<Duration>,
    kill_grace: Duration,
    current_dir: Option<PathBuf>,
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessExecutor {
    /// Executor without a time limit
    pub fn new() -> Self {
        Self {
            timeout: None,
            kill_grace: Duration::from_secs(5),
            current_dir: None,
        }
    }

    /// Executor using the configured time limit and kill grace period
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            timeout: config.step_timeout,
            kill_grace: config.kill_grace,
            current_dir: None,
        }
    }

    /// Set the per-step time limit
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the delay between SIGTERM and SIGKILL
    #[must_use]
    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    /// Run steps from a fixed working directory instead of the gateway's
    #[must_use]
    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }
}

#[async_trait]
impl StepExecutor for ProcessExecutor {
    async fn execute(&self, invocation: &StepInvocation) -> std::io::Result<StepOutput> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn()?;
        tracing::debug!(
            step = %invocation.name,
            pid = ?child.id(),
            "step process started"
        );

        let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel();
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_stream(stderr, invocation.name.clone(), chunk_tx));
        }

        let ending = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(waited) => Ending::from_wait(waited),
                Err(_) => {
                    tracing::warn!(
                        step = %invocation.name,
                        timeout = ?limit,
                        "step timed out, terminating"
                    );
                    terminate(&mut child, self.kill_grace).await;
                    Ending::TimedOut(limit)
                }
            },
            None => Ending::from_wait(child.wait().await),
        };
        if let Ending::WaitFailed(e) = &ending {
            tracing::error!(step = %invocation.name, error = %e, "failed to wait for step process");
            if let Err(e) = child.start_kill() {
                tracing::warn!(step = %invocation.name, error = %e, "failed to kill step process");
            }
        }

        // The process is gone; collect what is left in the pipe. A grandchild
        // that inherited the stream can keep it open, so the wait is bounded.
        let mut diagnostic = Vec::new();
        let deadline = tokio::time::Instant::now() + self.kill_grace.max(MIN_DRAIN_WINDOW);
        while let Ok(Some(chunk)) = tokio::time::timeout_at(deadline, chunk_rx.recv()).await {
            diagnostic.extend_from_slice(&chunk);
        }
        let mut diagnostic = String::from_utf8_lossy(&diagnostic).into_owned();
        if let Ending::WaitFailed(e) = &ending {
            diagnostic.push_str(&format!("failed to wait for step process: {e}\n"));
        }

        let status = ending.status();
        Ok(StepOutput { status, diagnostic })
    }

    fn name(&self) -> &'static str {
        "process"
    }
}

/// How waiting on a step process came to an end
#[derive(Debug)]
enum Ending {
    Exited(ExitStatus),
    WaitFailed(std::io::Error),
    TimedOut(Duration),
}

impl Ending {
    fn from_wait(waited: std::io::Result<ExitStatus>) -> Self {
        match waited {
            Ok(status) => Ending::Exited(status),
            Err(e) => Ending::WaitFailed(e),
        }
    }

    /// A failed wait counts as a failed step; the process did start
    fn status(&self) -> StepStatus {
        match self {
            Ending::Exited(status) if status.success() => StepStatus::Success,
            Ending::Exited(status) => StepStatus::Failed {
                exit_code: status.code(),
            },
            Ending::WaitFailed(_) => StepStatus::Failed { exit_code: None },
            Ending::TimedOut(after) => StepStatus::TimedOut { after: *after },
        }
    }
}

/// Forward chunks of `stream` until EOF
async fn drain_stream<R>(mut stream: R, step: String, chunks: mpsc::UnboundedSender<Vec<u8>>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; DRAIN_CHUNK_SIZE];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                tracing::debug!(
                    step = %step,
                    text = %String::from_utf8_lossy(&buf[..n]),
                    "step diagnostic output"
                );
                if chunks.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(step = %step, error = %e, "failed to read step error stream");
                break;
            }
        }
    }
}

/// Ask the child to exit, then kill it if it is still running after `grace`
async fn terminate(child: &mut Child, grace: Duration) {
    if send_terminate(child) && tokio::time::timeout(grace, child.wait()).await.is_ok() {
        return;
    }
    if let Err(e) = child.start_kill() {
        tracing::warn!(error = %e, "failed to kill step process");
    }
    if let Err(e) = child.wait().await {
        tracing::warn!(error = %e, "failed to reap step process");
    }
}

#[cfg(unix)]
fn send_terminate(child: &Child) -> bool {
    let Some(pid) = child.id() else {
        return false;
    };
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: `pid` is our own child and has not been reaped (id() is Some)
    unsafe { libc::kill(pid, libc::SIGTERM) == 0 }
}

#[cfg(not(unix))]
fn send_terminate(_child: &Child) -> bool {
    false
}
