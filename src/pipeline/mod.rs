//! External transformation pipeline
//!
//! A pipeline is an ordered list of [`Step`]s sharing one working directory.
//! Each step is an external program that reads the previous step's output
//! file and writes its own; the contract between steps is the file path, not
//! anything in memory.
//!
//! - [`step`] - step definitions and the standard two-step pipeline
//! - [`process`] - the [`StepExecutor`] seam and the child-process executor
//! - [`runner`] - sequential, fail-fast orchestration

pub mod process;
pub mod runner;
pub mod step;

pub use process::{ProcessExecutor, StepExecutor, StepInvocation, StepOutput, StepStatus};
pub use runner::{PipelineOutcome, PipelineRunner};
pub use step::{
    FINETUNE_OUTPUT_NAME, SMART_OUTPUT_NAME, Step, StepArg, script_step, standard_steps,
};
