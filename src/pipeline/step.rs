//! Pipeline step definitions

use crate::config::PipelineConfig;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// File name of the first step's output
pub const SMART_OUTPUT_NAME: &str = "memories.jsonl";

/// File name of the second step's output
pub const FINETUNE_OUTPUT_NAME: &str = "finetune_data.jsonl";

/// One element of a step's argument template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepArg {
    /// Passed through unchanged
    Literal(OsString),
    /// Replaced by the step's input path
    Input,
    /// Replaced by the step's output path
    Output,
}

impl StepArg {
    /// Literal argument
    pub fn literal(value: impl Into<OsString>) -> Self {
        StepArg::Literal(value.into())
    }
}

/// One external transformation: file in, file out
///
/// Immutable once built; the gateway defines its steps at startup.
#[derive(Debug, Clone)]
pub struct Step {
    /// Short identifier used in logs (e.g., "generate_jsonl_smart")
    pub name: String,
    /// What the step does, used in user-facing failure messages
    pub description: String,
    /// Executable to run
    pub program: PathBuf,
    /// Argument template
    pub args: Vec<StepArg>,
    /// File name the step writes inside the job directory
    pub output_name: String,
}

impl Step {
    /// Create a step with an empty argument template
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        program: impl Into<PathBuf>,
        output_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            program: program.into(),
            args: Vec::new(),
            output_name: output_name.into(),
        }
    }

    /// Append a literal argument
    #[must_use]
    pub fn arg(mut self, value: impl Into<OsString>) -> Self {
        self.args.push(StepArg::literal(value));
        self
    }

    /// Append the input path placeholder
    #[must_use]
    pub fn input_arg(mut self) -> Self {
        self.args.push(StepArg::Input);
        self
    }

    /// Append the output path placeholder
    #[must_use]
    pub fn output_arg(mut self) -> Self {
        self.args.push(StepArg::Output);
        self
    }

    /// Expand the argument template for concrete paths
    pub fn arguments(&self, input: &Path, output: &Path) -> Vec<OsString> {
        self.args
            .iter()
            .map(|arg| match arg {
                StepArg::Literal(value) => value.clone(),
                StepArg::Input => input.as_os_str().to_owned(),
                StepArg::Output => output.as_os_str().to_owned(),
            })
            .collect()
    }

    /// Where this step writes when run inside `dir`
    pub fn output_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.output_name)
    }

    /// Program and expanded arguments, for logs and error reports
    pub fn command_line(&self, input: &Path, output: &Path) -> String {
        std::iter::once(self.program.as_os_str().to_owned())
            .chain(self.arguments(input, output))
            .map(|part| part.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A script step in the `<interpreter> <script> --input <in> --output <out>` shape
pub fn script_step(
    interpreter: &Path,
    script: PathBuf,
    name: &str,
    description: &str,
    output_name: &str,
) -> Step {
    Step::new(name, description, interpreter, output_name)
        .arg(script)
        .arg("--input")
        .input_arg()
        .arg("--output")
        .output_arg()
}

/// The two-step chat-to-fine-tune pipeline
///
/// 1. `generate_jsonl_smart.py`: combined upload -> `memories.jsonl`
/// 2. `prepare_finetune_dataset.py`: `memories.jsonl` -> `finetune_data.jsonl`
pub fn standard_steps(config: &PipelineConfig) -> Vec<Step> {
    let interpreter = config.resolve_interpreter();
    vec![
        script_step(
            &interpreter,
            config.scripts_dir.join("generate_jsonl_smart.py"),
            "generate_jsonl_smart",
            "generating smart JSONL",
            SMART_OUTPUT_NAME,
        ),
        script_step(
            &interpreter,
            config.scripts_dir.join("prepare_finetune_dataset.py"),
            "prepare_finetune_dataset",
            "preparing fine-tune JSONL",
            FINETUNE_OUTPUT_NAME,
        ),
    ]
}
