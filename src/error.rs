//! Error types for finetune-gateway
//!
//! This module provides the error taxonomy for the gateway, including:
//! - Domain-specific error types (storage, pipeline steps, configuration)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for finetune-gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for finetune-gateway
///
/// Errors are never recovered locally; they propagate to the HTTP boundary
/// where [`ToHttpStatus`] decides how each one is reported.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "PORT")
        key: Option<String>,
    },

    /// Saving or reading an artifact failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A pipeline step did not complete successfully
    #[error("{0}")]
    Step(#[from] StepError),

    /// Requested artifact does not exist
    #[error("File not found: {0}")]
    NotFound(String),

    /// Upload request was malformed or carried no files
    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    /// Upload body exceeded the configured size limit
    #[error("upload exceeds the {limit} byte limit")]
    UploadTooLarge {
        /// Configured limit in bytes
        limit: usize,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),
}

/// Storage adapter errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Working or job directory could not be created
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Artifact could not be written
    #[error("failed to write {path}: {source}")]
    Write {
        /// Destination path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Artifact exists but could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        /// Source path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Name is not a single safe path component
    #[error("invalid file name {name:?}: {reason}")]
    InvalidName {
        /// The rejected name
        name: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Pipeline step failures
///
/// Every variant carries the zero-based step index, the command that was run
/// and the human-readable step description used in user-facing messages.
#[derive(Debug, Error)]
pub enum StepError {
    /// Step process exited with a non-zero status
    #[error("Error {description}:\n{diagnostic}")]
    Failed {
        /// Position of the step in the pipeline
        index: usize,
        /// Program and arguments as a display string
        command: String,
        /// Step description (e.g., "generating smart JSONL")
        description: String,
        /// Exit code, `None` when the process was terminated by a signal
        exit_code: Option<i32>,
        /// Everything the step wrote to its error stream
        diagnostic: String,
    },

    /// Step process exceeded its time limit and was killed
    #[error("Error {description}: timed out after {timeout:?}\n{diagnostic}")]
    TimedOut {
        /// Position of the step in the pipeline
        index: usize,
        /// Program and arguments as a display string
        command: String,
        /// Step description
        description: String,
        /// The limit that was exceeded
        timeout: Duration,
        /// Error stream output captured before the kill
        diagnostic: String,
    },

    /// Step process could not be started at all
    #[error("Error {description}: failed to start {command}: {reason}")]
    SpawnFailed {
        /// Position of the step in the pipeline
        index: usize,
        /// Program and arguments as a display string
        command: String,
        /// Step description
        description: String,
        /// Reason reported by the operating system
        reason: String,
    },

    /// Step exited successfully but its declared output is missing or empty
    #[error("Error {description}: step exited successfully but produced no output at {path}")]
    MissingOutput {
        /// Position of the step in the pipeline
        index: usize,
        /// Program and arguments as a display string
        command: String,
        /// Step description
        description: String,
        /// Declared output path
        path: PathBuf,
    },
}

impl StepError {
    /// Zero-based index of the failing step
    pub fn index(&self) -> usize {
        match self {
            StepError::Failed { index, .. }
            | StepError::TimedOut { index, .. }
            | StepError::SpawnFailed { index, .. }
            | StepError::MissingOutput { index, .. } => *index,
        }
    }

    /// Command line of the failing step
    pub fn command(&self) -> &str {
        match self {
            StepError::Failed { command, .. }
            | StepError::TimedOut { command, .. }
            | StepError::SpawnFailed { command, .. }
            | StepError::MissingOutput { command, .. } => command,
        }
    }

    /// Captured error-stream text, empty for failures that never produced any
    pub fn diagnostic(&self) -> &str {
        match self {
            StepError::Failed { diagnostic, .. } | StepError::TimedOut { diagnostic, .. } => {
                diagnostic
            }
            StepError::SpawnFailed { .. } | StepError::MissingOutput { .. } => "",
        }
    }
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs that is
/// not one of the plain-text contracts (step failure, missing download).
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "invalid_filename",
///     "message": "storage error: invalid file name \"..\": parent directory reference",
///     "details": { "name": ".." }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "invalid_upload")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,
            Error::InvalidUpload(_) => 400,
            Error::Storage(StorageError::InvalidName { .. }) => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,

            // 413 Payload Too Large
            Error::UploadTooLarge { .. } => 413,

            // 500 Internal Server Error - Server-side issues
            Error::Storage(_) => 500,
            Error::Step(_) => 500,
            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Storage(e) => match e {
                StorageError::CreateDir { .. } => "storage_error",
                StorageError::Write { .. } => "storage_error",
                StorageError::Read { .. } => "storage_error",
                StorageError::InvalidName { .. } => "invalid_filename",
            },
            Error::Step(e) => match e {
                StepError::Failed { .. } => "step_failed",
                StepError::TimedOut { .. } => "step_timed_out",
                StepError::SpawnFailed { .. } => "step_spawn_failed",
                StepError::MissingOutput { .. } => "step_missing_output",
            },
            Error::NotFound(_) => "not_found",
            Error::InvalidUpload(_) => "invalid_upload",
            Error::UploadTooLarge { .. } => "upload_too_large",
            Error::Io(_) => "io_error",
            Error::ApiServerError(_) => "api_server_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            Error::Storage(StorageError::InvalidName { name, .. }) => Some(serde_json::json!({
                "name": name,
            })),
            Error::UploadTooLarge { limit } => Some(serde_json::json!({
                "limit_bytes": limit,
            })),
            Error::Step(step) => Some(serde_json::json!({
                "step_index": step.index(),
                "command": step.command(),
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
