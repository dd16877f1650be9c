//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`upload`] - Upload files and run the pipeline
//! - [`download`] - Serve stored artifacts
//! - [`system`] - Health and OpenAPI

mod download;
mod system;
mod upload;

// Re-export all handlers so `routes::function_name` continues to work
pub use download::*;
pub use system::*;
pub use upload::*;
