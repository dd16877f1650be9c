//! Download handlers.

use crate::api::AppState;
use crate::error::Error;
use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

/// GET /api/download/:filename - Download a file from the working directory
#[utoipa::path(
    get,
    path = "/api/download/{filename}",
    tag = "pipeline",
    params(
        ("filename" = String, Path, description = "File name inside the working directory")
    ),
    responses(
        (status = 200, description = "File contents"),
        (status = 400, description = "Name is not a plain file name", body = crate::error::ApiError),
        (status = 404, description = "File not found")
    )
)]
pub async fn download_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, Error> {
    serve_artifact(&state, None, &filename).await
}

/// GET /api/download/:job_id/:filename - Download an artifact of one job
#[utoipa::path(
    get,
    path = "/api/download/{job_id}/{filename}",
    tag = "pipeline",
    params(
        ("job_id" = String, Path, description = "Job id returned by the upload endpoint"),
        ("filename" = String, Path, description = "Artifact file name")
    ),
    responses(
        (status = 200, description = "File contents"),
        (status = 400, description = "Name is not a plain file name", body = crate::error::ApiError),
        (status = 404, description = "File not found")
    )
)]
pub async fn download_job_file(
    State(state): State<AppState>,
    Path((job_id, filename)): Path<(String, String)>,
) -> Result<Response, Error> {
    serve_artifact(&state, Some(&job_id), &filename).await
}

async fn serve_artifact(state: &AppState, job: Option<&str>, filename: &str) -> Result<Response, Error> {
    let bytes = state.gateway.download(job, filename).await?;
    tracing::debug!(job_id = ?job, file = %filename, bytes = bytes.len(), "serving artifact");

    let disposition = format!(
        "attachment; filename=\"{}\"",
        filename.replace('\\', "\\\\").replace('"', "\\\"")
    );
    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(filename).to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

fn content_type_for(filename: &str) -> &'static str {
    match std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
    {
        Some("jsonl") => "application/jsonl",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
