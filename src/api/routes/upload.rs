//! Upload handler: store files, run the pipeline, answer with download references.

use crate::api::AppState;
use crate::error::Error;
use crate::gateway::JobOutcome;
use crate::storage::UploadedFile;
use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Multipart field name carrying uploaded files
pub const UPLOAD_FIELD: &str = "files";

/// Successful upload response
///
/// `smart` and `finetune` reference the outputs of the first and second
/// pipeline step; `artifacts` lists every step output in order.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    /// Job the artifacts belong to
    pub job_id: String,
    /// Download reference of the first step's output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smart: Option<String>,
    /// Download reference of the second step's output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finetune: Option<String>,
    /// Download references of all step outputs
    pub artifacts: Vec<String>,
}

impl From<&JobOutcome> for UploadResponse {
    fn from(outcome: &JobOutcome) -> Self {
        let artifacts = outcome.references();
        Self {
            job_id: outcome.job_id.clone(),
            smart: artifacts.first().cloned(),
            finetune: artifacts.get(1).cloned(),
            artifacts,
        }
    }
}

/// POST /api/upload - Upload files and run the pipeline
#[utoipa::path(
    post,
    path = "/api/upload",
    tag = "pipeline",
    request_body(content = Vec<u8>, description = "One or more files in the 'files' field (multipart/form-data)", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Pipeline completed", body = UploadResponse),
        (status = 400, description = "No files or malformed multipart body", body = crate::error::ApiError),
        (status = 413, description = "Upload exceeds the configured size limit", body = crate::error::ApiError),
        (status = 500, description = "A pipeline step failed; body is the step's diagnostic text")
    )
)]
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, Error> {
    let limit = state.config.server.max_upload_bytes;
    let mut uploads = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            tracing::debug!(field = ?field.name(), "ignoring multipart field");
            continue;
        }
        let original_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
        uploads.push(UploadedFile::new(original_name, bytes.to_vec()));
    }

    let outcome = state.gateway.process_upload(uploads).await?;
    Ok(Json(UploadResponse::from(&outcome)))
}

fn multipart_error(error: MultipartError, limit: usize) -> Error {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::UploadTooLarge { limit }
    } else {
        Error::InvalidUpload(format!("malformed multipart body: {}", error.body_text()))
    }
}
