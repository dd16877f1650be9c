//! HTTP error response handling for the API
//!
//! Step failures and missing downloads are answered with plain text so
//! clients can show the diagnostic as-is; everything else gets a JSON
//! [`ApiError`] body.

use crate::error::{ApiError, Error, ToHttpStatus};
use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Implement IntoResponse for Error to automatically convert errors to HTTP responses
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match self {
            Error::Step(_) | Error::NotFound(_) => {
                (status_code, [(header::CONTENT_TYPE, TEXT_PLAIN)], self.to_string()).into_response()
            }
            other => {
                let api_error: ApiError = other.into();
                (status_code, Json(api_error)).into_response()
            }
        }
    }
}

/// Implement IntoResponse for ApiError for explicit error responses
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Default to 500 if we're directly converting an ApiError
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self)).into_response()
    }
}
