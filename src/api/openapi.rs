//! OpenAPI documentation and schema generation
//!
//! Generated at compile time with utoipa and served at `/api/openapi.json`
//! (and through Swagger UI at `/swagger-ui` when enabled).

use utoipa::OpenApi;

/// OpenAPI documentation for the finetune-gateway REST API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "finetune-gateway REST API",
        version = "0.1.0",
        description = "Upload chat exports, run the JSONL generation pipeline and download the results",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:4000", description = "Local development server")
    ),
    paths(
        crate::api::routes::upload,
        crate::api::routes::download_file,
        crate::api::routes::download_job_file,
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(
        schemas(
            crate::api::routes::UploadResponse,
            crate::error::ApiError,
            crate::error::ErrorDetail,
        )
    ),
    tags(
        (name = "pipeline", description = "Upload and download"),
        (name = "system", description = "Health and documentation")
    )
)]
pub struct ApiDoc;
