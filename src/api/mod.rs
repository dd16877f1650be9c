//! REST API server module
//!
//! Exposes the upload → pipeline → download flow over HTTP, plus a health
//! probe and an OpenAPI description.

use crate::{Config, Gateway, Result};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Path the OpenAPI document is served at
pub const OPENAPI_ROUTE: &str = "/api/openapi.json";

/// Create the API router with all route definitions
///
/// # Routes
///
/// - `GET /api/health` - Liveness probe
/// - `POST /api/upload` - Upload files and run the pipeline
/// - `GET /api/download/:filename` - Download a file from the working directory
/// - `GET /api/download/:job_id/:filename` - Download an artifact of one job
/// - `GET /api/openapi.json` - OpenAPI specification
/// - `GET /swagger-ui/` - Interactive Swagger UI documentation (if enabled)
pub fn create_router(gateway: Arc<Gateway>, config: Arc<Config>) -> Router {
    let state = AppState::new(gateway, config.clone());

    let router = Router::new()
        .route("/api/health", get(routes::health_check))
        .route("/api/upload", post(routes::upload))
        .route("/api/download/:filename", get(routes::download_file))
        .route(
            "/api/download/:job_id/:filename",
            get(routes::download_job_file),
        );

    // Swagger UI serves the document itself; registering both would overlap
    let router = if config.server.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url(OPENAPI_ROUTE, ApiDoc::openapi()))
    } else {
        router.route(OPENAPI_ROUTE, get(routes::openapi_spec))
    };

    let router = router
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
        .layer(TraceLayer::new_for_http());

    // CORS is outermost so preflight requests never reach the handlers
    if config.server.cors_enabled {
        router.layer(build_cors_layer(&config.server.cors_origins))
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` anywhere in the list (or an empty list) allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Runs until the server fails. Use [`serve_with_shutdown`] to stop it on a
/// signal.
///
/// # Example
///
/// ```no_run
/// use finetune_gateway::{Config, Gateway};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let gateway = Arc::new(Gateway::new((*config).clone()).await?);
///
/// finetune_gateway::api::start_api_server(gateway, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(gateway: Arc<Gateway>, config: Arc<Config>) -> Result<()> {
    serve_with_shutdown(gateway, config, std::future::pending()).await
}

/// Serve the API until `shutdown` resolves, then drain in-flight requests
pub async fn serve_with_shutdown<F>(
    gateway: Arc<Gateway>,
    config: Arc<Config>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let bind_address = config.server.bind_address;

    tracing::info!(
        address = %bind_address,
        "Starting API server"
    );

    let app = create_router(gateway, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %listener.local_addr().unwrap_or(bind_address),
        "API server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
