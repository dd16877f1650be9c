use super::*;
use crate::pipeline::{ProcessExecutor, Step};
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use std::time::Duration;
use tempfile::tempdir;
use tower::ServiceExt;


const BOUNDARY: &str = "----FinetuneGatewayBoundary7MA4YWxk";

/// Create a gateway over a temp working directory with the given steps
async fn create_test_gateway(steps: Vec<Step>) -> (Arc<Gateway>, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let mut config = Config::default();
    config.storage.upload_dir = temp_dir.path().join("uploads");
    config.server.bind_address = "127.0.0.1:0".parse().unwrap();

    let gateway = Gateway::with_pipeline(config, steps, Arc::new(ProcessExecutor::new()))
        .await
        .unwrap();
    (Arc::new(gateway), temp_dir)
}

/// Two steps that copy their input to their output unchanged
fn identity_steps() -> Vec<Step> {
    vec![
        Step::new("smart", "generating smart JSONL", "cp", "memories.jsonl")
            .input_arg()
            .output_arg(),
        Step::new(
            "finetune",
            "preparing fine-tune JSONL",
            "cp",
            "finetune_data.jsonl",
        )
        .input_arg()
        .output_arg(),
    ]
}

fn router_for(gateway: &Arc<Gateway>) -> Router {
    create_router(gateway.clone(), gateway.config().clone())
}

/// Build a multipart body from (field, filename, content) triples
fn multipart_body(parts: &[(&str, &str, &str)]) -> String {
    let mut body = String::new();
    for (field, filename, content) in parts {
        body.push_str(&format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: text/plain\r\n\
             \r\n\
             {content}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body
}

fn upload_request(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (gateway, _temp_dir) = create_test_gateway(vec![]).await;
    let app = router_for(&gateway);

    let request = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_cors_enabled() {
    let (gateway, _temp_dir) = create_test_gateway(vec![]).await;
    let app = router_for(&gateway);

    let request = Request::builder()
        .uri("/api/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_cors_preflight_for_upload() {
    let (gateway, _temp_dir) = create_test_gateway(vec![]).await;
    let app = router_for(&gateway);

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/upload")
        .header("Origin", "https://frontend.example")
        .header("Access-Control-Request-Method", "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(response.status().is_success());
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-methods")
    );
}

#[tokio::test]
async fn test_cors_restricted_origins() {
    let (gateway, _temp_dir) = create_test_gateway(vec![]).await;
    let mut config = (**gateway.config()).clone();
    config.server.cors_origins = vec!["https://allowed.example".to_string()];
    let app = create_router(gateway.clone(), Arc::new(config));

    let allowed = Request::builder()
        .uri("/api/health")
        .header("Origin", "https://allowed.example")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(allowed).await.unwrap();
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "https://allowed.example"
    );

    let denied = Request::builder()
        .uri("/api/health")
        .header("Origin", "https://evil.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(denied).await.unwrap();
    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let (gateway, _temp_dir) = create_test_gateway(vec![]).await;
    let mut config = (**gateway.config()).clone();
    config.server.cors_enabled = false;
    let app = create_router(gateway.clone(), Arc::new(config));

    let request = Request::builder()
        .uri("/api/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_default_router_serves_openapi_and_swagger_ui() {
    let (gateway, _temp_dir) = create_test_gateway(vec![]).await;
    assert!(gateway.config().server.swagger_ui);
    let app = router_for(&gateway);

    let response = app
        .clone()
        .oneshot(Request::builder().uri(OPENAPI_ROUTE).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert!(json["paths"]["/api/upload"].is_object());
    assert!(json["paths"]["/api/download/{job_id}/{filename}"].is_object());

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/swagger-ui/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::builder().uri("/swagger-ui").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(
        response.status().is_success() || response.status().is_redirection(),
        "unexpected status {} for /swagger-ui",
        response.status()
    );
}

#[tokio::test]
async fn test_openapi_served_without_swagger_ui() {
    let (gateway, _temp_dir) = create_test_gateway(vec![]).await;
    let mut config = (**gateway.config()).clone();
    config.server.swagger_ui = false;
    let app = create_router(gateway.clone(), Arc::new(config));

    let response = app
        .clone()
        .oneshot(Request::builder().uri(OPENAPI_ROUTE).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert!(json["paths"]["/api/health"].is_object());

    let response = app
        .oneshot(Request::builder().uri("/swagger-ui/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_default_config_server_answers_health_over_tcp() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let (gateway, _temp_dir) = create_test_gateway(vec![]).await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router_for(&gateway);
    let server = tokio::spawn(async move { axum::serve(listener, app).await });

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /api/health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200"), "got {response}");
    assert!(response.contains("\"status\":\"ok\""));
    server.abort();
}

#[tokio::test]
async fn test_api_server_spawns_and_stops() {
    let (gateway, _temp_dir) = create_test_gateway(vec![]).await;
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

    let handle = tokio::spawn({
        let gateway = gateway.clone();
        let config = gateway.config().clone();
        async move {
            serve_with_shutdown(gateway, config, async {
                stop_rx.await.ok();
            })
            .await
        }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    stop_tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server should stop after shutdown signal")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_spawn_api_server_method() {
    let (gateway, _temp_dir) = create_test_gateway(vec![]).await;

    let api_handle = gateway.spawn_api_server();
    tokio::time::sleep(Duration::from_millis(100)).await;
    // Building the router with the default config must not panic
    assert!(!api_handle.is_finished(), "server should still be running");

    api_handle.abort();
}
