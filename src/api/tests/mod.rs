use super::*;
use crate::config::ExecutionMode;
use crate::error::ApiError;
use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use serde_json::json;
use std::time::Duration;
use tempfile::{TempDir, tempdir};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Settings rooted in a fresh temp directory, with `config/dev.toml`
/// fetching `/users` from `server` in local-only mode
async fn test_settings(server: &MockServer) -> (RuntimeSettings, TempDir) {
    let temp = tempdir().unwrap();
    let settings = RuntimeSettings {
        config_dir: temp.path().join("config"),
        output_dir: temp.path().join("output"),
        log_dir: temp.path().join("logs"),
        execution_mode: ExecutionMode::Local,
        ephemeral_dir: temp.path().join("tmp"),
    };
    std::fs::create_dir_all(&settings.config_dir).unwrap();
    std::fs::write(
        settings.config_dir.join("dev.toml"),
        format!(
            r#"
[defaults]
local_only = true
fetch_retries = 1

[[endpoints]]
name = "users"
url = "{}/users"
formats = ["json", "csv"]
"#,
            server.uri()
        ),
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
        .mount(server)
        .await;

    (settings, temp)
}

async fn body_text(response: axum::response::Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

fn output_count(temp: &TempDir) -> usize {
    std::fs::read_dir(temp.path().join("output"))
        .map(|entries| entries.count())
        .unwrap_or(0)
}

#[tokio::test]
async fn test_trigger_defaults_to_dev() {
    let server = MockServer::start().await;
    let (settings, temp) = test_settings(&server).await;
    let app = create_router(AppState::new(settings));

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_text(response).await,
        "Pipeline executed for environment: dev"
    );
    assert_eq!(output_count(&temp), 2);
}

#[tokio::test]
async fn test_trigger_accepts_post_with_env() {
    let server = MockServer::start().await;
    let (settings, temp) = test_settings(&server).await;
    std::fs::copy(
        settings.config_dir.join("dev.toml"),
        settings.config_dir.join("qa.toml"),
    )
    .unwrap();
    let app = create_router(AppState::new(settings));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/?env=qa")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_text(response).await,
        "Pipeline executed for environment: qa"
    );
    assert_eq!(output_count(&temp), 2);
}

#[tokio::test]
async fn test_unknown_environment_is_config_error() {
    let server = MockServer::start().await;
    let (settings, temp) = test_settings(&server).await;
    let app = create_router(AppState::new(settings));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/?env=prod")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let api_error: ApiError = serde_json::from_slice(&body).unwrap();
    assert_eq!(api_error.error.code, "config_error");
    assert!(api_error.error.message.contains("prod.toml"));
    assert_eq!(output_count(&temp), 0);
}

#[tokio::test]
async fn test_upstream_failure_is_bad_gateway() {
    let server = MockServer::start().await;
    let (settings, _temp) = test_settings(&server).await;
    std::fs::write(
        settings.config_dir.join("broken.toml"),
        format!(
            r#"
[defaults]
local_only = true
fetch_retries = 1

[[endpoints]]
name = "gone"
url = "{}/gone"
"#,
            server.uri()
        ),
    )
    .unwrap();
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let app = create_router(AppState::new(settings));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/?env=broken")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let api_error: ApiError = serde_json::from_slice(&body).unwrap();
    assert_eq!(api_error.error.code, "upstream_status");
    assert_eq!(api_error.error.details.unwrap()["status"], 404);
}

#[tokio::test]
async fn test_health_check() {
    let app = create_router(AppState::new(RuntimeSettings::default()));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_api_server_spawns() {
    let settings = RuntimeSettings::default();

    // Port 0 = OS assigns a free port
    let handle = tokio::spawn(start_api_server("127.0.0.1:0".parse().unwrap(), settings));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!handle.is_finished(), "server exited early");
    handle.abort();
}
