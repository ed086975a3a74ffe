//! `HttpRemoteClient` against a stub processing service on localhost.

mod common;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use common::spawn_server;
use futures::StreamExt;
use serde_json::json;
use sheetgate::{ErrorKind, GatewayConfig, GatewayError, HttpRemoteClient, RemotePipeline};
use sheetgate_protocol::ArtifactRole;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Uploads the stub has received: (field name, file name, byte count).
type Received = Arc<Mutex<Vec<(String, String, usize)>>>;

async fn record_upload(State(received): State<Received>, mut multipart: Multipart) -> impl IntoResponse {
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.unwrap();
        received.lock().unwrap().push((name, file_name, bytes.len()));
    }
    Json(json!({"status": "success", "message": "File uploaded", "saved_path": "/srv/x"}))
}

fn client_for(addr: SocketAddr) -> HttpRemoteClient {
    let config = GatewayConfig::default().with_remote_base_url(format!("http://{}", addr));
    HttpRemoteClient::new(&config).unwrap()
}

async fn staged_file(dir: &std::path::Path, name: &str, len: usize) -> std::path::PathBuf {
    let path = dir.join(name);
    tokio::fs::write(&path, vec![1u8; len]).await.unwrap();
    path
}

#[tokio::test]
async fn test_push_streams_file_under_role_field() {
    let received: Received = Arc::default();
    let app = Router::new()
        .route("/upload_raw", post(record_upload))
        .route("/upload_master", post(record_upload))
        .with_state(received.clone());
    let client = client_for(spawn_server(app).await);
    let tmp = tempfile::tempdir().unwrap();

    let raw = staged_file(tmp.path(), "raw_data.xlsx", 10).await;
    let master = staged_file(tmp.path(), "master_file.xlsx", 20).await;
    let ack = client.push_artifact(&raw, ArtifactRole::Raw).await.unwrap();
    assert_eq!(ack.role, ArtifactRole::Raw);
    assert_eq!(ack.message, "File uploaded");
    client
        .push_artifact(&master, ArtifactRole::Master)
        .await
        .unwrap();

    let received = received.lock().unwrap().clone();
    assert_eq!(
        received,
        vec![
            ("raw_data".to_string(), "raw_data.xlsx".to_string(), 10),
            ("master_file".to_string(), "master_file.xlsx".to_string(), 20),
        ]
    );
}

#[tokio::test]
async fn test_push_rejection_keeps_remote_status_and_message() {
    let app = Router::new().route(
        "/upload_raw",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"status": "error", "message": "bad format"})),
            )
        }),
    );
    let client = client_for(spawn_server(app).await);
    let tmp = tempfile::tempdir().unwrap();
    let raw = staged_file(tmp.path(), "raw_data.xlsx", 10).await;

    let err = client.push_artifact(&raw, ArtifactRole::Raw).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteRejected);
    assert_eq!(err.status_code(), 400);
    assert_eq!(err.to_string(), "bad format");
}

#[tokio::test]
async fn test_run_status_field_is_authoritative() {
    let app = Router::new().route(
        "/run_pipeline",
        post(|| async { Json(json!({"status": "error", "message": "Master file not found"})) }),
    );
    let client = client_for(spawn_server(app).await);

    let err = client.trigger_run().await.unwrap_err();
    assert!(matches!(err, GatewayError::RemotePipelineFailed { status: 200, .. }));
    assert_eq!(err.status_code(), 500);
    assert_eq!(err.to_string(), "Master file not found");
}

#[tokio::test]
async fn test_run_success_returns_remote_message() {
    let app = Router::new().route(
        "/run_pipeline",
        post(|| async { Json(json!({"status": "success", "message": "ok"})) }),
    );
    let client = client_for(spawn_server(app).await);

    let summary = client.trigger_run().await.unwrap();
    assert_eq!(summary.message, "ok");
}

#[tokio::test]
async fn test_fetch_streams_body_and_maps_404() {
    let app = Router::new().route("/download_mapped", get(|| async { vec![5u8, 4, 3, 2, 1] }));
    let client = client_for(spawn_server(app).await);

    let mut stream = client.fetch_result().await.unwrap();
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        body.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(body, vec![5, 4, 3, 2, 1]);

    let missing = Router::new().route(
        "/download_mapped",
        get(|| async {
            (
                StatusCode::NOT_FOUND,
                Json(json!({"status": "error", "message": "Mapped file not found"})),
            )
        }),
    );
    let client = client_for(spawn_server(missing).await);
    let err = match client.fetch_result().await {
        Ok(_) => panic!("expected a missing result"),
        Err(e) => e,
    };
    assert!(matches!(err, GatewayError::NotFound(_)));
}

#[tokio::test]
async fn test_reset_non_json_failure_uses_fallback_message() {
    let app = Router::new().route(
        "/reset",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let client = client_for(spawn_server(app).await);

    let err = client.reset_remote().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteRejected);
    assert_eq!(err.status_code(), 500);
    assert!(err.to_string().contains("reset"));
}

#[tokio::test]
async fn test_unreachable_service_is_unavailable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = client_for(addr);

    let err = client.trigger_run().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteUnavailable);
    assert_eq!(err.status_code(), 503);
}

#[tokio::test]
async fn test_timeout_is_unavailable() {
    let app = Router::new().route(
        "/reset",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({"status": "success", "message": "late"}))
        }),
    );
    let addr = spawn_server(app).await;
    let mut config = GatewayConfig::default().with_remote_base_url(format!("http://{}", addr));
    config.request_timeout = Duration::from_millis(200);
    let client = HttpRemoteClient::new(&config).unwrap();

    let err = client.reset_remote().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteUnavailable);
    assert!(err.to_string().contains("did not respond in time"));
}
