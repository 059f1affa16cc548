//! E2E tests for the upload endpoint

mod common;

use std::sync::Arc;

use axum::body::Body;
use bytego::AppState;
use bytego::clock::SystemClock;
use bytego::storage::{ObjectStore, PutObject, StorageError};
use bytes::Bytes;
use common::{PUBLIC_URL, SECRET, TestServer, message};
use tower::ServiceExt;

#[tokio::test]
async fn test_upload_returns_public_url() {
    let server = TestServer::new().await;

    let response = server
        .upload(Some(SECRET), None, "a.txt", b"0123456789".to_vec())
        .await;

    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-request-id"));

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["msg"], "success");

    let url = body["url"].as_str().unwrap();
    let today = chrono::Utc::now().format("%Y/%m/%d").to_string();
    assert!(url.starts_with(&format!("{PUBLIC_URL}/{today}/a-")), "{url}");
    assert!(url.ends_with(".txt"));

    let key = url.strip_prefix(&format!("{PUBLIC_URL}/")).unwrap();
    let stored = server.storage.get(key).expect("object stored under url key");
    assert_eq!(stored.body.as_ref(), b"0123456789");
    assert_eq!(stored.content_type, "text/plain");
}

#[tokio::test]
async fn test_same_filename_gets_distinct_keys() {
    let server = TestServer::new().await;

    for _ in 0..2 {
        let response = server
            .upload(Some(SECRET), None, "report.pdf", b"%PDF".to_vec())
            .await;
        assert_eq!(response.status(), 200);
    }

    let keys = server.storage.keys();
    assert_eq!(keys.len(), 2);
    assert_ne!(keys[0], keys[1]);
}

#[tokio::test]
async fn test_content_hash_template_reuses_key_for_same_bytes() {
    let mut config = common::test_config();
    config.upload.key_template = "{originname_without_ext}-{hash8}{ext}".to_string();
    let server = TestServer::with_config(config).await;

    let mut urls = Vec::new();
    for data in [&b"same payload"[..], b"same payload", b"new payload"] {
        let response = server
            .upload(Some(SECRET), None, "notes.txt", data.to_vec())
            .await;
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = response.json().await.unwrap();
        urls.push(body["url"].as_str().unwrap().to_string());
    }

    assert_eq!(urls[0], urls[1]);
    assert_ne!(urls[0], urls[2]);
    assert_eq!(server.storage.keys().len(), 2);
}

#[tokio::test]
async fn test_missing_authorization_header() {
    let server = TestServer::new().await;

    let response = server
        .upload(None, None, "a.txt", b"0123456789".to_vec())
        .await;

    assert_eq!(response.status(), 401);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(message(response).await, "Authorization header required");
    assert_eq!(server.storage.put_calls(), 0);
}

#[tokio::test]
async fn test_wrong_secret_bans_ip() {
    let server = TestServer::new().await;
    let ip = Some("1.2.3.4");

    for _ in 0..2 {
        let response = server
            .upload(Some("wrong"), ip, "a.txt", b"x".to_vec())
            .await;
        assert_eq!(response.status(), 401);
        assert_eq!(message(response).await, "Invalid Access Key");
    }

    let response = server
        .upload(Some("wrong"), ip, "a.txt", b"x".to_vec())
        .await;
    assert_eq!(response.status(), 403);
    assert_eq!(
        message(response).await,
        "Too many attempts. Banned for 60 mins."
    );

    // Still banned, even with the right secret.
    let response = server.upload(Some(SECRET), ip, "a.txt", b"x".to_vec()).await;
    assert_eq!(response.status(), 403);
    assert!(message(response).await.starts_with("Too many attempts."));

    let response = server
        .upload(Some("wrong"), ip, "a.txt", b"x".to_vec())
        .await;
    assert_eq!(response.status(), 403);

    assert_eq!(server.storage.put_calls(), 0);
}

#[tokio::test]
async fn test_ban_is_per_ip() {
    let server = TestServer::new().await;

    for _ in 0..3 {
        server
            .upload(Some("wrong"), Some("1.2.3.4"), "a.txt", b"x".to_vec())
            .await;
    }

    let response = server
        .upload(Some(SECRET), Some("5.6.7.8, 1.2.3.4"), "a.txt", b"x".to_vec())
        .await;
    assert_eq!(response.status(), 200);

    let stats = server.state.auth.stats().await;
    assert_eq!(stats.banned_ips, 1);
}

#[tokio::test]
async fn test_missing_file_part() {
    let server = TestServer::new().await;

    let form = reqwest::multipart::Form::new().text("note", "no file here");
    let response = server
        .client
        .post(server.url("/upload"))
        .header("Authorization", SECRET)
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    assert_eq!(message(response).await, "No file part");
}

#[tokio::test]
async fn test_empty_filename() {
    let server = TestServer::new().await;

    let response = server
        .upload(Some(SECRET), None, "", b"0123456789".to_vec())
        .await;

    assert_eq!(response.status(), 400);
    assert_eq!(message(response).await, "No selected file");
}

#[tokio::test]
async fn test_storage_failure_returns_generic_message() {
    let server = TestServer::new().await;
    server
        .storage
        .set_failure(Some(StorageError::new(
            "AccessDenied",
            "signature mismatch for bucket test-bucket",
        )));

    let response = server
        .upload(Some(SECRET), None, "a.txt", b"0123456789".to_vec())
        .await;

    assert_eq!(response.status(), 502);
    let msg = message(response).await;
    assert_eq!(msg, "Storage error. Please try again.");
    assert!(!msg.contains("AccessDenied"));
}

const BOUNDARY: &str = "bytego-test-boundary";

/// Hand-built multipart body with one `file` part of `size` bytes
fn multipart_body(filename: &str, size: usize) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend(std::iter::repeat_n(b'a', size));
    body.extend(format!("\r\n--{BOUNDARY}--\r\n").into_bytes());
    body
}

fn upload_request_builder() -> http::request::Builder {
    http::Request::builder()
        .method("POST")
        .uri("/upload")
        .header("Authorization", SECRET)
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_oversized_body_is_rejected_before_storage() {
    let server = TestServer::new().await;
    let app = bytego::build_router(server.state.clone());

    let body = multipart_body("big.bin", 1024 * 1024 + 1);
    let request = upload_request_builder()
        .header("Content-Length", body.len())
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), 413);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(
        json_body(response).await["msg"],
        "File too large. Maximum size: 1MB"
    );
    assert_eq!(server.storage.put_calls(), 0);
}

#[tokio::test]
async fn test_limit_counts_multipart_framing() {
    let server = TestServer::new().await;
    let app = bytego::build_router(server.state.clone());

    // The limit applies to the whole request body, so a file of exactly
    // `max_size_mb` no longer fits once boundaries and headers are added.
    let body = multipart_body("exact.bin", 1024 * 1024);
    let request = upload_request_builder()
        .header("Content-Length", body.len())
        .body(Body::from(body))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), 413);

    let body = multipart_body("fits.bin", 1024 * 1024 - 1024);
    let request = upload_request_builder()
        .header("Content-Length", body.len())
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(server.storage.put_calls(), 1);
}

#[tokio::test]
async fn test_streamed_oversized_body_is_cut_off() {
    let server = TestServer::new().await;
    let app = bytego::build_router(server.state.clone());

    // No Content-Length: the body arrives in chunks and is stopped while
    // the file part is being read.
    let chunks: Vec<Result<Bytes, std::io::Error>> =
        multipart_body("big.bin", 1024 * 1024 + 10)
            .chunks(64 * 1024)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();
    let request = upload_request_builder()
        .body(Body::from_stream(futures::stream::iter(chunks)))
        .unwrap();
    assert!(!request.headers().contains_key("content-length"));

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), 413);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(
        json_body(response).await["msg"],
        "File too large. Maximum size: 1MB"
    );
    assert_eq!(server.storage.put_calls(), 0);
}

/// Storage backend that panics on every call
struct PanickingStore;

#[async_trait::async_trait]
impl ObjectStore for PanickingStore {
    async fn put_object(&self, _object: PutObject) -> Result<(), StorageError> {
        panic!("storage client invariant violated");
    }

    async fn probe(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_panic_during_upload_returns_generic_500() {
    let state = AppState::with_storage(
        common::test_config(),
        Arc::new(PanickingStore),
        Arc::new(SystemClock),
    );
    let app = bytego::build_router(state);

    let body = multipart_body("a.txt", 10);
    let request = upload_request_builder()
        .header("Content-Length", body.len())
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), 500);
    assert!(response.headers().contains_key("x-request-id"));
    let body = json_body(response).await;
    assert_eq!(body["msg"], "Upload failed. Please try again.");
    assert!(!body.to_string().contains("invariant"));
}
