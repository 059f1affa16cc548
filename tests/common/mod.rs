//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use bytego::clock::SystemClock;
use bytego::storage::MemoryStorage;
use bytego::{AppState, config};
use tokio::net::TcpListener;

pub const SECRET: &str = "test-shared-secret";
pub const PUBLIC_URL: &str = "https://cdn.test.example.com";

/// Test configuration: 1 MB uploads, in-process lockout sweep disabled
pub fn test_config() -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign port
            cors_allowed_origins: Vec::new(),
        },
        storage: config::StorageConfig {
            endpoint: "http://127.0.0.1:9000".to_string(),
            access_key: "test-access-key".to_string(),
            secret_key: "test-secret-key".to_string(),
            bucket: "test-bucket".to_string(),
            region: "auto".to_string(),
            addressing_style: config::AddressingStyle::Path,
            public_url: Some(format!("{PUBLIC_URL}/")),
            acl: None,
        },
        upload: config::UploadConfig {
            max_size_mb: 1,
            key_template: "{year}/{month}/{day}/{originname_without_ext}-{randomkey8}{ext}"
                .to_string(),
        },
        auth: config::AuthConfig {
            secret: SECRET.to_string(),
            max_attempts: 3,
            ban_duration_seconds: 3600,
            sweep_probability: 0.0,
            sweep_interval_seconds: 0,
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

/// Test server instance backed by in-memory storage
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub storage: Arc<MemoryStorage>,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: config::AppConfig) -> Self {
        bytego::metrics::init_metrics();

        let storage = Arc::new(MemoryStorage::new());
        let state = AppState::with_storage(config, storage.clone(), Arc::new(SystemClock));

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = bytego::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self {
            addr: addr_str,
            state,
            storage,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// POST /upload with one file part
    pub async fn upload(
        &self,
        secret: Option<&str>,
        forwarded_for: Option<&str>,
        filename: &str,
        data: Vec<u8>,
    ) -> reqwest::Response {
        let part = reqwest::multipart::Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str("text/plain")
            .unwrap();
        let form = reqwest::multipart::Form::new().part("file", part);

        let mut request = self.client.post(self.url("/upload")).multipart(form);
        if let Some(secret) = secret {
            request = request.header("Authorization", secret);
        }
        if let Some(ip) = forwarded_for {
            request = request.header("X-Forwarded-For", ip);
        }
        request.send().await.unwrap()
    }
}

/// Pull `msg` out of a JSON error body
pub async fn message(response: reqwest::Response) -> String {
    let body: serde_json::Value = response.json().await.unwrap();
    body["msg"].as_str().unwrap_or_default().to_string()
}
