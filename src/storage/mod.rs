//! Object storage
//!
//! Handles:
//! - Uploading objects to an S3-compatible bucket
//! - Probing bucket reachability for health checks

mod memory;
mod s3;

pub use memory::{MemoryStorage, StoredObject};
pub use s3::S3Storage;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Content type used when the client does not send one
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Failure reported by the storage backend
///
/// `code` and `message` come from the backend (e.g. `AccessDenied`) and are
/// only ever logged, never returned to clients.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct StorageError {
    pub code: String,
    pub message: String,
}

impl StorageError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// One object to store
#[derive(Debug, Clone)]
pub struct PutObject {
    pub key: String,
    pub body: Bytes,
    pub content_length: u64,
    pub content_type: String,
    /// Canned ACL, e.g. "public-read"
    pub acl: Option<String>,
}

/// Storage backend used by the upload service
///
/// Implementations are shared across all request handlers and must not need
/// any cross-request locking.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store one object
    async fn put_object(&self, object: PutObject) -> Result<(), StorageError>;

    /// Check that the bucket is reachable with the configured credentials
    async fn probe(&self) -> Result<(), StorageError>;
}

pub(crate) fn build_http_client() -> aws_sdk_s3::config::SharedHttpClient {
    use aws_smithy_runtime::client::http::hyper_014::HyperClientBuilder;

    let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .build();

    HyperClientBuilder::new().build(https_connector)
}
