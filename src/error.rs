//! Error types for ByteGo
//!
//! Every per-request failure is converted to `AppError`, which implements
//! `IntoResponse` and renders the `{"msg": ...}` body clients expect.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::storage::StorageError;

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid or missing configuration (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The gate was built without a shared secret (500)
    #[error("Server Error: auth secret not configured")]
    SecretNotConfigured,

    /// No `Authorization` header (401)
    #[error("Authorization header required")]
    MissingAuthHeader,

    /// Wrong shared secret (401)
    #[error("Invalid Access Key")]
    InvalidKey,

    /// Client IP is locked out (403)
    #[error("Too many attempts. Banned for {remaining_minutes} mins.")]
    Banned { remaining_minutes: u64 },

    /// Malformed upload (400)
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Body exceeds `upload.max_size_mb` (413)
    #[error("File too large. Maximum size: {}MB", .max_bytes / (1024 * 1024))]
    PayloadTooLarge { max_bytes: u64 },

    /// Object store rejected or failed the request (502)
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Anything else (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Upload validation failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No file part")]
    NoFile,

    #[error("No selected file")]
    EmptyFilename,

    #[error("Malformed upload: {0}")]
    Malformed(String),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingAuthHeader | AppError::InvalidKey => StatusCode::UNAUTHORIZED,
            AppError::Banned { .. } => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Storage(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_) | AppError::SecretNotConfigured | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short machine-readable label, used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::SecretNotConfigured => "secret_not_configured",
            AppError::MissingAuthHeader => "missing_auth_header",
            AppError::InvalidKey => "invalid_key",
            AppError::Banned { .. } => "banned",
            AppError::Validation(_) => "validation",
            AppError::PayloadTooLarge { .. } => "payload_too_large",
            AppError::Storage(_) => "storage",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Storage and internal failures are logged in full but answered with a
    /// generic message so backend details never reach the client.
    fn into_response(self) -> Response {
        use axum::Json;

        let status = self.status();
        let message = match &self {
            AppError::Storage(err) => {
                tracing::error!(
                    code = %err.code,
                    message = %err.message,
                    "Storage backend error"
                );
                "Storage error. Please try again.".to_string()
            }
            AppError::Internal(err) => {
                tracing::error!(error = ?err, "Unexpected error");
                "Upload failed. Please try again.".to_string()
            }
            AppError::Config(msg) => {
                tracing::error!(error = %msg, "Configuration error");
                "Internal server error".to_string()
            }
            AppError::SecretNotConfigured => {
                tracing::error!("Rejecting request: auth secret not configured");
                self.to_string()
            }
            _ => {
                tracing::warn!(status = status.as_u16(), error = %self, "Request rejected");
                self.to_string()
            }
        };

        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[self.kind()]).inc();

        let body = Json(serde_json::json!({
            "msg": message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Turn a handler panic into a 500 response
///
/// Used with `tower_http::catch_panic::CatchPanicLayer::custom`.
pub fn panic_response(panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "unknown panic payload".to_string()
    };

    AppError::Internal(anyhow::anyhow!("handler panicked: {detail}")).into_response()
}
