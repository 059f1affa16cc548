//! API layer
//!
//! HTTP handlers for:
//! - File upload
//! - Health check and landing page
//! - Metrics (Prometheus)

mod health;
pub mod metrics;
mod request_id;
mod upload;

pub use health::{health_check, index};
pub use metrics::metrics_router;
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
pub use upload::{FILE_FIELD, MultipartFile, UploadResponse, upload_router};
