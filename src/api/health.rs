//! Health check and landing page

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
};

use crate::AppState;

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// GET /health
///
/// Probes the bucket so load balancers take the instance out of rotation
/// when storage is unreachable.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.storage.probe().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "healthy",
                "storage": "connected",
            })),
        ),
        Err(error) => {
            tracing::error!(code = %error.code, message = %error.message, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "unhealthy",
                    "error": "storage connection failed",
                })),
            )
        }
    }
}

/// GET /
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}
