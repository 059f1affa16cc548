//! ByteGo - a small upload relay for S3-compatible object storage
//!
//! Clients post a file with a shared secret; the file is renamed from a
//! key template, stored in the bucket and its public URL is returned.
//! Repeated wrong secrets from one IP get that IP banned for a while.
//!
//! # Modules
//!
//! - `api`: HTTP handlers and middleware
//! - `service`: Upload orchestration
//! - `auth`: Shared-secret gate with per-IP lockout
//! - `naming`: Object key templates
//! - `storage`: Object storage backends
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod naming;
pub mod service;
pub mod storage;

use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Secret check and lockout table
    pub auth: Arc<auth::AuthGate>,

    /// Object storage backend
    pub storage: Arc<dyn storage::ObjectStore>,

    /// Upload orchestration
    pub uploads: Arc<service::UploadService>,
}

impl AppState {
    /// Initialize application state against the configured S3 endpoint
    ///
    /// Builds the client only; no request is sent until the first probe or
    /// upload. `config` is expected to have passed [`config::AppConfig::load`].
    pub fn new(config: config::AppConfig) -> Self {
        let storage = storage::S3Storage::new(&config.storage);
        tracing::info!(
            bucket = %storage.bucket(),
            endpoint = %config.storage.endpoint,
            "Object storage client initialized"
        );

        Self::with_storage(config, Arc::new(storage), Arc::new(clock::SystemClock))
    }

    /// Assemble state around an existing storage backend and clock
    pub fn with_storage(
        config: config::AppConfig,
        storage: Arc<dyn storage::ObjectStore>,
        clock: Arc<dyn clock::Clock>,
    ) -> Self {
        let auth = Arc::new(auth::AuthGate::new(
            Some(config.auth.secret.clone()),
            auth::AuthPolicy::from(&config.auth),
            clock.clone(),
        ));
        let keys = Arc::new(naming::KeyGenerator::new(&config.upload.key_template, clock));
        let uploads = Arc::new(service::UploadService::new(
            auth.clone(),
            keys,
            storage.clone(),
            &config.storage.public_base(),
            config.storage.acl.clone(),
        ));

        Self {
            config: Arc::new(config),
            auth,
            storage,
            uploads,
        }
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::{Router, middleware, routing::get};
    use tower::ServiceBuilder;
    use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

    let cors_layer = build_cors_layer(&state.config.server);
    let max_bytes = state.config.upload.max_size_bytes();

    Router::new()
        .route("/", get(api::index))
        .route("/health", get(api::health_check))
        .merge(api::upload_router(max_bytes))
        .merge(api::metrics_router())
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(api::request_id_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::custom(error::panic_response))
                .layer(cors_layer),
        )
        .with_state(state)
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    if server.cors_allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = server
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::error!(%error, origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}
