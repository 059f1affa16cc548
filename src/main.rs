//! ByteGo binary entry point

use std::net::SocketAddr;
use std::time::Duration;

use bytego::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging
/// 3. Initialize AppState and probe storage
/// 4. Start background tasks (lockout sweep)
/// 5. Start HTTP server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration, then initialize tracing/logging from it
    let loaded = config::AppConfig::load();
    init_tracing(loaded.as_ref().ok().map(|config| &config.logging));

    tracing::info!("Starting ByteGo...");

    // 2. Initialize metrics
    bytego::metrics::init_metrics();

    // 3. Abort on invalid configuration
    let config = match loaded {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(%error, "Invalid configuration");
            return Err(error.into());
        }
    };
    tracing::info!(
        bucket = %config.storage.bucket,
        public_url = %config.storage.public_base(),
        max_size_mb = config.upload.max_size_mb,
        key_template = %config.upload.key_template,
        "Configuration loaded"
    );
    config.log_warnings();

    // 4. Initialize application state
    let state = AppState::new(config.clone());

    match state.storage.probe().await {
        Ok(()) => tracing::info!("Storage reachable"),
        Err(error) => tracing::warn!(
            code = %error.code,
            message = %error.message,
            "Storage probe failed; uploads will fail until it recovers"
        ),
    }

    // 5. Start background tasks
    if config.auth.sweep_interval_seconds > 0 {
        spawn_sweep_task(state.clone());
    }

    // 6. Start HTTP server
    let app = bytego::build_router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Install the tracing subscriber
///
/// `RUST_LOG` wins over `logging.level`; without a loaded config the
/// defaults are used.
fn init_tracing(logging: Option<&config::LoggingConfig>) {
    let level = logging.map_or("info", |logging| logging.level.as_str());
    let json = logging.is_some_and(|logging| logging.format == "json");
    let default_filter = format!("bytego={level},tower_http={level}");

    if json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| default_filter.into()),
            )
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| default_filter.into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

/// Spawn background lockout sweep task
fn spawn_sweep_task(state: AppState) {
    tokio::spawn(async move {
        let interval_secs = state.config.auth.sweep_interval_seconds;
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

        // The first tick completes immediately.
        interval.tick().await;

        loop {
            interval.tick().await;

            let removed = state.auth.sweep().await;
            if removed > 0 {
                let stats = state.auth.stats().await;
                tracing::info!(
                    removed,
                    tracked_ips = stats.tracked_ips,
                    banned_ips = stats.banned_ips,
                    "Lockout table swept"
                );
            }
        }
    });

    tracing::info!("Lockout sweep task spawned");
}
