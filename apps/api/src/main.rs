use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{header, Method};
use openmusic_api::config::Config;
use openmusic_api::repositories::PlaylistRepository;
use openmusic_api::services::{ExportService, HealthService, PostgresCheck, RedisCheck};
use openmusic_api::{build_router, AuthConfig, AuthService};
use openmusic_export_queue::{
    MessageQueue, RedisStreamQueue, StreamConsumer, EXPORT_PLAYLIST_CHANNEL,
};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Build the CORS layer based on configuration.
///
/// In production mode:
/// - If `CORS_ORIGINS` is set, only those origins are allowed
/// - If `CORS_ORIGINS` is not set, CORS requests are rejected (no origins allowed)
///
/// In development mode:
/// - If `CORS_ORIGINS` is set, those origins are used
/// - If `CORS_ORIGINS` is not set, permissive CORS is used for convenience
fn build_cors_layer(config: &Config) -> CorsLayer {
    match &config.cors_allowed_origins {
        Some(origins) if !origins.is_empty() => {
            let allowed_origins: Vec<_> = origins
                .iter()
                .filter_map(|origin| {
                    origin.parse().ok().or_else(|| {
                        tracing::warn!("Invalid CORS origin '{}', skipping", origin);
                        None
                    })
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::error!("No valid CORS origins configured, CORS requests will be rejected");
                CorsLayer::new()
            } else {
                tracing::info!(
                    "CORS configured with {} allowed origin(s): {:?}",
                    allowed_origins.len(),
                    origins
                );
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([
                        header::AUTHORIZATION,
                        header::CONTENT_TYPE,
                        header::ACCEPT,
                        header::ORIGIN,
                    ])
                    .allow_credentials(true)
                    .max_age(std::time::Duration::from_secs(3600))
            }
        }
        _ if config.is_production() => {
            tracing::warn!(
                "CORS_ORIGINS not configured in production mode. \
                 CORS requests will be rejected. Set CORS_ORIGINS to allow cross-origin requests."
            );
            CorsLayer::new()
        }
        _ => {
            tracing::warn!(
                "Using permissive CORS in development mode. \
                 Set CORS_ORIGINS for production-like behavior."
            );
            CorsLayer::permissive()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    openmusic_shared_config::load_dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "openmusic_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    tracing::info!(
        environment = %config.environment(),
        port = config.port,
        "Starting OpenMusic API"
    );

    tracing::info!(database = %config.database().redacted_url(), "Connecting to database");
    let pool = PgPoolOptions::new()
        .max_connections(config.database().max_connections)
        .min_connections(config.database().min_connections)
        .acquire_timeout(config.database().acquire_timeout())
        .idle_timeout(config.database().idle_timeout())
        .connect(&config.database().url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(redis = %config.redis().redacted_url(), "Connecting to Redis");
    let consumer = StreamConsumer::producer(&config.redis().stream_group);
    let queue = Arc::new(
        RedisStreamQueue::connect(&config.redis().connection_url(), consumer)
            .await
            .context("Failed to connect to Redis")?,
    );
    queue
        .ensure_channel(EXPORT_PLAYLIST_CHANNEL)
        .await
        .context("Failed to declare export channel")?;

    let auth_service = AuthService::new(AuthConfig::new(config.jwt_secret.clone()));
    let export_service = ExportService::new(
        Arc::new(PlaylistRepository::new(pool.clone())),
        queue.clone() as Arc<dyn MessageQueue>,
    );
    let health_service = HealthService::new()
        .with_check(Arc::new(PostgresCheck::new(pool.clone())))
        .with_check(Arc::new(RedisCheck::new(queue.clone())));

    let app = build_router(auth_service, export_service, health_service)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(&config));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    pool.close().await;
    tracing::info!("API shutdown complete");

    Ok(())
}

/// Cancel `shutdown` on Ctrl+C or SIGTERM
async fn watch_signals(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, draining connections"),
        _ = terminate => tracing::info!("Received SIGTERM, draining connections"),
    }

    shutdown.cancel();
}
