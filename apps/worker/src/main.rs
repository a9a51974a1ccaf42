use std::sync::Arc;

use anyhow::Context;
use openmusic_export_queue::{MessageQueue, RedisStreamQueue, StreamConsumer};
use openmusic_worker::{
    AppState, Config, ExportWorker, NotificationSender, PgPlaylistStore, PlaylistAggregator,
    SmtpMailTransport,
};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    openmusic_shared_config::load_dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "openmusic_worker=debug,openmusic_export_queue=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    tracing::info!(
        environment = %config.environment(),
        consumer = %config.consumer_name,
        "Starting OpenMusic export worker"
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
    let consumer = StreamConsumer::new(&config.redis().stream_group, &config.consumer_name)
        .with_block_ms(config.block_timeout_ms);
    let queue = RedisStreamQueue::connect(&config.redis().connection_url(), consumer)
        .await
        .context("Failed to connect to Redis")?;
    let queue: Arc<dyn MessageQueue> = Arc::new(queue);

    queue
        .ensure_channel(&config.consumer.channel)
        .await
        .context("Failed to declare export channel")?;
    if config.consumer.failure_policy == openmusic_worker::FailurePolicy::DeadLetter {
        queue
            .ensure_channel(&config.consumer.dead_letter_channel)
            .await
            .context("Failed to declare dead-letter channel")?;
    }

    let transport = SmtpMailTransport::from_config(&config.smtp)?;
    let aggregator = PlaylistAggregator::new(Arc::new(PgPlaylistStore::new(pool.clone())))
        .with_consistency(config.read_consistency);
    let state = AppState::new(aggregator, NotificationSender::new(Arc::new(transport)));

    let worker = ExportWorker::new(state, queue, config.consumer.clone());

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    worker.run(shutdown).await;

    pool.close().await;
    tracing::info!("Worker shutdown complete");

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
        _ = ctrl_c => tracing::info!("Received Ctrl+C, finishing current export"),
        _ = terminate => tracing::info!("Received SIGTERM, finishing current export"),
    }

    shutdown.cancel();
}
