//! Coastal Sentinel API server binary entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use sentinel_common::config::AppConfig;
use sentinel_common::db::create_pool;
use sentinel_common::redis_pool::create_redis_pool;
use sentinel_common::types::Channel;

use sentinel_notifier::channels::ChannelSet;
use sentinel_notifier::directory::PgRecipientDirectory;
use sentinel_notifier::realtime::{
    BroadcastRealtimeChannel, FanoutRealtimeChannel, RealtimeChannel, RedisRealtimeChannel,
};
use sentinel_notifier::recorder::PgDeliveryRecorder;
use sentinel_notifier::{AlertDispatcher, BulkBroadcastScheduler, DeliverySettings};

use sentinel_api::routes::create_router;
use sentinel_api::state::AppState;

/// Large enough for a broadcast request naming tens of thousands of recipients.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("sentinel_api=debug,sentinel_notifier=info,tower_http=debug")
        }))
        .init();

    tracing::info!("Starting Coastal Sentinel API server...");

    let config = AppConfig::from_env()?;

    let pool = create_pool(&config).await?;
    tracing::info!("Database pool created");

    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Migrations applied");

    let http = reqwest::Client::builder()
        .user_agent(concat!("coastal-sentinel/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let adapters = ChannelSet::from_config(&config, http);
    for channel in Channel::ALL {
        if !adapters.is_configured(channel) {
            tracing::warn!(
                channel = %channel,
                "No adapter configured; sends on this channel will fail"
            );
        }
    }

    // Sessions connected to this server always get notices; Redis adds other gateways.
    let sessions = Arc::new(BroadcastRealtimeChannel::default());
    let realtime: Arc<dyn RealtimeChannel> = match &config.redis_url {
        Some(url) => {
            let redis = create_redis_pool(url).await?;
            tracing::info!("Redis connection established; realtime notices also use PUBLISH");
            let channels: Vec<Arc<dyn RealtimeChannel>> = vec![
                sessions.clone(),
                Arc::new(RedisRealtimeChannel::new(redis)),
            ];
            Arc::new(FanoutRealtimeChannel::new(channels))
        }
        None => {
            tracing::info!("REDIS_URL not set; realtime notices stay in-process");
            sessions.clone()
        }
    };

    let settings = DeliverySettings::from_config(&config);
    let dispatcher = Arc::new(AlertDispatcher::new(
        adapters,
        Arc::new(PgDeliveryRecorder::new(pool.clone())),
        realtime,
        Arc::new(PgRecipientDirectory::new(pool.clone())),
        &settings,
    ));
    let scheduler = Arc::new(BulkBroadcastScheduler::new(dispatcher.clone(), &settings));

    let shutdown = CancellationToken::new();
    let port = config.api_port;
    let state = AppState::new(
        pool,
        config,
        dispatcher,
        scheduler,
        sessions,
        shutdown.clone(),
    );

    let app = create_router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown requested; cancelling running broadcasts");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
