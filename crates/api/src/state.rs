//! Shared application state for the Axum API server.

use std::sync::Arc;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use sentinel_common::config::AppConfig;
use sentinel_notifier::realtime::BroadcastRealtimeChannel;
use sentinel_notifier::recorder::DeliveryRecorder;
use sentinel_notifier::{AlertDispatcher, BulkBroadcastScheduler};

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: AppConfig,
    pub dispatcher: Arc<AlertDispatcher>,
    pub scheduler: Arc<BulkBroadcastScheduler>,
    /// In-process notices for WebSocket sessions connected to this server.
    pub sessions: Arc<BroadcastRealtimeChannel>,
    /// Cancelled on shutdown; running broadcasts stop before their next batch.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: AppConfig,
        dispatcher: Arc<AlertDispatcher>,
        scheduler: Arc<BulkBroadcastScheduler>,
        sessions: Arc<BroadcastRealtimeChannel>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            pool,
            config,
            dispatcher,
            scheduler,
            sessions,
            shutdown,
        }
    }

    pub fn recorder(&self) -> &Arc<dyn DeliveryRecorder> {
        self.dispatcher.recorder()
    }
}
