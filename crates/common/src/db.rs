use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::AppConfig;

/// Create the PostgreSQL pool backing alerts, recipients and the delivery audit trail.
///
/// Pool size comes from `AppConfig::db_max_connections` (default 20). A broadcast
/// batch holds at most one connection per in-flight recorder write, so the pool
/// should not be sized far below `broadcast_batch_size`.
pub async fn create_pool(config: &AppConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await?;

    tracing::info!(
        max_connections = config.db_max_connections,
        "Connected to PostgreSQL"
    );
    Ok(pool)
}
