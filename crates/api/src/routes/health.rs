//! Liveness and dependency health.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// GET /health — Reports `degraded` with 503 when the audit store is unreachable,
/// since dispatches cannot be recorded without it.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let database_ok = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if database_ok { "ok" } else { "degraded" },
            "service": "sentinel-api",
            "version": env!("CARGO_PKG_VERSION"),
            "database": if database_ok { "ok" } else { "unavailable" },
        })),
    )
}
