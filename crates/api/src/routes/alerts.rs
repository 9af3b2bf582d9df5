//! Alert catalogue and delivery trigger routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use sentinel_common::error::AppError;
use sentinel_common::types::Alert;
use sentinel_notifier::DispatchOutcome;
use sentinel_notifier::alerts::{AlertService, CreateAlertParams};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/alerts", get(list_alerts))
        .route("/api/alerts", post(create_alert))
        .route("/api/alerts/{id}", get(get_alert))
        .route("/api/alerts/{id}/dispatch", post(dispatch_alert))
        .route("/api/alerts/{id}/broadcast", post(broadcast_alert))
}

#[derive(Debug, Deserialize)]
pub struct DispatchRequest {
    pub recipient_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    pub recipient_ids: Vec<Uuid>,
}

/// GET /api/alerts — All alerts, newest first.
async fn list_alerts(State(state): State<AppState>) -> Result<Json<Vec<Alert>>, AppError> {
    let alerts = AlertService::list(&state.pool).await?;
    Ok(Json(alerts))
}

/// GET /api/alerts/:id — A single alert.
async fn get_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Alert>, AppError> {
    let alert = AlertService::get(&state.pool, id).await?;
    Ok(Json(alert))
}

/// POST /api/alerts — Create an alert (no delivery is triggered).
async fn create_alert(
    State(state): State<AppState>,
    Json(params): Json<CreateAlertParams>,
) -> Result<(StatusCode, Json<Alert>), AppError> {
    let alert = AlertService::create(&state.pool, &params).await?;
    Ok((StatusCode::CREATED, Json(alert)))
}

/// POST /api/alerts/:id/dispatch — Deliver to one recipient and wait for the outcome.
///
/// A dispatch that reaches no channel is still a 200: the outcome carries
/// `success: false`, the reason, and the audit record when one was written.
async fn dispatch_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<DispatchRequest>,
) -> Result<Json<DispatchOutcome>, AppError> {
    let alert = AlertService::get(&state.pool, id).await?;
    let outcome = state
        .dispatcher
        .dispatch_to(&alert, req.recipient_id)
        .await
        .map_err(|e| AppError::Audit(e.to_string()))?;
    Ok(Json(outcome))
}

/// POST /api/alerts/:id/broadcast — Start a throttled broadcast in the background.
///
/// Returns 202 immediately; progress and the final report are logged, and
/// per-recipient results are readable through `/api/notifications`.
async fn broadcast_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<BroadcastRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    if req.recipient_ids.is_empty() {
        return Err(AppError::Validation("recipient_ids must not be empty".to_string()));
    }

    let alert = AlertService::get(&state.pool, id).await?;
    let recipients = req.recipient_ids.len();
    let batch_size = state.config.broadcast_batch_size;
    let scheduler = state.scheduler.clone();
    let cancel = state.shutdown.child_token();

    tokio::spawn(async move {
        match scheduler.broadcast(&alert, &req.recipient_ids, &cancel).await {
            Ok(report) => tracing::info!(
                alert_id = %report.alert_id,
                attempted = report.attempted,
                delivered = report.delivered_at_least_one_channel,
                fully_failed = report.fully_failed,
                cancelled = report.cancelled,
                "Broadcast report"
            ),
            Err(e) => tracing::error!(alert_id = %alert.id, error = %e, "Broadcast aborted"),
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "alert_id": id,
            "recipients": recipients,
            "batch_size": batch_size,
            "status": "accepted"
        })),
    ))
}
