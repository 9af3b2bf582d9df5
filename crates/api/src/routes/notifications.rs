//! Delivery audit read routes and the realtime notice stream.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use sentinel_common::error::AppError;
use sentinel_common::types::NotificationRecord;
use sentinel_notifier::realtime::ScopedNotice;

use crate::state::AppState;

/// Heartbeat ping interval in seconds.
const HEARTBEAT_INTERVAL_SECS: u64 = 30;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", get(query_notifications))
        .route("/api/notifications/stream", get(notification_stream))
}

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    pub alert_id: Option<Uuid>,
    pub recipient_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub recipient_id: Uuid,
}

/// GET /api/notifications?alert_id=… | ?recipient_id=… — Audit records, oldest first.
///
/// Exactly one filter must be given.
async fn query_notifications(
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Vec<NotificationRecord>>, AppError> {
    let records = match (query.alert_id, query.recipient_id) {
        (Some(alert_id), None) => state.recorder().query_by_alert(alert_id).await,
        (None, Some(recipient_id)) => state.recorder().query_by_recipient(recipient_id).await,
        _ => {
            return Err(AppError::Validation(
                "provide exactly one of alert_id or recipient_id".to_string(),
            ));
        }
    }
    .map_err(|e| AppError::Audit(e.to_string()))?;

    Ok(Json(records))
}

/// GET /api/notifications/stream?recipient_id=… — WebSocket of in-app notices.
///
/// Each text frame is one notice JSON (`id`, `title`, `message`, `type`,
/// `priority`, `timestamp`, `actionUrl`) addressed to the recipient's
/// `user_<id>` room. Notices emitted while no session is open are not replayed.
async fn notification_stream(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> impl IntoResponse {
    // Subscribed before the handshake completes, so the client sees every
    // notice emitted after it connects.
    let notices = state.sessions.subscribe();
    ws.on_upgrade(move |socket| forward_notices(socket, notices, query.recipient_id))
}

async fn forward_notices(
    socket: WebSocket,
    mut notices: broadcast::Receiver<ScopedNotice>,
    recipient_id: Uuid,
) {
    tracing::debug!(recipient_id = %recipient_id, "Realtime session opened");

    let (mut sender, mut receiver) = socket.split();
    let period = Duration::from_secs(HEARTBEAT_INTERVAL_SECS);
    let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(
                            recipient_id = %recipient_id,
                            error = %e,
                            "WebSocket error"
                        );
                        break;
                    }
                    // Clients only listen; pings are answered by the protocol layer.
                    Some(Ok(_)) => {}
                }
            }

            event = notices.recv() => {
                match event {
                    Ok(scoped) if scoped.recipient_id == recipient_id => {
                        let payload = match serde_json::to_string(&scoped.notice) {
                            Ok(p) => p,
                            Err(e) => {
                                tracing::warn!(error = %e, "Failed to encode realtime notice");
                                continue;
                            }
                        };
                        if sender.send(Message::Text(payload.into())).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(
                            recipient_id = %recipient_id,
                            skipped = n,
                            "Realtime session lagged"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            _ = heartbeat.tick() => {
                if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    tracing::debug!(recipient_id = %recipient_id, "Realtime session closed");
}
