//! Realtime in-app notices.
//!
//! Best-effort and fire-and-forget: `emit` never blocks, never retries, and
//! never touches the audit trail. A recipient with no connected session
//! simply misses the notice.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use sentinel_common::types::Alert;

use crate::render::{EMERGENCY_NOTICE_TYPE, MessageRenderer};

/// Event delivered to connected sessions of one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeNotice {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub priority: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "actionUrl")]
    pub action_url: String,
}

impl RealtimeNotice {
    pub fn for_alert(alert: &Alert) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: alert.title.clone(),
            message: alert.description.clone(),
            kind: EMERGENCY_NOTICE_TYPE.to_string(),
            priority: alert.severity.to_string(),
            timestamp: Utc::now(),
            action_url: MessageRenderer::action_url(alert.id),
        }
    }
}

/// Session room a recipient's notices are scoped to.
pub fn room_for(recipient_id: Uuid) -> String {
    format!("user_{}", recipient_id)
}

pub trait RealtimeChannel: Send + Sync {
    /// Emit at most once. Errors are swallowed by the implementation.
    fn emit(&self, recipient_id: Uuid, notice: RealtimeNotice);
}

/// A notice together with the room it targets.
#[derive(Debug, Clone)]
pub struct ScopedNotice {
    pub room: String,
    pub recipient_id: Uuid,
    pub notice: RealtimeNotice,
}

/// In-process fan-out to subscribed sessions.
pub struct BroadcastRealtimeChannel {
    tx: broadcast::Sender<ScopedNotice>,
}

impl BroadcastRealtimeChannel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Receive every notice; sessions filter on `recipient_id`.
    pub fn subscribe(&self) -> broadcast::Receiver<ScopedNotice> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastRealtimeChannel {
    fn default() -> Self {
        Self::new(256)
    }
}

impl RealtimeChannel for BroadcastRealtimeChannel {
    fn emit(&self, recipient_id: Uuid, notice: RealtimeNotice) {
        let scoped = ScopedNotice {
            room: room_for(recipient_id),
            recipient_id,
            notice,
        };
        // No receivers means no connected sessions, which is not an error.
        if self.tx.send(scoped).is_err() {
            tracing::trace!(recipient_id = %recipient_id, "No realtime subscribers");
        }
    }
}

/// Emits every notice on each inner channel in order.
pub struct FanoutRealtimeChannel {
    channels: Vec<Arc<dyn RealtimeChannel>>,
}

impl FanoutRealtimeChannel {
    pub fn new(channels: Vec<Arc<dyn RealtimeChannel>>) -> Self {
        Self { channels }
    }
}

impl RealtimeChannel for FanoutRealtimeChannel {
    fn emit(&self, recipient_id: Uuid, notice: RealtimeNotice) {
        for channel in &self.channels {
            channel.emit(recipient_id, notice.clone());
        }
    }
}

/// Publishes notices on the recipient's Redis channel for the socket gateway.
#[derive(Clone)]
pub struct RedisRealtimeChannel {
    redis: ConnectionManager,
}

impl RedisRealtimeChannel {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

impl RealtimeChannel for RedisRealtimeChannel {
    fn emit(&self, recipient_id: Uuid, notice: RealtimeNotice) {
        let payload = match serde_json::to_string(&notice) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(
                    recipient_id = %recipient_id,
                    error = %e,
                    "Failed to encode realtime notice"
                );
                return;
            }
        };
        let mut redis = self.redis.clone();
        let room = room_for(recipient_id);

        tokio::spawn(async move {
            let result: redis::RedisResult<i64> = redis::cmd("PUBLISH")
                .arg(&room)
                .arg(payload)
                .query_async(&mut redis)
                .await;
            if let Err(e) = result {
                tracing::warn!(room = %room, error = %e, "Realtime publish failed");
            }
        });
    }
}
