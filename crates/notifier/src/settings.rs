//! Delivery tuning: batch size, inter-batch cooldown, per-channel timeout.

use std::time::Duration;

use sentinel_common::config::AppConfig;

/// Default number of recipients dispatched together in one broadcast batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default pause between broadcast batches.
pub const DEFAULT_BATCH_COOLDOWN_MS: u64 = 1000;

/// Default upper bound on a single channel send.
pub const DEFAULT_CHANNEL_TIMEOUT_MS: u64 = 10_000;

/// Throttling and timeout policy shared by the dispatcher and the scheduler.
///
/// Applied uniformly: batch outcomes never change the batch size or the cooldown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverySettings {
    pub batch_size: usize,
    pub batch_cooldown: Duration,
    pub channel_timeout: Duration,
    pub emergency_line: String,
}

impl DeliverySettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            batch_size: config.broadcast_batch_size.max(1),
            batch_cooldown: Duration::from_millis(config.broadcast_batch_cooldown_ms),
            channel_timeout: Duration::from_millis(config.channel_timeout_ms.max(1)),
            emergency_line: config.emergency_line.clone(),
        }
    }
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_cooldown: Duration::from_millis(DEFAULT_BATCH_COOLDOWN_MS),
            channel_timeout: Duration::from_millis(DEFAULT_CHANNEL_TIMEOUT_MS),
            emergency_line: "108".to_string(),
        }
    }
}
