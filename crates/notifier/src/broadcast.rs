//! Bulk broadcast scheduler — fans one alert out to many recipients in throttled batches.
//!
//! Recipients are split into fixed-size batches. Each batch is dispatched
//! concurrently and fully settled before the scheduler sleeps for the
//! cooldown and moves on, so the aggregate call rate against providers is
//! bounded by `batch_size * channels` per `cooldown`. The cooldown applies
//! whether or not the batch delivered anything.
//!
//! Delivery is at-least-once: there is no durable cursor, so a broadcast
//! restarted after a crash may notify some recipients twice. Each of those
//! dispatches gets its own audit record.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use sentinel_common::types::Alert;

use crate::dispatcher::{AlertDispatcher, DispatchOutcome};
use crate::error::NotifierError;
use crate::settings::DeliverySettings;

/// Tally for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub size: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Aggregate result of a broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    pub alert_id: Uuid,
    /// Recipients whose dispatch ran to completion (or was skipped).
    pub attempted: usize,
    /// Recipients reached on at least one channel.
    pub delivered_at_least_one_channel: usize,
    /// Recipients reached on no channel, for any reason.
    pub fully_failed: usize,
    pub batches: Vec<BatchSummary>,
    /// Stopped by the cancellation token before all batches ran.
    pub cancelled: bool,
}

impl BroadcastReport {
    fn new(alert_id: Uuid) -> Self {
        Self {
            alert_id,
            ..Self::default()
        }
    }

    fn tally(&mut self, summary: &mut BatchSummary, outcome: &DispatchOutcome) {
        self.attempted += 1;
        if outcome.success {
            self.delivered_at_least_one_channel += 1;
            summary.delivered += 1;
        } else {
            self.fully_failed += 1;
            summary.failed += 1;
        }
    }
}

pub struct BulkBroadcastScheduler {
    dispatcher: Arc<AlertDispatcher>,
    batch_size: usize,
    batch_cooldown: Duration,
}

impl BulkBroadcastScheduler {
    pub fn new(dispatcher: Arc<AlertDispatcher>, settings: &DeliverySettings) -> Self {
        Self {
            dispatcher,
            batch_size: settings.batch_size.max(1),
            batch_cooldown: settings.batch_cooldown,
        }
    }

    /// Split ids into batches of `batch_size`, dropping repeated ids.
    ///
    /// Keeping the first occurrence of each id means one broadcast never
    /// dispatches the same (alert, recipient) pair twice.
    pub fn partition(&self, recipient_ids: &[Uuid]) -> Vec<Vec<Uuid>> {
        let mut seen = HashSet::with_capacity(recipient_ids.len());
        let unique: Vec<Uuid> = recipient_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        unique
            .chunks(self.batch_size)
            .map(|chunk| chunk.to_vec())
            .collect()
    }

    /// Broadcast `alert` to every recipient id.
    ///
    /// Per-recipient problems (no eligible channel, unknown recipient, all
    /// channels failing) are counted and never stop the batch. A recorder
    /// failure is returned once the batch it happened in has settled.
    /// `cancel` is honoured before each batch and during the cooldown.
    pub async fn broadcast(
        &self,
        alert: &Alert,
        recipient_ids: &[Uuid],
        cancel: &CancellationToken,
    ) -> Result<BroadcastReport, NotifierError> {
        let batches = self.partition(recipient_ids);
        let total_batches = batches.len();
        let mut report = BroadcastReport::new(alert.id);

        tracing::info!(
            alert_id = %alert.id,
            recipients = recipient_ids.len(),
            batches = total_batches,
            batch_size = self.batch_size,
            "Starting bulk broadcast"
        );

        for (index, batch) in batches.iter().enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let dispatches = batch
                .iter()
                .map(|&recipient_id| self.dispatcher.dispatch_to(alert, recipient_id));
            let settled = join_all(dispatches).await;

            let mut summary = BatchSummary {
                size: batch.len(),
                ..BatchSummary::default()
            };
            let mut storage_failure = None;
            for result in settled {
                match result {
                    Ok(outcome) => report.tally(&mut summary, &outcome),
                    Err(e) => {
                        report.attempted += 1;
                        report.fully_failed += 1;
                        summary.failed += 1;
                        storage_failure.get_or_insert(e);
                    }
                }
            }

            tracing::info!(
                alert_id = %alert.id,
                batch = index + 1,
                of = total_batches,
                size = summary.size,
                delivered = summary.delivered,
                failed = summary.failed,
                "Broadcast batch settled"
            );
            report.batches.push(summary);

            if let Some(e) = storage_failure {
                tracing::error!(
                    alert_id = %alert.id,
                    batch = index + 1,
                    error = %e,
                    "Delivery audit unavailable, aborting broadcast"
                );
                return Err(e);
            }

            if index + 1 < total_batches {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        report.cancelled = true;
                        break;
                    }
                    _ = tokio::time::sleep(self.batch_cooldown) => {}
                }
            }
        }

        if report.cancelled {
            tracing::warn!(
                alert_id = %alert.id,
                completed_batches = report.batches.len(),
                of = total_batches,
                "Bulk broadcast cancelled"
            );
        }

        tracing::info!(
            alert_id = %alert.id,
            attempted = report.attempted,
            delivered = report.delivered_at_least_one_channel,
            fully_failed = report.fully_failed,
            "Bulk broadcast finished"
        );

        Ok(report)
    }
}
