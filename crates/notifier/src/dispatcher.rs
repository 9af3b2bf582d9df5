//! Alert dispatcher — delivers one alert to one recipient across every eligible channel.
//!
//! Pipeline for a single dispatch:
//! 1. Select channels (via `PreferenceGate`); none → `NoEligibleChannel`, no sends
//! 2. Claim the (alert, recipient) pair; already claimed → `AlreadyInFlight`
//! 3. Open a `NotificationRecord` with the next attempt number
//! 4. Send on all channels concurrently, each bounded by the channel timeout
//! 5. Settle every send into the record and write it
//! 6. Emit a realtime notice, whatever the channel outcomes were
//!
//! Channel and recipient problems come back as values in `DispatchOutcome`.
//! Only a failing `DeliveryRecorder` produces an `Err`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use uuid::Uuid;

use sentinel_common::types::{Alert, Channel, NotificationRecord, Recipient};

use crate::channels::ChannelSet;
use crate::directory::RecipientDirectory;
use crate::error::{ChannelError, NotifierError};
use crate::gate::PreferenceGate;
use crate::inflight::InFlightRegistry;
use crate::realtime::{RealtimeChannel, RealtimeNotice};
use crate::recorder::DeliveryRecorder;
use crate::render::MessageRenderer;
use crate::settings::DeliverySettings;

/// Why a dispatch delivered nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchFailure {
    /// No channel is both enabled and reachable. No record is written.
    NoEligibleChannel,
    /// The recipient id is unknown. No record is written.
    RecipientNotFound,
    /// The recipient store could not be read. No record is written.
    DirectoryUnavailable,
    /// Another dispatch of this alert to this recipient is still running.
    AlreadyInFlight,
    /// Every attempted channel failed; the record holds the details.
    AllChannelsFailed,
}

/// Result of one dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    pub alert_id: Uuid,
    pub recipient_id: Uuid,
    /// At least one channel delivered.
    pub success: bool,
    pub failure: Option<DispatchFailure>,
    /// The audit record, when channels were attempted.
    pub record: Option<NotificationRecord>,
}

impl DispatchOutcome {
    fn skipped(alert_id: Uuid, recipient_id: Uuid, failure: DispatchFailure) -> Self {
        Self {
            alert_id,
            recipient_id,
            success: false,
            failure: Some(failure),
            record: None,
        }
    }

    fn settled(record: NotificationRecord) -> Self {
        let success = record.any_sent();
        Self {
            alert_id: record.alert_id,
            recipient_id: record.recipient_id,
            success,
            failure: (!success).then_some(DispatchFailure::AllChannelsFailed),
            record: Some(record),
        }
    }
}

pub struct AlertDispatcher {
    adapters: ChannelSet,
    recorder: Arc<dyn DeliveryRecorder>,
    realtime: Arc<dyn RealtimeChannel>,
    directory: Arc<dyn RecipientDirectory>,
    renderer: MessageRenderer,
    in_flight: InFlightRegistry,
    channel_timeout: Duration,
}

impl AlertDispatcher {
    pub fn new(
        adapters: ChannelSet,
        recorder: Arc<dyn DeliveryRecorder>,
        realtime: Arc<dyn RealtimeChannel>,
        directory: Arc<dyn RecipientDirectory>,
        settings: &DeliverySettings,
    ) -> Self {
        Self {
            adapters,
            recorder,
            realtime,
            directory,
            renderer: MessageRenderer::new(settings.emergency_line.clone()),
            in_flight: InFlightRegistry::new(),
            channel_timeout: settings.channel_timeout,
        }
    }

    pub fn recorder(&self) -> &Arc<dyn DeliveryRecorder> {
        &self.recorder
    }

    /// Resolve the recipient, then dispatch.
    pub async fn dispatch_to(
        &self,
        alert: &Alert,
        recipient_id: Uuid,
    ) -> Result<DispatchOutcome, NotifierError> {
        let recipient = match self.directory.find(recipient_id).await {
            Ok(Some(recipient)) => recipient,
            Ok(None) => {
                tracing::debug!(
                    alert_id = %alert.id,
                    recipient_id = %recipient_id,
                    "Recipient not found, skipping dispatch"
                );
                return Ok(DispatchOutcome::skipped(
                    alert.id,
                    recipient_id,
                    DispatchFailure::RecipientNotFound,
                ));
            }
            Err(e) => {
                tracing::warn!(
                    alert_id = %alert.id,
                    recipient_id = %recipient_id,
                    error = %e,
                    "Recipient lookup failed, skipping dispatch"
                );
                return Ok(DispatchOutcome::skipped(
                    alert.id,
                    recipient_id,
                    DispatchFailure::DirectoryUnavailable,
                ));
            }
        };

        self.dispatch(alert, &recipient).await
    }

    /// Deliver `alert` to `recipient` on every eligible channel.
    ///
    /// Calling this again for the same pair after it returns is a retry: it
    /// opens a new record with the next attempt number and leaves earlier
    /// records untouched.
    pub async fn dispatch(
        &self,
        alert: &Alert,
        recipient: &Recipient,
    ) -> Result<DispatchOutcome, NotifierError> {
        let channels = PreferenceGate::eligible_channels(recipient, alert);
        if channels.is_empty() {
            tracing::debug!(
                alert_id = %alert.id,
                recipient_id = %recipient.id,
                "No eligible channel for recipient"
            );
            return Ok(DispatchOutcome::skipped(
                alert.id,
                recipient.id,
                DispatchFailure::NoEligibleChannel,
            ));
        }

        let Some(_guard) = self.in_flight.try_acquire(alert.id, recipient.id) else {
            tracing::debug!(
                alert_id = %alert.id,
                recipient_id = %recipient.id,
                "Dispatch already in flight for this pair"
            );
            return Ok(DispatchOutcome::skipped(
                alert.id,
                recipient.id,
                DispatchFailure::AlreadyInFlight,
            ));
        };

        let attempt_number = self
            .recorder
            .next_attempt_number(alert.id, recipient.id)
            .await?;
        let mut record =
            NotificationRecord::open(alert.id, recipient.id, attempt_number, &channels);
        self.recorder.write(&record).await?;

        let sends = channels
            .iter()
            .map(|&channel| self.send_on(alert, recipient, channel));
        let settled = join_all(sends).await;

        let now = Utc::now();
        let mut send_failures = 0;
        for (channel, result) in settled {
            match result {
                Ok(()) => record.mark_sent(channel, now),
                Err(e) => {
                    if e.is_send_failure() {
                        send_failures += 1;
                    }
                    record.mark_failed(channel, e.to_string());
                }
            }
        }
        record.complete(now);
        self.recorder.write(&record).await?;

        self.realtime
            .emit(recipient.id, RealtimeNotice::for_alert(alert));

        let outcome = DispatchOutcome::settled(record);
        tracing::info!(
            alert_id = %alert.id,
            recipient_id = %recipient.id,
            attempt = attempt_number,
            channels = channels.len(),
            send_failures,
            success = outcome.success,
            "Dispatch settled"
        );
        Ok(outcome)
    }

    /// One bounded send. Never fails the surrounding dispatch.
    async fn send_on(
        &self,
        alert: &Alert,
        recipient: &Recipient,
        channel: Channel,
    ) -> (Channel, Result<(), ChannelError>) {
        let Some(adapter) = self.adapters.get(channel) else {
            tracing::warn!(alert_id = %alert.id, channel = %channel, "Channel unavailable");
            return (channel, Err(ChannelError::Unavailable));
        };
        let Some(target) = recipient.deliverable_contact(channel) else {
            return (channel, Err(ChannelError::Unavailable));
        };

        let message = self.renderer.render(alert, channel, target);
        let result = match tokio::time::timeout(self.channel_timeout, adapter.send(&message)).await
        {
            Ok(result) => result,
            Err(_) => Err(ChannelError::Timeout(self.channel_timeout)),
        };

        if let Err(e) = &result {
            tracing::warn!(
                alert_id = %alert.id,
                recipient_id = %recipient.id,
                channel = %channel,
                error = %e,
                "Channel send failed"
            );
        }

        (channel, result)
    }
}
