use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Alert severity levels, most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn is_critical(self) -> bool {
        matches!(self, Severity::Critical)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::High => write!(f, "high"),
            Severity::Medium => write!(f, "medium"),
            Severity::Low => write!(f, "low"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            other => Err(format!(
                "Invalid severity '{}'. Valid values: critical, high, medium, low",
                other
            )),
        }
    }
}

/// Out-of-app delivery medium. The in-app realtime notice is not a `Channel`:
/// it is never gated by preferences and never recorded.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum Channel {
    Push,
    Sms,
    Email,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Push, Channel::Sms, Channel::Email];
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Push => write!(f, "push"),
            Channel::Sms => write!(f, "sms"),
            Channel::Email => write!(f, "email"),
        }
    }
}

/// Per-channel delivery status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Pending => write!(f, "pending"),
            DeliveryStatus::Sent => write!(f, "sent"),
            DeliveryStatus::Failed => write!(f, "failed"),
        }
    }
}

/// An emergency alert. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Alert {
    pub id: Uuid,
    /// Hazard kind, e.g. "flood" or "storm_surge"
    pub alert_type: String,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    /// Free-form arrival estimate, e.g. "30 min"
    pub eta: Option<String>,
    pub distance: Option<String>,
    /// Prediction confidence in percent (0-100)
    pub confidence: Option<i32>,
    pub affected_population: Option<String>,
    pub evacuation_zones: Vec<String>,
    pub source: Option<String>,
    pub ai_prediction: bool,
    pub timestamp: DateTime<Utc>,
}

/// Raw preference shape accepted from clients and storage; normalised on the way in.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawChannelPreference {
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    contact: Option<String>,
}

impl From<RawChannelPreference> for ChannelPreference {
    fn from(raw: RawChannelPreference) -> Self {
        ChannelPreference::new(raw.enabled, raw.contact)
    }
}

/// A recipient's opt-in flag and contact for one channel.
///
/// The contact is trimmed on construction and blank values are dropped, so
/// `contact()` is either `None` or a non-empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawChannelPreference")]
pub struct ChannelPreference {
    enabled: bool,
    contact: Option<String>,
}

impl ChannelPreference {
    pub fn new(enabled: bool, contact: Option<String>) -> Self {
        let contact = contact
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        Self { enabled, contact }
    }

    pub fn enabled(contact: impl Into<String>) -> Self {
        Self::new(true, Some(contact.into()))
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn contact(&self) -> Option<&str> {
        self.contact.as_deref()
    }

    /// Opted in and reachable.
    pub fn is_deliverable(&self) -> bool {
        self.enabled && self.contact.is_some()
    }
}

/// A person who can receive alerts. Read-only while a dispatch is in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: Uuid,
    /// Device token
    #[serde(default)]
    pub push: ChannelPreference,
    /// Phone number
    #[serde(default)]
    pub sms: ChannelPreference,
    /// Email address
    #[serde(default)]
    pub email: ChannelPreference,
}

impl Recipient {
    pub fn new(
        id: Uuid,
        push: ChannelPreference,
        sms: ChannelPreference,
        email: ChannelPreference,
    ) -> Self {
        Self {
            id,
            push,
            sms,
            email,
        }
    }

    pub fn preference(&self, channel: Channel) -> &ChannelPreference {
        match channel {
            Channel::Push => &self.push,
            Channel::Sms => &self.sms,
            Channel::Email => &self.email,
        }
    }

    /// Contact for `channel`, only when the recipient opted in.
    pub fn deliverable_contact(&self, channel: Channel) -> Option<&str> {
        let pref = self.preference(channel);
        if pref.is_enabled() { pref.contact() } else { None }
    }
}

/// Outcome of one channel within one dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub alert_id: Uuid,
    pub recipient_id: Uuid,
    pub channel: Channel,
    pub status: DeliveryStatus,
    pub error_detail: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Audit entry for one dispatch invocation of one alert to one recipient.
///
/// Attempts are keyed by channel, so a record can never hold two attempts
/// for the same channel. Retries produce a new record with a higher
/// `attempt_number`; existing records are only ever completed, never reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub alert_id: Uuid,
    pub recipient_id: Uuid,
    pub attempt_number: i32,
    pub attempts: BTreeMap<Channel, DeliveryAttempt>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl NotificationRecord {
    /// Open a record with every channel pending.
    pub fn open(
        alert_id: Uuid,
        recipient_id: Uuid,
        attempt_number: i32,
        channels: &BTreeSet<Channel>,
    ) -> Self {
        let attempts = channels
            .iter()
            .map(|&channel| {
                (
                    channel,
                    DeliveryAttempt {
                        alert_id,
                        recipient_id,
                        channel,
                        status: DeliveryStatus::Pending,
                        error_detail: None,
                        sent_at: None,
                    },
                )
            })
            .collect();

        Self {
            id: Uuid::new_v4(),
            alert_id,
            recipient_id,
            attempt_number,
            attempts,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn mark_sent(&mut self, channel: Channel, at: DateTime<Utc>) {
        if let Some(attempt) = self.attempts.get_mut(&channel) {
            attempt.status = DeliveryStatus::Sent;
            attempt.error_detail = None;
            attempt.sent_at = Some(at);
        }
    }

    pub fn mark_failed(&mut self, channel: Channel, detail: impl Into<String>) {
        if let Some(attempt) = self.attempts.get_mut(&channel) {
            attempt.status = DeliveryStatus::Failed;
            attempt.error_detail = Some(detail.into());
            attempt.sent_at = None;
        }
    }

    pub fn complete(&mut self, at: DateTime<Utc>) {
        self.completed_at = Some(at);
    }

    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn status_of(&self, channel: Channel) -> Option<DeliveryStatus> {
        self.attempts.get(&channel).map(|a| a.status)
    }

    /// At least one channel reported delivery.
    pub fn any_sent(&self) -> bool {
        self.attempts
            .values()
            .any(|a| a.status == DeliveryStatus::Sent)
    }
}
