//! Channel payload rendering.
//!
//! Turns an `Alert` into the concrete message each adapter sends. Rendering
//! belongs to the core, not to the adapters, so every provider receives the
//! same wording and the same urgency hints for a given severity.

use serde::Serialize;
use uuid::Uuid;

use sentinel_common::types::{Alert, Channel, Severity};

/// Notification category carried in push data and realtime notices.
pub const EMERGENCY_NOTICE_TYPE: &str = "emergency";

/// Provider-level urgency hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityHint {
    Normal,
    High,
}

impl PriorityHint {
    pub fn for_severity(severity: Severity) -> Self {
        if severity.is_critical() {
            PriorityHint::High
        } else {
            PriorityHint::Normal
        }
    }
}

/// Data block attached to a push notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushData {
    #[serde(rename = "type")]
    pub kind: String,
    pub priority: String,
    #[serde(rename = "actionUrl")]
    pub action_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushMessage {
    /// Device token
    pub target: String,
    pub title: String,
    pub body: String,
    pub data: PushData,
    pub platform_priority: PriorityHint,
    /// Platform sound name; critical alerts use the emergency tone.
    pub sound: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmsMessage {
    /// Phone number
    pub target: String,
    pub body: String,
    pub priority: PriorityHint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    /// Email address
    pub target: String,
    pub subject: String,
    pub html_body: String,
    pub priority: PriorityHint,
}

/// A fully rendered message for one channel and one contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "channel", rename_all = "lowercase")]
pub enum OutboundMessage {
    Push(PushMessage),
    Sms(SmsMessage),
    Email(EmailMessage),
}

impl OutboundMessage {
    pub fn channel(&self) -> Channel {
        match self {
            OutboundMessage::Push(_) => Channel::Push,
            OutboundMessage::Sms(_) => Channel::Sms,
            OutboundMessage::Email(_) => Channel::Email,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            OutboundMessage::Push(m) => &m.target,
            OutboundMessage::Sms(m) => &m.target,
            OutboundMessage::Email(m) => &m.target,
        }
    }
}

/// Actions listed in every critical email, in this order.
const IMMEDIATE_ACTIONS: [&str; 3] = [
    "Follow evacuation orders immediately",
    "Alert family and neighbors",
    "Move to higher ground if possible",
];

/// Renders alerts into channel payloads.
#[derive(Debug, Clone)]
pub struct MessageRenderer {
    emergency_line: String,
}

impl MessageRenderer {
    pub fn new(emergency_line: impl Into<String>) -> Self {
        Self {
            emergency_line: emergency_line.into(),
        }
    }

    /// In-app link to the alert detail view.
    pub fn action_url(alert_id: Uuid) -> String {
        format!("/alerts/{}", alert_id)
    }

    pub fn render(&self, alert: &Alert, channel: Channel, target: &str) -> OutboundMessage {
        match channel {
            Channel::Push => OutboundMessage::Push(self.push(alert, target)),
            Channel::Sms => OutboundMessage::Sms(self.sms(alert, target)),
            Channel::Email => OutboundMessage::Email(self.email(alert, target)),
        }
    }

    pub fn push(&self, alert: &Alert, target: &str) -> PushMessage {
        let critical = alert.severity.is_critical();
        PushMessage {
            target: target.to_string(),
            title: alert.title.clone(),
            body: alert.description.clone(),
            data: PushData {
                kind: EMERGENCY_NOTICE_TYPE.to_string(),
                priority: alert.severity.to_string(),
                action_url: Self::action_url(alert.id),
            },
            platform_priority: PriorityHint::for_severity(alert.severity),
            sound: if critical { "emergency" } else { "default" }.to_string(),
        }
    }

    /// Plain text, fixed field order: title, description, ETA, emergency line.
    pub fn sms(&self, alert: &Alert, target: &str) -> SmsMessage {
        let body = format!(
            "{}: {}\n\n{}\n\nETA: {}\nCall {} for immediate help.",
            Self::banner(alert.severity),
            alert.title,
            alert.description,
            alert.eta.as_deref().unwrap_or("unknown"),
            self.emergency_line
        );

        SmsMessage {
            target: target.to_string(),
            body,
            priority: PriorityHint::for_severity(alert.severity),
        }
    }

    pub fn email(&self, alert: &Alert, target: &str) -> EmailMessage {
        let subject = if alert.severity.is_critical() {
            format!("CRITICAL ALERT: {}", alert.title)
        } else {
            format!(
                "{} ALERT: {}",
                alert.severity.to_string().to_uppercase(),
                alert.title
            )
        };

        EmailMessage {
            target: target.to_string(),
            subject,
            html_body: self.email_html(alert),
            priority: PriorityHint::for_severity(alert.severity),
        }
    }

    fn email_html(&self, alert: &Alert) -> String {
        let accent = match alert.severity {
            Severity::Critical => "#dc2626",
            Severity::High => "#ea580c",
            Severity::Medium => "#d97706",
            Severity::Low => "#2563eb",
        };
        let confidence = alert
            .confidence
            .map(|c| format!("{}%", c))
            .unwrap_or_else(|| "N/A".to_string());

        let checklist = if alert.severity.is_critical() {
            let mut items = format!(
                "<li>Call {} for emergency assistance</li>",
                escape_html(&self.emergency_line)
            );
            for action in IMMEDIATE_ACTIONS {
                items.push_str(&format!("<li>{}</li>", action));
            }
            format!(
                r#"
  <div style="background: #ffffff; color: {accent}; padding: 15px; border-radius: 8px; margin: 20px 0;">
    <h3 style="margin: 0 0 10px 0;">IMMEDIATE ACTIONS:</h3>
    <ul>{items}</ul>
  </div>"#
            )
        } else {
            String::new()
        };

        format!(
            r#"<div style="background: {accent}; color: white; padding: 20px; border-radius: 10px; font-family: Arial, sans-serif;">
  <h1 style="margin: 0 0 15px 0;">{banner}</h1>
  <h2 style="margin: 0 0 15px 0;">{title}</h2>
  <p style="font-size: 16px; margin: 0 0 20px 0;">{description}</p>
  <div style="padding: 15px; border-radius: 8px; margin: 20px 0;">
    <p><strong>ETA:</strong> {eta}</p>
    <p><strong>Confidence:</strong> {confidence}</p>
    <p><strong>Affected Population:</strong> {population}</p>
  </div>{checklist}
  <p style="font-size: 14px;">Generated with {confidence} confidence. Source: {source}</p>
</div>"#,
            banner = Self::banner(alert.severity),
            title = escape_html(&alert.title),
            description = escape_html(&alert.description),
            eta = escape_html(alert.eta.as_deref().unwrap_or("unknown")),
            population = escape_html(alert.affected_population.as_deref().unwrap_or("N/A")),
            source = escape_html(alert.source.as_deref().unwrap_or("N/A")),
        )
    }

    fn banner(severity: Severity) -> String {
        match severity {
            Severity::Critical => "🚨 EMERGENCY ALERT".to_string(),
            other => format!("{} ALERT", other.to_string().to_uppercase()),
        }
    }
}

impl Default for MessageRenderer {
    fn default() -> Self {
        Self::new("108")
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
