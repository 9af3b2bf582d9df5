//! Delivery channel adapters.
//!
//! Each adapter wraps one external provider:
//! - Push gateway (FCM HTTP v1 compatible)
//! - SMS (Twilio Messages API)
//! - Email (Resend HTTP API)
//!
//! Adapters are built explicitly from configuration and handed to the
//! dispatcher through a `ChannelSet`; nothing reaches them through globals.

mod email;
mod push;
mod sms;

pub use email::{EmailAdapter, EmailSettings};
pub use push::{PushAdapter, PushSettings};
pub use sms::{SmsAdapter, SmsSettings};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use sentinel_common::config::AppConfig;
use sentinel_common::types::Channel;

use crate::error::ChannelError;
use crate::render::OutboundMessage;

/// Send contract shared by every provider.
///
/// Implementations must not panic on provider errors: every failure comes
/// back as a `ChannelError`. Callers run many sends concurrently and bound
/// each one with their own timeout.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// The channel this adapter delivers on.
    fn channel(&self) -> Channel;

    /// Deliver one rendered message.
    async fn send(&self, message: &OutboundMessage) -> Result<(), ChannelError>;
}

/// Registry of configured adapters, at most one per channel.
#[derive(Clone, Default)]
pub struct ChannelSet {
    adapters: HashMap<Channel, Arc<dyn ChannelAdapter>>,
}

impl ChannelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, replacing any previous adapter for its channel.
    pub fn with_adapter(mut self, adapter: Arc<dyn ChannelAdapter>) -> Self {
        self.adapters.insert(adapter.channel(), adapter);
        self
    }

    pub fn get(&self, channel: Channel) -> Option<&Arc<dyn ChannelAdapter>> {
        self.adapters.get(&channel)
    }

    pub fn is_configured(&self, channel: Channel) -> bool {
        self.adapters.contains_key(&channel)
    }

    /// Build adapters for every provider with complete credentials.
    ///
    /// Providers with missing settings are skipped with a warning; dispatches
    /// to those channels are recorded as `ChannelUnavailable`.
    pub fn from_config(config: &AppConfig, client: reqwest::Client) -> Self {
        let mut set = Self::new();

        match PushSettings::from_config(config) {
            Some(settings) => {
                set = set.with_adapter(Arc::new(PushAdapter::new(client.clone(), settings)));
            }
            None => tracing::warn!("Push gateway not configured; push channel unavailable"),
        }

        match SmsSettings::from_config(config) {
            Some(settings) => {
                set = set.with_adapter(Arc::new(SmsAdapter::new(client.clone(), settings)));
            }
            None => tracing::warn!("SMS provider not configured; sms channel unavailable"),
        }

        match EmailSettings::from_config(config) {
            Some(settings) => {
                set = set.with_adapter(Arc::new(EmailAdapter::new(client, settings)));
            }
            None => tracing::warn!("Email provider not configured; email channel unavailable"),
        }

        set
    }
}

/// Guard used by adapters that receive a message for another channel.
pub(crate) fn wrong_channel(expected: Channel, message: &OutboundMessage) -> ChannelError {
    ChannelError::Rejected(format!(
        "{} adapter cannot send a {} message",
        expected,
        message.channel()
    ))
}

/// Map a non-success HTTP response into a rejection carrying status and body.
pub(crate) async fn rejection(response: reqwest::Response) -> ChannelError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let body = body.trim();
    if body.is_empty() {
        ChannelError::Rejected(format!("HTTP {}", status))
    } else {
        ChannelError::Rejected(format!("HTTP {}: {}", status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedAdapter;

    fn config_without_providers() -> AppConfig {
        AppConfig {
            database_url: "postgres://unused".to_string(),
            redis_url: None,
            api_port: 3000,
            db_max_connections: 5,
            broadcast_batch_size: 100,
            broadcast_batch_cooldown_ms: 1000,
            channel_timeout_ms: 10_000,
            emergency_line: "108".to_string(),
            push_gateway_url: None,
            push_server_key: None,
            twilio_account_sid: None,
            twilio_auth_token: None,
            twilio_from_number: None,
            resend_api_key: None,
            email_from: None,
        }
    }

    #[test]
    fn test_from_config_skips_incomplete_providers() {
        let mut config = config_without_providers();
        config.resend_api_key = Some("re_key".to_string());
        config.email_from = Some("alerts@example.com".to_string());
        // SID without token is incomplete
        config.twilio_account_sid = Some("AC123".to_string());

        let set = ChannelSet::from_config(&config, reqwest::Client::new());
        assert!(set.is_configured(Channel::Email));
        assert!(!set.is_configured(Channel::Sms));
        assert!(!set.is_configured(Channel::Push));
    }

    #[test]
    fn test_with_adapter_replaces_same_channel() {
        let first = ScriptedAdapter::delivering(Channel::Sms);
        let second = ScriptedAdapter::delivering(Channel::Sms);
        let set = ChannelSet::new()
            .with_adapter(first.clone())
            .with_adapter(second.clone());

        let registered = set.get(Channel::Sms).unwrap();
        let expected: Arc<dyn ChannelAdapter> = second;
        assert!(Arc::ptr_eq(registered, &expected));
    }
}
