//! SMS through the Twilio Messages API.

use async_trait::async_trait;

use sentinel_common::config::AppConfig;
use sentinel_common::types::Channel;

use super::{ChannelAdapter, rejection, wrong_channel};
use crate::error::ChannelError;
use crate::render::{OutboundMessage, SmsMessage};

const DEFAULT_TWILIO_BASE_URL: &str = "https://api.twilio.com";

/// Twilio credentials and sender.
#[derive(Debug, Clone)]
pub struct SmsSettings {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub base_url: String,
}

impl SmsSettings {
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        Some(Self {
            account_sid: config.twilio_account_sid.clone()?,
            auth_token: config.twilio_auth_token.clone()?,
            from_number: config.twilio_from_number.clone()?,
            base_url: DEFAULT_TWILIO_BASE_URL.to_string(),
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url.trim_end_matches('/'),
            self.account_sid
        )
    }
}

pub struct SmsAdapter {
    client: reqwest::Client,
    settings: SmsSettings,
}

impl SmsAdapter {
    pub fn new(client: reqwest::Client, settings: SmsSettings) -> Self {
        Self { client, settings }
    }

    /// Twilio has no per-message priority, so the hint only reaches the logs.
    fn build_form(&self, message: &SmsMessage) -> Vec<(&'static str, String)> {
        vec![
            ("To", message.target.clone()),
            ("From", self.settings.from_number.clone()),
            ("Body", message.body.clone()),
        ]
    }
}

#[async_trait]
impl ChannelAdapter for SmsAdapter {
    fn channel(&self) -> Channel {
        Channel::Sms
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), ChannelError> {
        let OutboundMessage::Sms(sms) = message else {
            return Err(wrong_channel(Channel::Sms, message));
        };

        let response = self
            .client
            .post(self.settings.messages_url())
            .basic_auth(&self.settings.account_sid, Some(&self.settings.auth_token))
            .form(&self.build_form(sms))
            .send()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        tracing::debug!(to = %sms.target, priority = ?sms.priority, "SMS accepted by provider");
        Ok(())
    }
}
