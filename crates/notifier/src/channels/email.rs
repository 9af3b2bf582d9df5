//! Email through the Resend HTTP API.

use async_trait::async_trait;
use serde_json::json;

use sentinel_common::config::AppConfig;
use sentinel_common::types::Channel;

use super::{ChannelAdapter, rejection, wrong_channel};
use crate::error::ChannelError;
use crate::render::{EmailMessage, OutboundMessage, PriorityHint};

const DEFAULT_RESEND_URL: &str = "https://api.resend.com/emails";

/// Resend credentials and sender.
#[derive(Debug, Clone)]
pub struct EmailSettings {
    pub api_key: String,
    pub from_address: String,
    pub endpoint: String,
}

impl EmailSettings {
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        Some(Self {
            api_key: config.resend_api_key.clone()?,
            from_address: config.email_from.clone()?,
            endpoint: DEFAULT_RESEND_URL.to_string(),
        })
    }
}

pub struct EmailAdapter {
    client: reqwest::Client,
    settings: EmailSettings,
}

impl EmailAdapter {
    pub fn new(client: reqwest::Client, settings: EmailSettings) -> Self {
        Self { client, settings }
    }

    fn build_body(&self, message: &EmailMessage) -> serde_json::Value {
        let mut body = json!({
            "from": self.settings.from_address,
            "to": [message.target],
            "subject": message.subject,
            "html": message.html_body,
        });
        if message.priority == PriorityHint::High {
            body["headers"] = json!({
                "X-Priority": "1",
                "Importance": "high",
            });
        }
        body
    }
}

#[async_trait]
impl ChannelAdapter for EmailAdapter {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), ChannelError> {
        let OutboundMessage::Email(email) = message else {
            return Err(wrong_channel(Channel::Email, message));
        };

        let response = self
            .client
            .post(&self.settings.endpoint)
            .bearer_auth(&self.settings.api_key)
            .json(&self.build_body(email))
            .send()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        tracing::debug!(to = %email.target, subject = %email.subject, "Email accepted by provider");
        Ok(())
    }
}
