//! Push notifications through an FCM HTTP v1 compatible gateway.

use async_trait::async_trait;
use serde_json::json;

use sentinel_common::config::AppConfig;
use sentinel_common::types::Channel;

use super::{ChannelAdapter, rejection, wrong_channel};
use crate::error::ChannelError;
use crate::render::{OutboundMessage, PriorityHint, PushMessage};

/// Push gateway settings.
#[derive(Debug, Clone)]
pub struct PushSettings {
    /// Full send URL, e.g. `https://fcm.googleapis.com/v1/projects/<id>/messages:send`
    pub gateway_url: String,
    /// Bearer credential for the gateway
    pub server_key: String,
}

impl PushSettings {
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        Some(Self {
            gateway_url: config.push_gateway_url.clone()?,
            server_key: config.push_server_key.clone()?,
        })
    }
}

pub struct PushAdapter {
    client: reqwest::Client,
    settings: PushSettings,
}

impl PushAdapter {
    pub fn new(client: reqwest::Client, settings: PushSettings) -> Self {
        Self { client, settings }
    }

    /// Gateway request body. Critical alerts raise the Android priority and
    /// switch both platforms to the emergency sound.
    fn build_body(message: &PushMessage) -> serde_json::Value {
        let android_priority = match message.platform_priority {
            PriorityHint::High => "high",
            PriorityHint::Normal => "normal",
        };
        let apns_sound = if message.sound == "default" {
            "default".to_string()
        } else {
            format!("{}.wav", message.sound)
        };

        json!({
            "message": {
                "token": message.target,
                "notification": {
                    "title": message.title,
                    "body": message.body,
                },
                "data": {
                    "type": message.data.kind,
                    "priority": message.data.priority,
                    "actionUrl": message.data.action_url,
                },
                "android": {
                    "priority": android_priority,
                    "notification": {
                        "channel_id": message.data.kind,
                        "sound": message.sound,
                    },
                },
                "apns": {
                    "payload": {
                        "aps": { "sound": apns_sound }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl ChannelAdapter for PushAdapter {
    fn channel(&self) -> Channel {
        Channel::Push
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), ChannelError> {
        let OutboundMessage::Push(push) = message else {
            return Err(wrong_channel(Channel::Push, message));
        };

        let response = self
            .client
            .post(&self.settings.gateway_url)
            .bearer_auth(&self.settings.server_key)
            .json(&Self::build_body(push))
            .send()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        tracing::debug!(target_token = %push.target, "Push notification accepted by gateway");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::MessageRenderer;
    use crate::test_support::{provider_answering, sample_alert, unreachable_provider};
    use sentinel_common::types::Severity;

    #[test]
    fn test_critical_body_escalates_platform_hints() {
        let msg = MessageRenderer::default().push(&sample_alert(Severity::Critical), "tok1");
        let body = PushAdapter::build_body(&msg);
        assert_eq!(body["message"]["token"], "tok1");
        assert_eq!(body["message"]["android"]["priority"], "high");
        assert_eq!(body["message"]["android"]["notification"]["sound"], "emergency");
        assert_eq!(body["message"]["apns"]["payload"]["aps"]["sound"], "emergency.wav");
        assert_eq!(body["message"]["data"]["type"], "emergency");
    }

    #[test]
    fn test_non_critical_body_uses_defaults() {
        let msg = MessageRenderer::default().push(&sample_alert(Severity::Low), "tok1");
        let body = PushAdapter::build_body(&msg);
        assert_eq!(body["message"]["android"]["priority"], "normal");
        assert_eq!(body["message"]["apns"]["payload"]["aps"]["sound"], "default");
    }

    fn adapter_at(gateway_url: String) -> PushAdapter {
        PushAdapter::new(
            reqwest::Client::new(),
            PushSettings {
                gateway_url,
                server_key: "key".to_string(),
            },
        )
    }

    fn critical_push() -> OutboundMessage {
        MessageRenderer::default().render(&sample_alert(Severity::Critical), Channel::Push, "tok1")
    }

    #[tokio::test]
    async fn test_gateway_accepts() {
        let base = provider_answering(200, r#"{"name":"projects/p/messages/1"}"#).await;
        let adapter = adapter_at(format!("{}/v1/projects/p/messages:send", base));
        assert_eq!(adapter.send(&critical_push()).await, Ok(()));
    }

    #[tokio::test]
    async fn test_non_success_status_is_rejection_with_body() {
        let base = provider_answering(429, "quota exceeded\n").await;
        let adapter = adapter_at(format!("{}/v1/projects/p/messages:send", base));
        let err = adapter.send(&critical_push()).await.unwrap_err();
        assert_eq!(
            err,
            ChannelError::Rejected("HTTP 429 Too Many Requests: quota exceeded".to_string())
        );
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_transport_failure() {
        let adapter = adapter_at(unreachable_provider().await);
        let err = adapter.send(&critical_push()).await.unwrap_err();
        assert!(matches!(err, ChannelError::Transport(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_rejects_message_for_other_channel() {
        let adapter = PushAdapter::new(
            reqwest::Client::new(),
            PushSettings {
                gateway_url: "http://127.0.0.1:9/unused".to_string(),
                server_key: "key".to_string(),
            },
        );
        let sms = MessageRenderer::default().render(
            &sample_alert(Severity::Low),
            Channel::Sms,
            "+15550001111",
        );
        let err = adapter.send(&sms).await.unwrap_err();
        assert!(matches!(err, ChannelError::Rejected(_)));
    }
}
