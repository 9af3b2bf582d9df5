//! Fixtures and scripted collaborators shared by the unit tests.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use sentinel_common::types::{
    Alert, Channel, ChannelPreference, NotificationRecord, Recipient, Severity,
};

use crate::channels::ChannelAdapter;
use crate::error::{ChannelError, NotifierError};
use crate::realtime::{RealtimeChannel, RealtimeNotice};
use crate::recorder::DeliveryRecorder;

/// Base URL of a local provider stand-in that answers every request with
/// `status` and `body`.
pub async fn provider_answering(status: u16, body: &'static str) -> String {
    let status = axum::http::StatusCode::from_u16(status).unwrap();
    let app = axum::Router::new().fallback(move || async move { (status, body) });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Base URL of a local port with nothing listening on it.
pub async fn unreachable_provider() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// The "Flood Warning" alert used throughout the tests.
pub fn sample_alert(severity: Severity) -> Alert {
    Alert {
        id: Uuid::new_v4(),
        alert_type: "flood".to_string(),
        severity,
        title: "Flood Warning".to_string(),
        description: "River levels rising rapidly near the estuary.".to_string(),
        eta: Some("30 min".to_string()),
        distance: Some("2.5 km".to_string()),
        confidence: Some(92),
        affected_population: Some("12,000 residents".to_string()),
        evacuation_zones: vec!["Zone A".to_string()],
        source: Some("Coastal Sentinel AI".to_string()),
        ai_prediction: true,
        timestamp: Utc::now(),
    }
}

pub fn recipient_with(
    push: ChannelPreference,
    sms: ChannelPreference,
    email: ChannelPreference,
) -> Recipient {
    Recipient::new(Uuid::new_v4(), push, sms, email)
}

/// Recipient opted in and reachable on every channel.
pub fn full_recipient() -> Recipient {
    recipient_with(
        ChannelPreference::enabled("tok1"),
        ChannelPreference::enabled("+15550001111"),
        ChannelPreference::enabled("resident@example.com"),
    )
}

/// Recipient reachable by push only.
pub fn push_only_recipient() -> Recipient {
    recipient_with(
        ChannelPreference::enabled(format!("tok-{}", Uuid::new_v4())),
        ChannelPreference::disabled(),
        ChannelPreference::disabled(),
    )
}

#[derive(Debug, Clone)]
pub enum Behaviour {
    Deliver,
    Fail(ChannelError),
    /// Never settles; only a timeout ends the send.
    Hang,
}

#[derive(Debug, Clone)]
pub struct SendCall {
    pub target: String,
    pub started: Instant,
    pub finished: Option<Instant>,
}

/// Adapter whose result and latency are scripted by the test.
pub struct ScriptedAdapter {
    channel: Channel,
    behaviour: Mutex<Behaviour>,
    delay: Duration,
    calls: Mutex<Vec<SendCall>>,
}

impl ScriptedAdapter {
    pub fn new(channel: Channel, behaviour: Behaviour, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            channel,
            behaviour: Mutex::new(behaviour),
            delay,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn delivering(channel: Channel) -> Arc<Self> {
        Self::new(channel, Behaviour::Deliver, Duration::ZERO)
    }

    pub fn failing(channel: Channel, err: ChannelError) -> Arc<Self> {
        Self::new(channel, Behaviour::Fail(err), Duration::ZERO)
    }

    pub fn set_behaviour(&self, behaviour: Behaviour) {
        *self.behaviour.lock().unwrap() = behaviour;
    }

    pub fn calls(&self) -> Vec<SendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ChannelAdapter for ScriptedAdapter {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, message: &crate::render::OutboundMessage) -> Result<(), ChannelError> {
        assert_eq!(message.channel(), self.channel, "message routed to wrong adapter");
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(SendCall {
                target: message.target().to_string(),
                started: Instant::now(),
                finished: None,
            });
            calls.len() - 1
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let behaviour = self.behaviour.lock().unwrap().clone();
        let result = match behaviour {
            Behaviour::Deliver => Ok(()),
            Behaviour::Fail(err) => Err(err),
            Behaviour::Hang => std::future::pending().await,
        };

        self.calls.lock().unwrap()[index].finished = Some(Instant::now());
        result
    }
}

/// Realtime channel that remembers every emission.
#[derive(Default)]
pub struct RecordingRealtime {
    emitted: Mutex<Vec<(Uuid, RealtimeNotice)>>,
}

impl RecordingRealtime {
    pub fn emitted(&self) -> Vec<(Uuid, RealtimeNotice)> {
        self.emitted.lock().unwrap().clone()
    }
}

impl RealtimeChannel for RecordingRealtime {
    fn emit(&self, recipient_id: Uuid, notice: RealtimeNotice) {
        self.emitted.lock().unwrap().push((recipient_id, notice));
    }
}

/// Recorder whose storage is permanently down.
pub struct FailingRecorder;

#[async_trait]
impl DeliveryRecorder for FailingRecorder {
    async fn next_attempt_number(&self, _: Uuid, _: Uuid) -> Result<i32, NotifierError> {
        Ok(1)
    }

    async fn write(&self, _: &NotificationRecord) -> Result<(), NotifierError> {
        Err(NotifierError::Recorder("connection refused".to_string()))
    }

    async fn query_by_alert(&self, _: Uuid) -> Result<Vec<NotificationRecord>, NotifierError> {
        Ok(Vec::new())
    }

    async fn query_by_recipient(&self, _: Uuid) -> Result<Vec<NotificationRecord>, NotifierError> {
        Ok(Vec::new())
    }
}
