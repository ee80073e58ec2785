use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use leadflow_core::config::NotificationConfig;
use leadflow_core::domain::notification::StaffNotification;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notification transport error: {0}")]
    Transport(String),
    #[error("notification rejected: {0}")]
    Rejected(String),
    #[error("notification configuration error: {0}")]
    Configuration(String),
}

#[async_trait]
pub trait StaffNotifier: Send + Sync {
    fn enabled(&self) -> bool {
        true
    }

    async fn send(&self, notification: &StaffNotification) -> Result<(), NotifyError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl StaffNotifier for NoopNotifier {
    fn enabled(&self) -> bool {
        false
    }

    async fn send(&self, _notification: &StaffNotification) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Posts each notification as JSON to a staff-routing webhook.
pub struct WebhookNotifier {
    client: Client,
    url: String,
    token: SecretString,
}

impl WebhookNotifier {
    pub fn from_config(config: &NotificationConfig) -> Result<Self, NotifyError> {
        let url = config
            .webhook_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                NotifyError::Configuration("notifications.webhook_url is not set".into())
            })?;
        let token = config
            .token
            .clone()
            .ok_or_else(|| NotifyError::Configuration("notifications.token is not set".into()))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|error| NotifyError::Configuration(error.to_string()))?;

        Ok(Self { client, url, token })
    }
}

#[async_trait]
impl StaffNotifier for WebhookNotifier {
    async fn send(&self, notification: &StaffNotification) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.token.expose_secret())
            .json(notification)
            .send()
            .await
            .map_err(|error| NotifyError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected(format!("HTTP {status}: {body}")));
        }
        Ok(())
    }
}

#[derive(Default)]
struct Outbox {
    sent: Vec<StaffNotification>,
    failures_remaining: usize,
}

#[derive(Clone, Default)]
pub struct InMemoryNotifier {
    outbox: Arc<Mutex<Outbox>>,
}

impl InMemoryNotifier {
    pub fn sent(&self) -> Vec<StaffNotification> {
        self.with_outbox(|outbox| outbox.sent.clone())
    }

    pub fn fail_next(&self, attempts: usize) {
        self.with_outbox(|outbox| outbox.failures_remaining = attempts);
    }

    fn with_outbox<T>(&self, f: impl FnOnce(&mut Outbox) -> T) -> T {
        match self.outbox.lock() {
            Ok(mut outbox) => f(&mut outbox),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

#[async_trait]
impl StaffNotifier for InMemoryNotifier {
    async fn send(&self, notification: &StaffNotification) -> Result<(), NotifyError> {
        self.with_outbox(|outbox| {
            if outbox.failures_remaining > 0 {
                outbox.failures_remaining -= 1;
                return Err(NotifyError::Transport("injected failure".to_string()));
            }
            outbox.sent.push(notification.clone());
            Ok(())
        })
    }
}
