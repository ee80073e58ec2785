//! Calendar provider seam. The sync adapter decides create vs. update; providers only
//! perform the call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use leadflow_core::config::CalendarConfig;
use leadflow_core::domain::appointment::Appointment;
use leadflow_core::domain::lead::Lead;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("calendar transport error: {0}")]
    Transport(String),
    #[error("calendar api error: {0}")]
    Api(String),
    #[error("calendar configuration error: {0}")]
    Configuration(String),
}

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Disabled providers are skipped entirely; appointments stay ref-less.
    fn enabled(&self) -> bool {
        true
    }

    /// Returns the provider's event reference.
    async fn create_event(&self, appointment: &Appointment, lead: &Lead)
        -> Result<String, CalendarError>;

    async fn update_event(
        &self,
        event_ref: &str,
        appointment: &Appointment,
        lead: &Lead,
    ) -> Result<(), CalendarError>;

    async fn cancel_event(&self, event_ref: &str) -> Result<(), CalendarError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopCalendar;

#[async_trait]
impl CalendarProvider for NoopCalendar {
    fn enabled(&self) -> bool {
        false
    }

    async fn create_event(
        &self,
        appointment: &Appointment,
        _lead: &Lead,
    ) -> Result<String, CalendarError> {
        Err(CalendarError::Configuration(format!(
            "calendar disabled; cannot create event for {}",
            appointment.id.0
        )))
    }

    async fn update_event(
        &self,
        _event_ref: &str,
        _appointment: &Appointment,
        _lead: &Lead,
    ) -> Result<(), CalendarError> {
        Ok(())
    }

    async fn cancel_event(&self, _event_ref: &str) -> Result<(), CalendarError> {
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct EventPayload<'a> {
    appointment_id: &'a str,
    kind: &'a str,
    development: Option<&'a str>,
    date: String,
    time: String,
    status: &'a str,
    lead_phone: &'a str,
    lead_name: Option<&'a str>,
}

impl<'a> EventPayload<'a> {
    fn new(appointment: &'a Appointment, lead: &'a Lead) -> Self {
        Self {
            appointment_id: &appointment.id.0,
            kind: appointment.kind.as_str(),
            development: appointment.development.as_deref(),
            date: appointment.scheduled_date.format("%Y-%m-%d").to_string(),
            time: appointment.scheduled_time.format("%H:%M").to_string(),
            status: appointment.status.as_str(),
            lead_phone: &lead.phone,
            lead_name: lead.resolved_name(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    id: String,
}

/// JSON-over-HTTP calendar bridge: `POST /events`, `PUT /events/{id}`, `DELETE /events/{id}`.
pub struct HttpCalendar {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl HttpCalendar {
    pub fn from_config(config: &CalendarConfig) -> Result<Self, CalendarError> {
        let base_url = config
            .base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| CalendarError::Configuration("calendar.base_url is not set".into()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|error| CalendarError::Configuration(error.to_string()))?;

        Ok(Self { client, base_url, api_key: config.api_key.clone() })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key.expose_secret()),
            None => request,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, CalendarError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(CalendarError::Api(format!("HTTP {status}: {body}")))
    }
}

#[async_trait]
impl CalendarProvider for HttpCalendar {
    async fn create_event(
        &self,
        appointment: &Appointment,
        lead: &Lead,
    ) -> Result<String, CalendarError> {
        let request = self
            .client
            .post(format!("{}/events", self.base_url))
            .header("idempotency-key", appointment.id.0.as_str())
            .json(&EventPayload::new(appointment, lead));
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|error| CalendarError::Transport(error.to_string()))?;

        let created: CreatedEvent = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|error| CalendarError::Api(format!("invalid create response: {error}")))?;
        Ok(created.id)
    }

    async fn update_event(
        &self,
        event_ref: &str,
        appointment: &Appointment,
        lead: &Lead,
    ) -> Result<(), CalendarError> {
        let request = self
            .client
            .put(format!("{}/events/{event_ref}", self.base_url))
            .json(&EventPayload::new(appointment, lead));
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|error| CalendarError::Transport(error.to_string()))?;
        Self::check(response).await.map(|_| ())
    }

    async fn cancel_event(&self, event_ref: &str) -> Result<(), CalendarError> {
        let request = self.client.delete(format!("{}/events/{event_ref}", self.base_url));
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|error| CalendarError::Transport(error.to_string()))?;

        // Already gone upstream counts as cancelled.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check(response).await.map(|_| ())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CalendarCall {
    Create { appointment_id: String },
    Update { event_ref: String, slot: String },
    Cancel { event_ref: String },
}

#[derive(Default)]
struct RecordingState {
    calls: Vec<CalendarCall>,
    events: HashMap<String, String>,
    by_appointment: HashMap<String, String>,
    failures_remaining: usize,
    next_id: usize,
}

/// Records calls and keeps events in memory. `fail_next` injects transient failures.
#[derive(Clone, Default)]
pub struct InMemoryCalendar {
    state: Arc<Mutex<RecordingState>>,
}

impl InMemoryCalendar {
    pub fn fail_next(&self, attempts: usize) {
        self.with_state(|state| state.failures_remaining = attempts);
    }

    pub fn calls(&self) -> Vec<CalendarCall> {
        self.with_state(|state| state.calls.clone())
    }

    /// Slot currently stored for `event_ref`, formatted `YYYY-MM-DD HH:MM`.
    pub fn event_slot(&self, event_ref: &str) -> Option<String> {
        self.with_state(|state| state.events.get(event_ref).cloned())
    }

    /// Events currently live in the calendar.
    pub fn event_count(&self) -> usize {
        self.with_state(|state| state.events.len())
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut RecordingState) -> T) -> T {
        match self.state.lock() {
            Ok(mut state) => f(&mut state),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    fn take_failure(state: &mut RecordingState) -> Result<(), CalendarError> {
        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(CalendarError::Transport("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CalendarProvider for InMemoryCalendar {
    async fn create_event(
        &self,
        appointment: &Appointment,
        _lead: &Lead,
    ) -> Result<String, CalendarError> {
        self.with_state(|state| {
            state.calls.push(CalendarCall::Create { appointment_id: appointment.id.0.clone() });
            Self::take_failure(state)?;
            // Same idempotency key as the HTTP adapter: one event per appointment id.
            if let Some(existing) = state.by_appointment.get(&appointment.id.0) {
                return Ok(existing.clone());
            }
            state.next_id += 1;
            let event_ref = format!("evt-{}", state.next_id);
            state.events.insert(event_ref.clone(), appointment.slot().to_string());
            state.by_appointment.insert(appointment.id.0.clone(), event_ref.clone());
            Ok(event_ref)
        })
    }

    async fn update_event(
        &self,
        event_ref: &str,
        appointment: &Appointment,
        _lead: &Lead,
    ) -> Result<(), CalendarError> {
        self.with_state(|state| {
            let slot = appointment.slot().to_string();
            state.calls.push(CalendarCall::Update {
                event_ref: event_ref.to_string(),
                slot: slot.clone(),
            });
            Self::take_failure(state)?;
            state.events.insert(event_ref.to_string(), slot);
            Ok(())
        })
    }

    async fn cancel_event(&self, event_ref: &str) -> Result<(), CalendarError> {
        self.with_state(|state| {
            state.calls.push(CalendarCall::Cancel { event_ref: event_ref.to_string() });
            Self::take_failure(state)?;
            state.events.remove(event_ref);
            Ok(())
        })
    }
}
