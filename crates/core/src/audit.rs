use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::lead::LeadId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditCategory {
    Ingress,
    Appointment,
    Delivery,
    Notification,
    Scoring,
    Persistence,
    System,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Success,
    Suppressed,
    Rejected,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditContext {
    pub lead_id: Option<LeadId>,
    pub correlation_id: String,
    pub actor: String,
}

impl AuditContext {
    pub fn new(
        lead_id: Option<LeadId>,
        correlation_id: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self { lead_id, correlation_id: correlation_id.into(), actor: actor.into() }
    }

    pub fn event(
        &self,
        event_type: impl Into<String>,
        category: AuditCategory,
        outcome: AuditOutcome,
    ) -> AuditEvent {
        AuditEvent::new(
            self.lead_id.clone(),
            self.correlation_id.clone(),
            event_type,
            category,
            self.actor.clone(),
            outcome,
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub lead_id: Option<LeadId>,
    pub correlation_id: String,
    pub event_type: String,
    pub category: AuditCategory,
    pub actor: String,
    pub outcome: AuditOutcome,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        lead_id: Option<LeadId>,
        correlation_id: impl Into<String>,
        event_type: impl Into<String>,
        category: AuditCategory,
        actor: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            lead_id,
            correlation_id: correlation_id.into(),
            event_type: event_type.into(),
            category,
            actor: actor.into(),
            outcome,
            metadata: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn events_of(&self, event_type: &str) -> Vec<AuditEvent> {
        self.events().into_iter().filter(|event| event.event_type == event_type).collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink, InMemoryAuditSink},
        domain::lead::LeadId,
    };

    #[test]
    fn in_memory_sink_records_events_with_correlation_fields() {
        let sink = InMemoryAuditSink::default();
        let context =
            AuditContext::new(Some(LeadId("L-42".to_owned())), "wamid.001", "orchestrator");
        sink.emit(
            context
                .event("appointment.rescheduled", AuditCategory::Appointment, AuditOutcome::Success)
                .with_metadata("from", "2026-03-10 11:00")
                .with_metadata("to", "2026-03-10 17:00"),
        );
        sink.emit(context.event("ingress.suppressed", AuditCategory::Ingress, AuditOutcome::Suppressed));

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].correlation_id, "wamid.001");
        assert_eq!(events[0].lead_id.as_ref().map(|id| id.0.as_str()), Some("L-42"));
        assert!(events[0].metadata.contains_key("from"));
        assert_eq!(sink.events_of("ingress.suppressed").len(), 1);
    }
}
