use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use leadflow_core::domain::appointment::{Appointment, AppointmentId, AppointmentKind};
use leadflow_core::domain::batch::{MutationBatch, ProcessedMessage};
use leadflow_core::domain::conversation::{retain_window, ConversationTurn};
use leadflow_core::domain::delivery::{DeliveryKey, ResourceDeliveryRecord};
use leadflow_core::domain::lead::{Lead, LeadId};
use leadflow_core::domain::notification::{NotificationKey, NotificationRecord};

use super::{
    AppointmentRepository, ConversationRepository, DeliveryRepository, LeadRepository,
    MessageLedgerRepository, MutationStore, NotificationRepository, RepositoryError,
};

#[derive(Default)]
struct State {
    leads: HashMap<String, Lead>,
    appointments: BTreeMap<String, Appointment>,
    turns: HashMap<String, Vec<ConversationTurn>>,
    deliveries: BTreeMap<DeliveryKey, ResourceDeliveryRecord>,
    notifications: HashMap<NotificationKey, NotificationRecord>,
    processed: HashMap<String, ProcessedMessage>,
}

impl State {
    fn check_lead(&self, lead: &Lead) -> Result<(), RepositoryError> {
        let taken = self
            .leads
            .values()
            .any(|existing| existing.phone == lead.phone && existing.id != lead.id);
        if taken {
            return Err(RepositoryError::Conflict(format!(
                "lead: phone {} already exists",
                lead.phone
            )));
        }
        Ok(())
    }

    fn check_appointment(
        &self,
        appointment: &Appointment,
        pending: &[&Appointment],
    ) -> Result<(), RepositoryError> {
        if !appointment.is_active() {
            return Ok(());
        }

        let mut merged = self.appointments.clone();
        for staged in pending {
            merged.insert(staged.id.0.clone(), (*staged).clone());
        }

        let clash = merged.values().any(|existing| {
            existing.id != appointment.id
                && existing.lead_id == appointment.lead_id
                && existing.kind == appointment.kind
                && existing.is_active()
        });
        if clash {
            return Err(RepositoryError::Conflict(format!(
                "active appointment: lead {} already has an active {}",
                appointment.lead_id.0,
                appointment.kind.as_str()
            )));
        }
        Ok(())
    }

    fn push_turn(&mut self, turn: ConversationTurn, window: usize) {
        let history = self.turns.entry(turn.lead_id.0.clone()).or_default();
        history.push(turn);
        retain_window(history, window);
    }
}

/// Whole-store stand-in for the SQL repositories. Clones share state.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub async fn lead_count(&self) -> usize {
        self.state.read().await.leads.len()
    }

    pub async fn appointments(&self) -> Vec<Appointment> {
        self.state.read().await.appointments.values().cloned().collect()
    }

    pub async fn turns(&self, lead_id: &LeadId) -> Vec<ConversationTurn> {
        self.state.read().await.turns.get(&lead_id.0).cloned().unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl LeadRepository for InMemoryStore {
    async fn find_by_id(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        Ok(self.state.read().await.leads.get(&id.0).cloned())
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Lead>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.leads.values().find(|lead| lead.phone == phone).cloned())
    }

    async fn save(&self, lead: Lead) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.check_lead(&lead)?;
        state.leads.insert(lead.id.0.clone(), lead);
        Ok(())
    }
}

#[async_trait::async_trait]
impl AppointmentRepository for InMemoryStore {
    async fn find_by_id(
        &self,
        id: &AppointmentId,
    ) -> Result<Option<Appointment>, RepositoryError> {
        Ok(self.state.read().await.appointments.get(&id.0).cloned())
    }

    async fn find_active(
        &self,
        lead_id: &LeadId,
        kind: AppointmentKind,
    ) -> Result<Option<Appointment>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .appointments
            .values()
            .find(|appointment| {
                &appointment.lead_id == lead_id
                    && appointment.kind == kind
                    && appointment.is_active()
            })
            .cloned())
    }

    async fn list_for_lead(&self, lead_id: &LeadId) -> Result<Vec<Appointment>, RepositoryError> {
        let state = self.state.read().await;
        let mut appointments = state
            .appointments
            .values()
            .filter(|appointment| &appointment.lead_id == lead_id)
            .cloned()
            .collect::<Vec<_>>();
        appointments.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        Ok(appointments)
    }

    async fn list_sync_pending(&self) -> Result<Vec<Appointment>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .appointments
            .values()
            .filter(|appointment| appointment.sync_pending)
            .cloned()
            .collect())
    }

    async fn save(&self, appointment: Appointment) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.check_appointment(&appointment, &[])?;
        state.appointments.insert(appointment.id.0.clone(), appointment);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ConversationRepository for InMemoryStore {
    async fn append(&self, turn: ConversationTurn, window: usize) -> Result<(), RepositoryError> {
        self.state.write().await.push_turn(turn, window);
        Ok(())
    }

    async fn recent(
        &self,
        lead_id: &LeadId,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, RepositoryError> {
        let mut turns = self.turns(lead_id).await;
        retain_window(&mut turns, limit);
        Ok(turns)
    }
}

#[async_trait::async_trait]
impl DeliveryRepository for InMemoryStore {
    async fn find(
        &self,
        key: &DeliveryKey,
    ) -> Result<Option<ResourceDeliveryRecord>, RepositoryError> {
        Ok(self.state.read().await.deliveries.get(key).cloned())
    }

    async fn list_for_lead(
        &self,
        lead_id: &LeadId,
    ) -> Result<Vec<ResourceDeliveryRecord>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .deliveries
            .values()
            .filter(|record| &record.key.lead_id == lead_id)
            .cloned()
            .collect())
    }

    async fn record(&self, record: ResourceDeliveryRecord) -> Result<(), RepositoryError> {
        self.state.write().await.deliveries.insert(record.key.clone(), record);
        Ok(())
    }
}

#[async_trait::async_trait]
impl NotificationRepository for InMemoryStore {
    async fn find(
        &self,
        key: &NotificationKey,
    ) -> Result<Option<NotificationRecord>, RepositoryError> {
        Ok(self.state.read().await.notifications.get(key).cloned())
    }

    async fn save(&self, record: NotificationRecord) -> Result<(), RepositoryError> {
        self.state.write().await.notifications.insert(record.key.clone(), record);
        Ok(())
    }
}

#[async_trait::async_trait]
impl MessageLedgerRepository for InMemoryStore {
    async fn is_processed(&self, message_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.state.read().await.processed.contains_key(message_id))
    }

    async fn last_processed_at(
        &self,
        lead_id: &LeadId,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .processed
            .values()
            .filter(|message| &message.lead_id == lead_id)
            .map(|message| message.processed_at)
            .max())
    }
}

#[async_trait::async_trait]
impl MutationStore for InMemoryStore {
    async fn apply_batch(
        &self,
        batch: &MutationBatch,
        conversation_window: usize,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;

        // Validate everything before touching state so a failed batch leaves nothing behind.
        if let Some(lead) = &batch.lead {
            state.check_lead(lead)?;
        }
        if let Some(message) = &batch.processed_message {
            if state.processed.contains_key(&message.message_id) {
                return Err(RepositoryError::Conflict(format!(
                    "processed message: {} already recorded",
                    message.message_id
                )));
            }
        }
        let (closing, opening): (Vec<_>, Vec<_>) =
            batch.appointments.iter().partition(|appointment| !appointment.is_active());
        let mut staged: Vec<&Appointment> = closing;
        for appointment in opening {
            state.check_appointment(appointment, &staged)?;
            staged.push(appointment);
        }

        if let Some(lead) = &batch.lead {
            state.leads.insert(lead.id.0.clone(), lead.clone());
        }
        if let Some(message) = &batch.processed_message {
            state.processed.insert(message.message_id.clone(), message.clone());
        }
        for appointment in staged {
            state.appointments.insert(appointment.id.0.clone(), appointment.clone());
        }
        for record in &batch.delivery_records {
            state.deliveries.insert(record.key.clone(), record.clone());
        }
        for record in &batch.notification_records {
            state.notifications.insert(record.key.clone(), record.clone());
        }
        for turn in &batch.turns {
            state.push_turn(turn.clone(), conversation_window);
        }
        Ok(())
    }
}
