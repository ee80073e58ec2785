use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::appointment::Appointment;
use crate::domain::conversation::ConversationTurn;
use crate::domain::delivery::ResourceDeliveryRecord;
use crate::domain::lead::{Lead, LeadId};
use crate::domain::notification::NotificationRecord;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedMessage {
    pub message_id: String,
    pub lead_id: LeadId,
    pub processed_at: DateTime<Utc>,
}

/// Every state change produced while handling one inbound message.
///
/// Components append to the batch; the store applies it in a single transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationBatch {
    pub lead: Option<Lead>,
    pub appointments: Vec<Appointment>,
    pub delivery_records: Vec<ResourceDeliveryRecord>,
    pub notification_records: Vec<NotificationRecord>,
    pub turns: Vec<ConversationTurn>,
    pub processed_message: Option<ProcessedMessage>,
}

impl MutationBatch {
    pub fn is_empty(&self) -> bool {
        self.lead.is_none()
            && self.appointments.is_empty()
            && self.delivery_records.is_empty()
            && self.notification_records.is_empty()
            && self.turns.is_empty()
            && self.processed_message.is_none()
    }

    /// Replaces any earlier upsert of the same appointment so the batch carries its final state.
    pub fn upsert_appointment(&mut self, appointment: Appointment) {
        self.appointments.retain(|existing| existing.id != appointment.id);
        self.appointments.push(appointment);
    }

    pub fn push_notification_record(&mut self, record: NotificationRecord) {
        self.notification_records.retain(|existing| existing.key != record.key);
        self.notification_records.push(record);
    }
}
