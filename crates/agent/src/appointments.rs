use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use leadflow_core::appointments::{
    decide, AppointmentCommand, BusinessHours, LifecycleContext, LifecycleDecision,
};
use leadflow_core::domain::appointment::{Appointment, AppointmentKind};
use leadflow_core::domain::batch::MutationBatch;
use leadflow_core::domain::lead::{Lead, LeadId};
use leadflow_core::domain::notification::{NotificationReason, RecipientRole, StaffNotification};
use leadflow_db::repositories::{AppointmentRepository, LeadRepository, RepositoryError};

use crate::sync::ExternalSync;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppointmentOutcome {
    pub decision: LifecycleDecision,
    /// Staff alert owed for this change; the caller routes it through the cooldown.
    pub notification: Option<StaffNotification>,
}

/// Runs lifecycle decisions against freshly fetched state and stages the result.
pub struct AppointmentManager {
    appointments: Arc<dyn AppointmentRepository>,
    hours: BusinessHours,
    sync: Arc<ExternalSync>,
}

impl AppointmentManager {
    pub fn new(
        appointments: Arc<dyn AppointmentRepository>,
        hours: BusinessHours,
        sync: Arc<ExternalSync>,
    ) -> Self {
        Self { appointments, hours, sync }
    }

    pub fn hours(&self) -> &BusinessHours {
        &self.hours
    }

    /// Active appointments of every kind for the lead, read from the store.
    pub async fn active_for(&self, lead_id: &LeadId) -> Result<Vec<Appointment>, RepositoryError> {
        let mut active = Vec::new();
        for kind in [AppointmentKind::Visit, AppointmentKind::Callback] {
            if let Some(appointment) = self.appointments.find_active(lead_id, kind).await? {
                active.push(appointment);
            }
        }
        Ok(active)
    }

    /// Call with the lead lock held. Mutations go into `batch`; nothing is written and no
    /// external call is made here.
    pub async fn execute(
        &self,
        command: &AppointmentCommand,
        lead: &Lead,
        now: DateTime<Utc>,
        batch: &mut MutationBatch,
    ) -> Result<AppointmentOutcome, RepositoryError> {
        let active = self.appointments.find_active(&lead.id, command.kind()).await?;
        let ctx = LifecycleContext { lead, active: active.as_ref(), hours: &self.hours, now };
        let mut decision = decide(command, &ctx);

        if let Some(appointment) = decision.mutated_mut() {
            // Owed to the calendar until the post-commit sync clears it.
            appointment.sync_pending = self.sync.calendar_enabled();
            batch.upsert_appointment(appointment.clone());
        }

        let notification = notification_for(&decision, lead);
        match &decision {
            LifecycleDecision::Rejected { error, .. } => info!(
                event_name = "appointment.rejected",
                lead_id = %lead.id.0,
                error = %error,
                "appointment request rejected"
            ),
            decision => {
                if let Some(appointment) = decision.mutated() {
                    info!(
                        event_name = "appointment.mutated",
                        lead_id = %lead.id.0,
                        appointment_id = %appointment.id.0,
                        status = appointment.status.as_str(),
                        slot = %appointment.slot(),
                        sync_pending = appointment.sync_pending,
                        "appointment staged"
                    );
                }
            }
        }

        Ok(AppointmentOutcome { decision, notification })
    }

    /// Retries the calendar for appointments left `sync_pending`. Returns how many recovered.
    pub async fn resync_pending(
        &self,
        leads: &dyn LeadRepository,
    ) -> Result<usize, RepositoryError> {
        let mut recovered = 0;
        for mut appointment in self.appointments.list_sync_pending().await? {
            let Some(lead) = leads.find_by_id(&appointment.lead_id).await? else {
                warn!(
                    event_name = "appointment.resync.orphan",
                    appointment_id = %appointment.id.0,
                    "sync-pending appointment has no lead"
                );
                continue;
            };
            if self.sync.sync_calendar(&mut appointment, &lead).await.is_ok() {
                self.appointments.save(appointment).await?;
                recovered += 1;
            }
        }
        Ok(recovered)
    }
}

fn notification_for(decision: &LifecycleDecision, lead: &Lead) -> Option<StaffNotification> {
    let (reason, appointment, verb) = match decision {
        LifecycleDecision::Created(appointment) => {
            (NotificationReason::AppointmentBooked, appointment, "booked")
        }
        LifecycleDecision::Rescheduled { appointment, .. } => {
            (NotificationReason::AppointmentRescheduled, appointment, "rescheduled")
        }
        LifecycleDecision::Cancelled(appointment) => {
            (NotificationReason::AppointmentCancelled, appointment, "cancelled")
        }
        _ => return None,
    };

    let who = lead.resolved_name().unwrap_or(lead.phone.as_str());
    let mut text =
        format!("{who} {verb} a {} for {}", appointment.kind.as_str(), appointment.slot());
    if let Some(development) = &appointment.development {
        text.push_str(&format!(" at {development}"));
    }
    if let LifecycleDecision::Rescheduled { previous, .. } = decision {
        text.push_str(&format!(" (was {previous})"));
    }
    text.push_str(&format!(". Phone: {}", lead.phone));

    Some(StaffNotification {
        lead_id: lead.id.clone(),
        recipient_role: RecipientRole::AssignedAgent,
        recipient_id: appointment
            .assigned_agent_id
            .clone()
            .or_else(|| lead.assigned_agent_id.clone()),
        reason,
        text,
    })
}
