use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::lead::LeadId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppointmentId(pub String);

impl AppointmentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentKind {
    Visit,
    Callback,
}

impl AppointmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Visit => "visit",
            Self::Callback => "callback",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "visit" => Some(Self::Visit),
            "callback" => Some(Self::Callback),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
            Self::NoShow => "no_show",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "scheduled" => Some(Self::Scheduled),
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            "completed" => Some(Self::Completed),
            "no_show" => Some(Self::NoShow),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Scheduled | Self::Confirmed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.date.format("%Y-%m-%d"), self.time.format("%H:%M"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub lead_id: LeadId,
    pub kind: AppointmentKind,
    pub development: Option<String>,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub status: AppointmentStatus,
    pub external_calendar_ref: Option<String>,
    pub rescheduled_from: Option<Slot>,
    pub assigned_agent_id: Option<String>,
    pub sync_pending: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn slot(&self) -> Slot {
        Slot { date: self.scheduled_date, time: self.scheduled_time }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::{Cancelled, Completed, Confirmed, NoShow, Scheduled};

        matches!(
            (self.status, next),
            (Scheduled, Confirmed)
                | (Scheduled, Cancelled)
                | (Confirmed, Cancelled)
                | (Scheduled, Completed)
                | (Confirmed, Completed)
                | (Scheduled, NoShow)
                | (Confirmed, NoShow)
        )
    }

    pub fn transition_to(
        &mut self,
        next: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            self.updated_at = now;
            return Ok(());
        }

        Err(DomainError::InvalidAppointmentTransition { from: self.status, to: next })
    }

    /// Moves the appointment to a new slot without changing its identity or calendar reference.
    pub fn reschedule_in_place(&mut self, to: Slot, now: DateTime<Utc>) -> Result<Slot, DomainError> {
        if !self.is_active() {
            return Err(DomainError::InvariantViolation(format!(
                "cannot reschedule appointment {} in status {}",
                self.id.0,
                self.status.as_str()
            )));
        }

        let previous = self.slot();
        self.scheduled_date = to.date;
        self.scheduled_time = to.time;
        self.rescheduled_from = Some(previous);
        self.updated_at = now;
        Ok(previous)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime, Utc};

    use super::{Appointment, AppointmentId, AppointmentKind, AppointmentStatus, Slot};
    use crate::domain::lead::LeadId;

    fn appointment(status: AppointmentStatus) -> Appointment {
        let now = Utc::now();
        Appointment {
            id: AppointmentId("APT-1".to_string()),
            lead_id: LeadId("L-1".to_string()),
            kind: AppointmentKind::Visit,
            development: Some("Miravalle".to_string()),
            scheduled_date: NaiveDate::from_ymd_opt(2026, 3, 10).expect("date"),
            scheduled_time: NaiveTime::from_hms_opt(11, 0, 0).expect("time"),
            status,
            external_calendar_ref: Some("evt-1".to_string()),
            rescheduled_from: None,
            assigned_agent_id: None,
            sync_pending: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn scheduled_can_be_confirmed_then_cancelled() {
        let mut appointment = appointment(AppointmentStatus::Scheduled);
        appointment.transition_to(AppointmentStatus::Confirmed, Utc::now()).expect("confirm");
        appointment.transition_to(AppointmentStatus::Cancelled, Utc::now()).expect("cancel");
        assert_eq!(appointment.status, AppointmentStatus::Cancelled);
    }

    #[test]
    fn cancelled_appointments_cannot_be_revived() {
        let mut appointment = appointment(AppointmentStatus::Cancelled);
        let error = appointment
            .transition_to(AppointmentStatus::Scheduled, Utc::now())
            .expect_err("cancelled -> scheduled must fail");
        assert!(matches!(error, crate::errors::DomainError::InvalidAppointmentTransition { .. }));
    }

    #[test]
    fn reschedule_keeps_identity_and_records_prior_slot() {
        let mut appointment = appointment(AppointmentStatus::Confirmed);
        let target = Slot {
            date: NaiveDate::from_ymd_opt(2026, 3, 10).expect("date"),
            time: NaiveTime::from_hms_opt(17, 0, 0).expect("time"),
        };

        let previous = appointment.reschedule_in_place(target, Utc::now()).expect("reschedule");

        assert_eq!(appointment.id, AppointmentId("APT-1".to_string()));
        assert_eq!(appointment.external_calendar_ref.as_deref(), Some("evt-1"));
        assert_eq!(appointment.slot(), target);
        assert_eq!(appointment.rescheduled_from, Some(previous));
        assert_eq!(previous.time, NaiveTime::from_hms_opt(11, 0, 0).expect("time"));
    }

    #[test]
    fn inactive_appointments_cannot_be_rescheduled() {
        let mut appointment = appointment(AppointmentStatus::Completed);
        let target = appointment.slot();
        assert!(appointment.reschedule_in_place(target, Utc::now()).is_err());
    }
}
