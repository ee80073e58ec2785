//! Appointment state machine for one `(lead, kind)` pair.
//!
//! `decide` is pure: it looks at the lead snapshot and the freshly fetched active
//! appointment and returns what should happen. Persisting and calendar sync happen
//! elsewhere.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::appointments::hours::BusinessHours;
use crate::domain::appointment::{
    Appointment, AppointmentId, AppointmentKind, AppointmentStatus, Slot,
};
use crate::domain::lead::{Lead, PendingClarification};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppointmentCommand {
    Create {
        kind: AppointmentKind,
        development: Option<String>,
        date: Option<NaiveDate>,
        time: Option<NaiveTime>,
    },
    Reschedule {
        kind: AppointmentKind,
        date: Option<NaiveDate>,
        time: Option<NaiveTime>,
    },
    Cancel {
        kind: AppointmentKind,
    },
    Confirm {
        kind: AppointmentKind,
    },
    QueryInfo {
        kind: AppointmentKind,
    },
}

impl AppointmentCommand {
    pub fn kind(&self) -> AppointmentKind {
        match self {
            Self::Create { kind, .. }
            | Self::Reschedule { kind, .. }
            | Self::Cancel { kind }
            | Self::Confirm { kind }
            | Self::QueryInfo { kind } => *kind,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct LifecycleContext<'a> {
    pub lead: &'a Lead,
    /// Active appointment of the command's kind, re-fetched under the lead lock.
    pub active: Option<&'a Appointment>,
    pub hours: &'a BusinessHours,
    pub now: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecycleDecision {
    /// Required information is missing; nothing is persisted.
    PendingInfo { missing: PendingClarification, question: String },
    /// Validation failed (hours, past slot); nothing is persisted.
    Rejected { error: DomainError, question: String },
    Created(Appointment),
    Rescheduled { appointment: Appointment, previous: Slot },
    /// The request converges on the current state, e.g. a duplicate create for the same slot.
    Unchanged(Appointment),
    Cancelled(Appointment),
    Confirmed(Appointment),
    Info(Option<Appointment>),
    /// Reschedule, cancel or confirm without an active appointment.
    NothingToChange { kind: AppointmentKind },
}

impl LifecycleDecision {
    pub fn mutated(&self) -> Option<&Appointment> {
        match self {
            Self::Created(appointment)
            | Self::Rescheduled { appointment, .. }
            | Self::Cancelled(appointment)
            | Self::Confirmed(appointment) => Some(appointment),
            _ => None,
        }
    }

    pub fn mutated_mut(&mut self) -> Option<&mut Appointment> {
        match self {
            Self::Created(appointment)
            | Self::Rescheduled { appointment, .. }
            | Self::Cancelled(appointment)
            | Self::Confirmed(appointment) => Some(appointment),
            _ => None,
        }
    }
}

pub fn decide(command: &AppointmentCommand, ctx: &LifecycleContext<'_>) -> LifecycleDecision {
    let active = ctx.active.filter(|appointment| {
        appointment.is_active() && appointment.kind == command.kind()
    });

    match command {
        AppointmentCommand::Create { kind, development, date, time } => match active {
            Some(existing) => reschedule(existing, *date, *time, ctx),
            None => create(*kind, development.as_deref(), *date, *time, ctx),
        },
        AppointmentCommand::Reschedule { kind, date, time } => match active {
            Some(existing) => reschedule(existing, *date, *time, ctx),
            None => LifecycleDecision::NothingToChange { kind: *kind },
        },
        AppointmentCommand::Cancel { kind } => match active {
            Some(existing) => transition(existing, AppointmentStatus::Cancelled, ctx.now),
            None => LifecycleDecision::NothingToChange { kind: *kind },
        },
        AppointmentCommand::Confirm { kind } => match active {
            Some(existing) if existing.status == AppointmentStatus::Confirmed => {
                LifecycleDecision::Unchanged(existing.clone())
            }
            Some(existing) => transition(existing, AppointmentStatus::Confirmed, ctx.now),
            None => LifecycleDecision::NothingToChange { kind: *kind },
        },
        AppointmentCommand::QueryInfo { .. } => LifecycleDecision::Info(active.cloned()),
    }
}

fn create(
    kind: AppointmentKind,
    development: Option<&str>,
    date: Option<NaiveDate>,
    time: Option<NaiveTime>,
    ctx: &LifecycleContext<'_>,
) -> LifecycleDecision {
    if ctx.lead.resolved_name().is_none() {
        return pending(PendingClarification::Name, "name");
    }

    let development = match kind {
        AppointmentKind::Visit => match resolve_development(development, ctx.lead) {
            Some(development) => Some(development),
            None => return pending(PendingClarification::Development, "development"),
        },
        AppointmentKind::Callback => {
            development.map(str::trim).filter(|value| !value.is_empty()).map(str::to_string)
        }
    };

    let (Some(date), Some(time)) = (date, time) else {
        let field = if date.is_none() { "date" } else { "time" };
        return pending(PendingClarification::DateTime, field);
    };

    let slot = Slot { date, time };
    if let Err(error) = ctx.hours.validate(slot, ctx.now) {
        return rejected(error);
    }

    LifecycleDecision::Created(Appointment {
        id: AppointmentId::generate(),
        lead_id: ctx.lead.id.clone(),
        kind,
        development,
        scheduled_date: date,
        scheduled_time: time,
        status: AppointmentStatus::Scheduled,
        external_calendar_ref: None,
        rescheduled_from: None,
        assigned_agent_id: ctx.lead.assigned_agent_id.clone(),
        sync_pending: false,
        created_at: ctx.now,
        updated_at: ctx.now,
    })
}

fn reschedule(
    existing: &Appointment,
    date: Option<NaiveDate>,
    time: Option<NaiveTime>,
    ctx: &LifecycleContext<'_>,
) -> LifecycleDecision {
    if date.is_none() && time.is_none() {
        return pending(PendingClarification::DateTime, "date");
    }

    let target = Slot {
        date: date.unwrap_or(existing.scheduled_date),
        time: time.unwrap_or(existing.scheduled_time),
    };
    if target == existing.slot() {
        return LifecycleDecision::Unchanged(existing.clone());
    }
    if let Err(error) = ctx.hours.validate(target, ctx.now) {
        return rejected(error);
    }

    let mut updated = existing.clone();
    match updated.reschedule_in_place(target, ctx.now) {
        Ok(previous) => LifecycleDecision::Rescheduled { appointment: updated, previous },
        Err(error) => rejected(error),
    }
}

fn transition(
    existing: &Appointment,
    next: AppointmentStatus,
    now: DateTime<Utc>,
) -> LifecycleDecision {
    let mut updated = existing.clone();
    match updated.transition_to(next, now) {
        Ok(()) if next == AppointmentStatus::Cancelled => LifecycleDecision::Cancelled(updated),
        Ok(()) => LifecycleDecision::Confirmed(updated),
        Err(error) => rejected(error),
    }
}

/// Explicit development wins; otherwise a lead with exactly one interest is unambiguous.
fn resolve_development(explicit: Option<&str>, lead: &Lead) -> Option<String> {
    if let Some(value) = explicit.map(str::trim).filter(|value| !value.is_empty()) {
        return Some(value.to_string());
    }
    match lead.property_interest.as_slice() {
        [only] if !only.trim().is_empty() => Some(only.clone()),
        _ => None,
    }
}

fn pending(missing: PendingClarification, field: &'static str) -> LifecycleDecision {
    LifecycleDecision::PendingInfo {
        missing,
        question: DomainError::MissingField(field).clarifying_question(),
    }
}

fn rejected(error: DomainError) -> LifecycleDecision {
    let question = error.clarifying_question();
    LifecycleDecision::Rejected { error, question }
}
