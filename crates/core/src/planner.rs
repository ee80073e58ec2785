//! Pure per-message planning: merges extracted fields into the lead snapshot, derives the
//! appointment command and resource request, and composes the ordered reply.

use chrono::{DateTime, Utc};

use crate::appointments::lifecycle::{AppointmentCommand, LifecycleDecision};
use crate::delivery::PlannedDelivery;
use crate::domain::appointment::{Appointment, AppointmentKind};
use crate::domain::intent::{IntentKind, InterpretedIntent};
use crate::domain::lead::{Lead, PendingClarification, PendingRequest};
use crate::domain::notification::NotificationReason;
use crate::domain::outbound::OutboundAction;
use crate::extract::ExtractedFields;
use crate::phase::{PhaseAssessment, PushStyle};

const FALLBACK_QUESTION: &str = "Could you tell me a bit more about what you're looking for?";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnPlan {
    /// Lead snapshot with this message's signals merged in.
    pub lead: Lead,
    pub appointment_command: Option<AppointmentCommand>,
    pub requested_developments: Vec<String>,
    pub explicit_resource_request: bool,
    pub staff_alert: Option<NotificationReason>,
    pub fallback_question: Option<String>,
}

pub fn plan_turn(
    lead: &Lead,
    intent: &InterpretedIntent,
    fields: &ExtractedFields,
    now: DateTime<Utc>,
) -> TurnPlan {
    let mut updated = lead.clone();
    merge_fields(&mut updated, fields, now);

    let appointment_command = appointment_command(lead, intent, fields);
    let requested_developments = requested_developments(&updated, intent, fields);
    let staff_alert = match intent.intent {
        IntentKind::Complaint => Some(NotificationReason::Complaint),
        IntentKind::PostSaleIssue => Some(NotificationReason::PostSaleIssue),
        _ => None,
    };

    let understood_something = fields != &ExtractedFields::default();
    let fallback_question = (intent.intent == IntentKind::Unknown
        && !understood_something
        && appointment_command.is_none())
    .then(|| FALLBACK_QUESTION.to_string());

    TurnPlan {
        lead: updated,
        appointment_command,
        requested_developments,
        explicit_resource_request: intent.explicit_resource_request,
        staff_alert,
        fallback_question,
    }
}

fn merge_fields(lead: &mut Lead, fields: &ExtractedFields, now: DateTime<Utc>) {
    lead.message_count = lead.message_count.saturating_add(1);
    lead.last_message_at = now;
    lead.notes.last_response_time = Some(now);

    if lead.resolved_name().is_none() {
        if let Some(name) = &fields.name {
            lead.name = Some(name.clone());
        }
    }
    if let Some(development) = &fields.development {
        lead.add_property_interest(development);
    }
    if let Some(budget) = fields.budget {
        lead.notes.budget = Some(budget);
    }
    if let Some(bedrooms) = fields.bedrooms {
        lead.notes.bedrooms = Some(bedrooms);
    }

    let satisfied = match lead.pending_clarification {
        PendingClarification::None => false,
        PendingClarification::Name => lead.resolved_name().is_some(),
        PendingClarification::Development => fields.development.is_some(),
        PendingClarification::DateTime | PendingClarification::BusinessHours => {
            fields.date.is_some() || fields.time.is_some()
        }
    };
    if satisfied {
        lead.pending_clarification = PendingClarification::None;
    }
}

fn appointment_command(
    lead: &Lead,
    intent: &InterpretedIntent,
    fields: &ExtractedFields,
) -> Option<AppointmentCommand> {
    let kind = intent.target_kind();
    // Fields from this message win; anything they leave out comes from the paused booking.
    let create = |kind: AppointmentKind| {
        let carried = lead.pending_request.as_ref().filter(|request| request.kind == kind);
        AppointmentCommand::Create {
            kind,
            development: fields
                .development
                .clone()
                .or_else(|| carried.and_then(|request| request.development.clone())),
            date: fields.date.or_else(|| carried.and_then(|request| request.date)),
            time: fields.time.or_else(|| carried.and_then(|request| request.time)),
        }
    };

    match intent.intent {
        IntentKind::ScheduleVisit | IntentKind::ScheduleCallback => Some(create(kind)),
        IntentKind::ConfirmAppointment if fields.date.is_some() || fields.time.is_some() => {
            Some(create(kind))
        }
        IntentKind::ConfirmAppointment => Some(AppointmentCommand::Confirm { kind }),
        IntentKind::Reschedule => {
            Some(AppointmentCommand::Reschedule { kind, date: fields.date, time: fields.time })
        }
        IntentKind::Cancel => Some(AppointmentCommand::Cancel { kind }),
        IntentKind::AppointmentInfo => Some(AppointmentCommand::QueryInfo { kind }),
        // A booking paused on a clarifying question resumes once the answer arrives.
        _ => lead
            .pending_request
            .as_ref()
            .filter(|_| answers_pending(lead.pending_clarification, fields))
            .map(|request| create(request.kind)),
    }
}

fn answers_pending(pending: PendingClarification, fields: &ExtractedFields) -> bool {
    match pending {
        PendingClarification::None => false,
        PendingClarification::Name => fields.name.is_some(),
        PendingClarification::Development => fields.development.is_some(),
        PendingClarification::DateTime | PendingClarification::BusinessHours => {
            fields.date.is_some() || fields.time.is_some()
        }
    }
}

fn requested_developments(
    lead: &Lead,
    intent: &InterpretedIntent,
    fields: &ExtractedFields,
) -> Vec<String> {
    let mut requested: Vec<String> = intent
        .requested_resources
        .iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect();

    let asked = intent.intent == IntentKind::RequestResources || intent.explicit_resource_request;
    if requested.is_empty() && asked {
        if let Some(development) =
            fields.development.clone().or_else(|| lead.property_interest.last().cloned())
        {
            requested.push(development);
        }
    }
    requested
}

/// Updates clarification flags after the appointment decision and keeps the paused booking
/// for as long as a question about it is open.
/// Returns true when a standalone name question should be appended to the reply.
pub fn settle_clarification(
    lead: &mut Lead,
    command: Option<&AppointmentCommand>,
    decision: Option<&LifecycleDecision>,
    max_name_asks: u8,
) -> bool {
    match decision {
        Some(LifecycleDecision::PendingInfo { missing, .. }) => {
            lead.pending_clarification = *missing;
            lead.pending_request = command.and_then(pending_request);
            if *missing == PendingClarification::Name {
                lead.name_ask_count = lead.name_ask_count.saturating_add(1);
            }
            return false;
        }
        Some(LifecycleDecision::Rejected { .. }) => {
            lead.pending_clarification = PendingClarification::BusinessHours;
            lead.pending_request = command.and_then(pending_request);
            return false;
        }
        Some(decision) if decision.mutated().is_some() => {
            lead.pending_clarification = PendingClarification::None;
        }
        _ => {}
    }
    if lead.pending_clarification == PendingClarification::None {
        lead.pending_request = None;
    }

    let ask_name = lead.resolved_name().is_none()
        && lead.name_ask_count < max_name_asks
        && lead.pending_clarification == PendingClarification::None
        && lead.message_count >= 2;
    if ask_name {
        lead.name_ask_count = lead.name_ask_count.saturating_add(1);
        lead.pending_clarification = PendingClarification::Name;
    }
    ask_name
}

fn pending_request(command: &AppointmentCommand) -> Option<PendingRequest> {
    match command {
        AppointmentCommand::Create { kind, development, date, time } => Some(PendingRequest {
            kind: *kind,
            development: development.clone(),
            date: *date,
            time: *time,
        }),
        AppointmentCommand::Reschedule { kind, date, time } => {
            Some(PendingRequest { kind: *kind, development: None, date: *date, time: *time })
        }
        _ => None,
    }
}

pub struct ReplyContext<'a> {
    pub lead: &'a Lead,
    pub phase: &'a PhaseAssessment,
    pub appointment: Option<&'a LifecycleDecision>,
    pub deliveries: &'a [PlannedDelivery],
    pub fallback_question: Option<&'a str>,
    pub ask_name: bool,
}

/// Ordered outbound actions for this turn: greeting, appointment outcome, resources,
/// then at most one follow-up question.
pub fn compose_reply(ctx: &ReplyContext<'_>) -> Vec<OutboundAction> {
    let mut actions = Vec::new();

    if ctx.lead.message_count <= 1 {
        let greeting = match ctx.lead.resolved_name() {
            Some(name) => format!("Hi {name}! Thanks for reaching out."),
            None => "Hi! Thanks for reaching out.".to_string(),
        };
        actions.push(OutboundAction::text(greeting));
    }

    if let Some(decision) = ctx.appointment {
        actions.push(OutboundAction::text(describe_decision(decision)));
    }

    if !ctx.deliveries.is_empty() {
        let mut names: Vec<&str> =
            ctx.deliveries.iter().filter_map(|d| d.development.as_deref()).collect();
        names.dedup();
        let intro = if names.is_empty() {
            "Here is an overview of our developments.".to_string()
        } else {
            format!("Here is the information on {}.", names.join(", "))
        };
        actions.push(OutboundAction::text(intro));
        actions.extend(ctx.deliveries.iter().map(PlannedDelivery::to_action));
    }

    let follow_up = if ctx.ask_name {
        Some("By the way, who do I have the pleasure of talking to?".to_string())
    } else if ctx.appointment.is_none() && ctx.phase.allow_push_to_appointment {
        match ctx.phase.push_style {
            PushStyle::Full => Some("Would you like to schedule a visit this week?".to_string()),
            PushStyle::Soft => {
                Some("Whenever you're ready, I can book a visit for you.".to_string())
            }
            PushStyle::None | PushStyle::Gentle => None,
        }
    } else {
        None
    };

    match (follow_up, ctx.fallback_question) {
        (Some(question), _) => actions.push(OutboundAction::text(question)),
        (None, Some(question)) if actions.is_empty() || ctx.lead.message_count <= 1 => {
            actions.push(OutboundAction::text(question))
        }
        _ => {}
    }

    if actions.is_empty() {
        actions.push(OutboundAction::text(FALLBACK_QUESTION));
    }
    actions
}

fn describe_decision(decision: &LifecycleDecision) -> String {
    match decision {
        LifecycleDecision::PendingInfo { question, .. }
        | LifecycleDecision::Rejected { question, .. } => question.clone(),
        LifecycleDecision::Created(appointment) => {
            format!("Done! Your {} is booked for {}.", label(appointment), when(appointment))
        }
        LifecycleDecision::Rescheduled { appointment, previous } => format!(
            "Updated: your {} moved from {} to {}.",
            label(appointment),
            previous,
            when(appointment)
        ),
        LifecycleDecision::Unchanged(appointment) => {
            format!("You're all set: your {} is on {}.", label(appointment), when(appointment))
        }
        LifecycleDecision::Confirmed(appointment) => {
            format!("Confirmed: your {} is on {}. See you then!", label(appointment), when(appointment))
        }
        LifecycleDecision::Cancelled(appointment) => format!(
            "Your {} on {} is cancelled. Let me know if you'd like to pick another day.",
            label(appointment),
            when(appointment)
        ),
        LifecycleDecision::Info(Some(appointment)) => format!(
            "Your {} is scheduled for {} ({}).",
            label(appointment),
            when(appointment),
            appointment.status.as_str()
        ),
        LifecycleDecision::Info(None) => {
            "You don't have anything scheduled yet. Would you like to book a visit?".to_string()
        }
        LifecycleDecision::NothingToChange { kind } => format!(
            "I don't see an active {} for you. Would you like to book one?",
            kind_label(*kind)
        ),
    }
}

fn label(appointment: &Appointment) -> String {
    match (&appointment.kind, &appointment.development) {
        (AppointmentKind::Visit, Some(development)) => format!("visit to {development}"),
        (kind, _) => kind_label(*kind).to_string(),
    }
}

fn kind_label(kind: AppointmentKind) -> &'static str {
    match kind {
        AppointmentKind::Visit => "visit",
        AppointmentKind::Callback => "call",
    }
}

fn when(appointment: &Appointment) -> String {
    format!(
        "{} at {}",
        appointment.scheduled_date.format("%A %B %-d"),
        appointment.scheduled_time.format("%H:%M")
    )
}
