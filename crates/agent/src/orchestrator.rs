//! Per-message pipeline.
//!
//! Everything that informs a decision is read under the lead's lock: the lead snapshot, the
//! message ledger and active appointments. Components append to one [`MutationBatch`], which
//! the store applies in a single transaction before the reply is released.
//!
//! Nothing leaves the process until that batch commits. Calendar events and staff pages run
//! afterwards, and their results (event refs, cleared `sync_pending`, cooldown records) land
//! in a second, smaller write. Transmission and delivery bookkeeping come last.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use leadflow_core::appointments::{BusinessHours, LifecycleDecision};
use leadflow_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use leadflow_core::config::{AppConfig, ConfigError, PolicyConfig};
use leadflow_core::dedup::{message_fingerprint, DedupPolicy};
use leadflow_core::delivery::PlannedDelivery;
use leadflow_core::domain::batch::{MutationBatch, ProcessedMessage};
use leadflow_core::domain::catalog::CatalogSnapshot;
use leadflow_core::domain::conversation::{ConversationTurn, TurnRole};
use leadflow_core::domain::delivery::ResourceDeliveryRecord;
use leadflow_core::domain::intent::InterpretedIntent;
use leadflow_core::domain::lead::{Lead, LeadId};
use leadflow_core::domain::notification::{NotificationReason, RecipientRole, StaffNotification};
use leadflow_core::domain::outbound::OutboundAction;
use leadflow_core::errors::{ApplicationError, DomainError};
use leadflow_core::extract::{plausible_name, ExtractionInput, FieldExtractors};
use leadflow_core::phase::{classify, PhaseAssessment, PhaseSignals};
use leadflow_core::planner::{compose_reply, plan_turn, settle_clarification, ReplyContext};
use leadflow_core::scoring::{ScoreEngine, ScoreEvaluation, ScoreInput};
use leadflow_db::repositories::{RepositoryError, Stores};

use crate::appointments::AppointmentManager;
use crate::calendar::CalendarProvider;
use crate::delivery::{plan_deliveries, record_sent};
use crate::dispatch::{DispatchReport, Dispatcher, MessageChannel};
use crate::gate::{DedupGate, LeadLocks};
use crate::notify::StaffNotifier;
use crate::sync::{ExternalSync, NotifyOutcome};

const ACTOR: &str = "leadflow-agent";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub message_id: Option<String>,
    pub phone: String,
    pub body: String,
    pub received_at: DateTime<Utc>,
    /// Display name supplied by the channel, often a placeholder.
    #[serde(default)]
    pub profile_name: Option<String>,
}

impl InboundMessage {
    /// Channel message id when present, otherwise a fingerprint of sender, body and send time.
    pub fn dedup_key(&self) -> String {
        match self.message_id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => message_fingerprint(&self.phone, &self.body, self.received_at),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRequest {
    pub message: InboundMessage,
    #[serde(default)]
    pub interpretation: InterpretedIntent,
    #[serde(default)]
    pub catalog: CatalogSnapshot,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Processed,
    Suppressed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnOutcome {
    pub status: TurnStatus,
    pub correlation_id: String,
    pub lead_id: Option<LeadId>,
    /// Ordered replies for the lead. Empty when suppressed.
    pub actions: Vec<OutboundAction>,
    pub decision: Option<LifecycleDecision>,
    /// Staff notifications that actually went out.
    pub notifications: Vec<StaffNotification>,
    /// Attachments included in `actions`; recorded only once transmitted.
    pub deliveries: Vec<PlannedDelivery>,
    pub phase: Option<PhaseAssessment>,
    pub score: Option<ScoreEvaluation>,
}

impl TurnOutcome {
    fn suppressed(correlation_id: String, lead_id: Option<LeadId>) -> Self {
        Self {
            status: TurnStatus::Suppressed,
            correlation_id,
            lead_id,
            actions: Vec::new(),
            decision: None,
            notifications: Vec::new(),
            deliveries: Vec::new(),
            phase: None,
            score: None,
        }
    }

    pub fn is_suppressed(&self) -> bool {
        self.status == TurnStatus::Suppressed
    }
}

pub struct Orchestrator {
    stores: Stores,
    locks: LeadLocks,
    gate: DedupGate,
    appointments: AppointmentManager,
    sync: Arc<ExternalSync>,
    extractors: FieldExtractors,
    scoring: ScoreEngine,
    policy: PolicyConfig,
    audit: Arc<dyn AuditSink>,
}

impl Orchestrator {
    pub fn new(
        config: &AppConfig,
        stores: Stores,
        calendar: Arc<dyn CalendarProvider>,
        notifier: Arc<dyn StaffNotifier>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, ConfigError> {
        let hours = BusinessHours::from_config(&config.business_hours)?;
        let sync = Arc::new(ExternalSync::new(
            calendar,
            notifier,
            stores.notifications.clone(),
            &config.policy,
        ));
        let appointments =
            AppointmentManager::new(stores.appointments.clone(), hours, sync.clone());
        let gate = DedupGate::new(DedupPolicy::from_config(&config.policy), stores.ledger.clone());

        Ok(Self {
            locks: LeadLocks::default(),
            gate,
            appointments,
            sync,
            extractors: FieldExtractors::default(),
            scoring: ScoreEngine::new(config.scoring.clone()),
            policy: config.policy.clone(),
            audit,
            stores,
        })
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Decides and persists one message. The caller transmits `actions` and reports
    /// accepted attachments back through [`Orchestrator::record_deliveries`].
    pub async fn handle(&self, request: &TurnRequest) -> Result<TurnOutcome, ApplicationError> {
        validate(request)?;
        let _guard = self.locks.acquire(request.message.phone.trim()).await;
        self.decide_with_retry(request).await
    }

    /// Decides, persists, transmits through `channel` and records accepted attachments, all
    /// under one hold of the lead's lock.
    pub async fn process(
        &self,
        request: &TurnRequest,
        channel: &dyn MessageChannel,
    ) -> Result<(TurnOutcome, DispatchReport), ApplicationError> {
        validate(request)?;
        let phone = request.message.phone.trim();
        let _guard = self.locks.acquire(phone).await;

        let outcome = self.decide_with_retry(request).await?;
        let report =
            Dispatcher::dispatch(channel, phone, &outcome.actions, &outcome.deliveries).await;
        if !report.delivered.is_empty() {
            self.record_locked(
                phone,
                &report.delivered,
                request.message.received_at,
                &outcome.correlation_id,
            )
            .await?;
        }
        Ok((outcome, report))
    }

    pub async fn record_deliveries(
        &self,
        phone: &str,
        delivered: &[PlannedDelivery],
        now: DateTime<Utc>,
    ) -> Result<Vec<ResourceDeliveryRecord>, ApplicationError> {
        let phone = phone.trim();
        let _guard = self.locks.acquire(phone).await;
        self.record_locked(phone, delivered, now, &new_correlation_id()).await
    }

    /// Retries calendar sync for appointments a previous failure left pending.
    pub async fn resync_pending(&self) -> Result<usize, ApplicationError> {
        self.appointments.resync_pending(self.stores.leads.as_ref()).await.map_err(persistence)
    }

    async fn decide_with_retry(
        &self,
        request: &TurnRequest,
    ) -> Result<TurnOutcome, ApplicationError> {
        let correlation_id = new_correlation_id();
        let first = self.decide_locked(request, &correlation_id).await;
        let error = match first {
            Err(error) if error.is_conflict() => error,
            other => return other.map_err(persistence),
        };

        warn!(
            event_name = "orchestrator.conflict_retry",
            correlation_id = %correlation_id,
            error = %error,
            "batch conflicted with a concurrent writer; deciding again"
        );
        match self.decide_locked(request, &correlation_id).await {
            Err(error) if error.is_conflict() => {
                warn!(
                    event_name = "orchestrator.conflict_duplicate",
                    correlation_id = %correlation_id,
                    error = %error,
                    "second conflict; treating message as a duplicate"
                );
                self.audit.emit(
                    AuditContext::new(None, &correlation_id, ACTOR)
                        .event(
                            "message.conflict",
                            AuditCategory::Persistence,
                            AuditOutcome::Suppressed,
                        )
                        .with_metadata("error", error.to_string()),
                );
                Ok(TurnOutcome::suppressed(correlation_id, None))
            }
            other => other.map_err(persistence),
        }
    }

    async fn decide_locked(
        &self,
        request: &TurnRequest,
        correlation_id: &str,
    ) -> Result<TurnOutcome, RepositoryError> {
        let message = &request.message;
        let phone = message.phone.trim();
        let now = message.received_at;
        let message_key = message.dedup_key();

        let existing = self.stores.leads.find_by_phone(phone).await?;
        let existing_id = existing.as_ref().map(|lead| lead.id.clone());

        let gate = self.gate.check(&message_key, existing_id.as_ref(), now).await;
        if !gate.is_allowed() {
            info!(
                event_name = "message.suppressed",
                correlation_id,
                lead_id = existing_id.as_ref().map(|id| id.0.as_str()).unwrap_or("unknown"),
                message_id = %message_key,
                "duplicate or too-soon message suppressed"
            );
            self.audit.emit(
                AuditContext::new(existing_id.clone(), correlation_id, ACTOR)
                    .event("message.suppressed", AuditCategory::Ingress, AuditOutcome::Suppressed)
                    .with_metadata("message_id", message_key),
            );
            return Ok(TurnOutcome::suppressed(correlation_id.to_string(), existing_id));
        }

        let lead = existing.unwrap_or_else(|| new_lead(phone, message));
        let ctx = AuditContext::new(Some(lead.id.clone()), correlation_id, ACTOR);
        self.audit.emit(
            ctx.event("message.accepted", AuditCategory::Ingress, AuditOutcome::Success)
                .with_metadata("message_id", message_key.clone())
                .with_metadata("intent", request.interpretation.intent.as_str()),
        );

        let mut batch = MutationBatch::default();
        let fields = self.extractors.extract_all(&ExtractionInput {
            text: &message.body,
            intent: &request.interpretation,
            lead: &lead,
            catalog: &request.catalog,
            today: self.appointments.hours().local_today(now),
        });
        let plan = plan_turn(&lead, &request.interpretation, &fields, now);
        let mut lead = plan.lead;

        let mut active = self.appointments.active_for(&lead.id).await?;
        let mut notifications = Vec::new();
        let mut decision = match &plan.appointment_command {
            Some(command) => {
                let outcome = self.appointments.execute(command, &lead, now, &mut batch).await?;
                if let Some(appointment) = outcome.decision.mutated() {
                    active.retain(|current| current.kind != appointment.kind);
                    if appointment.is_active() {
                        active.push(appointment.clone());
                    }
                }
                notifications.extend(outcome.notification);
                Some(outcome.decision)
            }
            None => None,
        };

        let has_active = !active.is_empty();
        let evaluation = self.scoring.evaluate(&ScoreInput {
            lead: &lead,
            has_active_appointment: has_active,
            intent: request.interpretation.intent,
            admin_reset: false,
        });
        lead.score = evaluation.score;
        lead.funnel_status = evaluation.target_funnel_status;
        if evaluation.significant_jump {
            self.audit.emit(
                ctx.event("score.jump", AuditCategory::Scoring, AuditOutcome::Success)
                    .with_metadata("previous", evaluation.previous_score.to_string())
                    .with_metadata("score", evaluation.score.to_string()),
            );
            merge_score_jump(&mut notifications, &lead, &evaluation);
        }
        if let Some(reason) = plan.staff_alert {
            notifications.push(staff_alert(&lead, reason, &message.body));
        }

        let deliveries = plan_deliveries(
            &lead,
            &plan.requested_developments,
            plan.explicit_resource_request,
            &request.catalog,
        );
        let ask_name = settle_clarification(
            &mut lead,
            plan.appointment_command.as_ref(),
            decision.as_ref(),
            self.policy.max_name_asks,
        );
        let phase = classify(&PhaseSignals::from_lead(&lead, has_active));
        let actions = compose_reply(&ReplyContext {
            lead: &lead,
            phase: &phase,
            appointment: decision.as_ref(),
            deliveries: &deliveries,
            fallback_question: plan.fallback_question.as_deref(),
            ask_name,
        });

        batch.turns.push(ConversationTurn::new(
            lead.id.clone(),
            TurnRole::User,
            message.body.clone(),
            now,
        ));
        if let Some(marker) = decision.as_ref().and_then(action_marker) {
            batch.turns.push(ConversationTurn::new(
                lead.id.clone(),
                TurnRole::ActionMarker,
                marker,
                now,
            ));
        }
        batch.turns.push(ConversationTurn::new(
            lead.id.clone(),
            TurnRole::Assistant,
            transcript(&actions),
            now,
        ));
        batch.processed_message = Some(ProcessedMessage {
            message_id: message_key,
            lead_id: lead.id.clone(),
            processed_at: now,
        });
        batch.lead = Some(lead.clone());

        self.stores.mutations.apply_batch(&batch, self.policy.conversation_window).await?;
        self.audit.emit(
            ctx.event("batch.applied", AuditCategory::Persistence, AuditOutcome::Success)
                .with_metadata("appointments", batch.appointments.len().to_string())
                .with_metadata("turns", batch.turns.len().to_string()),
        );

        let sent = self
            .run_side_effects(&ctx, &lead, decision.as_mut(), notifications, now)
            .await;
        if let Some(decision) = &decision {
            self.audit.emit(decision_event(&ctx, decision));
        }

        info!(
            event_name = "message.processed",
            correlation_id,
            lead_id = %lead.id.0,
            phase = phase.phase.as_str(),
            score = lead.score,
            actions = actions.len(),
            appointments = batch.appointments.len(),
            notifications = sent.len(),
            "message processed"
        );

        Ok(TurnOutcome {
            status: TurnStatus::Processed,
            correlation_id: correlation_id.to_string(),
            lead_id: Some(lead.id),
            actions,
            decision,
            notifications: sent,
            deliveries,
            phase: Some(phase),
            score: Some(evaluation),
        })
    }

    /// Runs after the turn's batch has committed, so a failed commit or a conflict retry never
    /// repeats an external call. Returns the notifications that went out.
    async fn run_side_effects(
        &self,
        ctx: &AuditContext,
        lead: &Lead,
        decision: Option<&mut LifecycleDecision>,
        notifications: Vec<StaffNotification>,
        now: DateTime<Utc>,
    ) -> Vec<StaffNotification> {
        let mut follow_up = MutationBatch::default();

        if let Some(appointment) = decision.and_then(LifecycleDecision::mutated_mut) {
            // A failed sync keeps the committed `sync_pending` flag for the next resync.
            if appointment.sync_pending
                && self.sync.sync_calendar(appointment, lead).await.is_ok()
            {
                follow_up.upsert_appointment(appointment.clone());
            }
        }

        let mut sent = Vec::new();
        for notification in notifications {
            let outcome = self.sync.notify(&notification, now, &mut follow_up).await;
            self.audit.emit(notification_event(ctx, &notification, outcome));
            if outcome == NotifyOutcome::Sent {
                sent.push(notification);
            }
        }

        if follow_up.is_empty() {
            return sent;
        }
        match self.stores.mutations.apply_batch(&follow_up, self.policy.conversation_window).await
        {
            Ok(()) => self.audit.emit(
                ctx.event("sync.recorded", AuditCategory::Persistence, AuditOutcome::Success)
                    .with_metadata("appointments", follow_up.appointments.len().to_string())
                    .with_metadata(
                        "notifications",
                        follow_up.notification_records.len().to_string(),
                    ),
            ),
            Err(error) => warn!(
                event_name = "sync.record_failed",
                correlation_id = %ctx.correlation_id,
                lead_id = %lead.id.0,
                error = %error,
                "external results not saved; calendar stays sync_pending"
            ),
        }
        sent
    }

    async fn record_locked(
        &self,
        phone: &str,
        delivered: &[PlannedDelivery],
        now: DateTime<Utc>,
        correlation_id: &str,
    ) -> Result<Vec<ResourceDeliveryRecord>, ApplicationError> {
        let Some(mut lead) = self.stores.leads.find_by_phone(phone).await.map_err(persistence)?
        else {
            warn!(
                event_name = "delivery.unknown_lead",
                correlation_id,
                "deliveries reported for a phone with no lead"
            );
            return Ok(Vec::new());
        };

        let records = record_sent(&mut lead, delivered, now);
        let batch = MutationBatch {
            lead: Some(lead.clone()),
            delivery_records: records.clone(),
            ..MutationBatch::default()
        };
        self.stores
            .mutations
            .apply_batch(&batch, self.policy.conversation_window)
            .await
            .map_err(persistence)?;

        let ctx = AuditContext::new(Some(lead.id.clone()), correlation_id, ACTOR);
        for record in &records {
            self.audit.emit(
                ctx.event("delivery.recorded", AuditCategory::Delivery, AuditOutcome::Success)
                    .with_metadata("development", record.key.development.clone())
                    .with_metadata("resource_type", record.key.resource_type.as_str()),
            );
        }
        Ok(records)
    }
}

fn validate(request: &TurnRequest) -> Result<(), ApplicationError> {
    if request.message.phone.trim().is_empty() {
        return Err(DomainError::MissingField("phone").into());
    }
    Ok(())
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

fn new_lead(phone: &str, message: &InboundMessage) -> Lead {
    let mut lead = Lead::new(phone, message.received_at);
    lead.name = message.profile_name.as_deref().and_then(plausible_name);
    lead
}

fn who(lead: &Lead) -> &str {
    lead.resolved_name().unwrap_or(lead.phone.as_str())
}

/// A score jump rides along with the agent's appointment alert when there is one.
fn merge_score_jump(
    notifications: &mut Vec<StaffNotification>,
    lead: &Lead,
    evaluation: &ScoreEvaluation,
) {
    let line = format!("Score jumped from {} to {}.", evaluation.previous_score, evaluation.score);
    match notifications
        .iter_mut()
        .find(|notification| notification.recipient_role == RecipientRole::AssignedAgent)
    {
        Some(existing) => {
            existing.text.push(' ');
            existing.text.push_str(&line);
        }
        None => notifications.push(StaffNotification {
            lead_id: lead.id.clone(),
            recipient_role: RecipientRole::AssignedAgent,
            recipient_id: lead.assigned_agent_id.clone(),
            reason: NotificationReason::HotLead,
            text: format!("{} is heating up. {line} Phone: {}", who(lead), lead.phone),
        }),
    }
}

fn staff_alert(lead: &Lead, reason: NotificationReason, body: &str) -> StaffNotification {
    let (recipient_role, label) = match reason {
        NotificationReason::PostSaleIssue => (RecipientRole::PostSaleTeam, "Post-sale issue"),
        _ => (RecipientRole::SalesManager, "Complaint"),
    };
    StaffNotification {
        lead_id: lead.id.clone(),
        recipient_role,
        recipient_id: None,
        reason,
        text: format!("{label} from {} ({}): {}", who(lead), lead.phone, body.trim()),
    }
}

fn decision_event(ctx: &AuditContext, decision: &LifecycleDecision) -> AuditEvent {
    let (event_type, outcome) = match decision {
        LifecycleDecision::Created(_) => ("appointment.created", AuditOutcome::Success),
        LifecycleDecision::Rescheduled { .. } => ("appointment.rescheduled", AuditOutcome::Success),
        LifecycleDecision::Cancelled(_) => ("appointment.cancelled", AuditOutcome::Success),
        LifecycleDecision::Confirmed(_) => ("appointment.confirmed", AuditOutcome::Success),
        LifecycleDecision::Unchanged(_) => ("appointment.unchanged", AuditOutcome::Success),
        LifecycleDecision::Info(_) => ("appointment.info", AuditOutcome::Success),
        LifecycleDecision::PendingInfo { .. } => {
            ("appointment.pending_info", AuditOutcome::Rejected)
        }
        LifecycleDecision::Rejected { .. } => ("appointment.rejected", AuditOutcome::Rejected),
        LifecycleDecision::NothingToChange { .. } => {
            ("appointment.nothing_to_change", AuditOutcome::Rejected)
        }
    };

    let mut event = ctx.event(event_type, AuditCategory::Appointment, outcome);
    if let Some(appointment) = decision.mutated() {
        event = event
            .with_metadata("appointment_id", appointment.id.0.clone())
            .with_metadata("slot", appointment.slot().to_string())
            .with_metadata("sync_pending", appointment.sync_pending.to_string());
    }
    if let LifecycleDecision::Rejected { error, .. } = decision {
        event = event.with_metadata("error", error.to_string());
    }
    event
}

fn notification_event(
    ctx: &AuditContext,
    notification: &StaffNotification,
    outcome: NotifyOutcome,
) -> AuditEvent {
    let (event_type, audit_outcome) = match outcome {
        NotifyOutcome::Sent => ("notification.sent", AuditOutcome::Success),
        NotifyOutcome::CoolingDown => ("notification.cooldown", AuditOutcome::Suppressed),
        NotifyOutcome::Disabled => ("notification.disabled", AuditOutcome::Suppressed),
        NotifyOutcome::Failed => ("notification.failed", AuditOutcome::Failed),
    };
    ctx.event(event_type, AuditCategory::Notification, audit_outcome)
        .with_metadata("reason", notification.reason.as_str())
        .with_metadata("recipient_role", notification.recipient_role.as_str())
}

fn action_marker(decision: &LifecycleDecision) -> Option<String> {
    let appointment = decision.mutated()?;
    let verb = match decision {
        LifecycleDecision::Created(_) => "created",
        LifecycleDecision::Rescheduled { .. } => "rescheduled",
        LifecycleDecision::Cancelled(_) => "cancelled",
        _ => "confirmed",
    };
    Some(format!(
        "appointment {verb}: {} {} ({})",
        appointment.kind.as_str(),
        appointment.slot(),
        appointment.id.0
    ))
}

fn transcript(actions: &[OutboundAction]) -> String {
    actions
        .iter()
        .map(|action| match action {
            OutboundAction::Text { body } => body.clone(),
            OutboundAction::Attachment { resource_type, url, .. } => {
                format!("[{}] {url}", resource_type.as_str())
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use leadflow_core::domain::delivery::ResourceType;
    use leadflow_core::domain::lead::{FunnelStatus, Lead};
    use leadflow_core::domain::notification::{NotificationReason, RecipientRole};
    use leadflow_core::domain::outbound::OutboundAction;
    use leadflow_core::scoring::{ScoreEvaluation, Temperature};

    use super::{merge_score_jump, staff_alert, transcript, InboundMessage};

    fn message(id: Option<&str>) -> InboundMessage {
        InboundMessage {
            message_id: id.map(str::to_string),
            phone: "+5215550001111".to_string(),
            body: "hola".to_string(),
            received_at: Utc.with_ymd_and_hms(2026, 3, 9, 16, 0, 0).single().expect("time"),
            profile_name: None,
        }
    }

    #[test]
    fn dedup_key_prefers_channel_id_and_falls_back_to_fingerprint() {
        assert_eq!(message(Some("wamid.1")).dedup_key(), "wamid.1");
        let fallback = message(Some("  ")).dedup_key();
        assert_eq!(fallback, message(None).dedup_key());
        assert_ne!(fallback, "wamid.1");
    }

    #[test]
    fn score_jump_merges_into_the_agent_alert() {
        let lead = Lead::new("+5215550001111", Utc::now());
        let evaluation = ScoreEvaluation {
            previous_score: 20,
            score: 55,
            temperature: Temperature::Warm,
            target_funnel_status: FunnelStatus::Scheduled,
            status_changed: true,
            significant_jump: true,
        };

        let mut alone = Vec::new();
        merge_score_jump(&mut alone, &lead, &evaluation);
        assert_eq!(alone.len(), 1);
        assert_eq!(alone[0].reason, NotificationReason::HotLead);

        let mut with_booking = vec![staff_alert(&lead, NotificationReason::Complaint, "x")];
        with_booking[0].recipient_role = RecipientRole::AssignedAgent;
        merge_score_jump(&mut with_booking, &lead, &evaluation);
        assert_eq!(with_booking.len(), 1);
        assert!(with_booking[0].text.ends_with("Score jumped from 20 to 55."));
    }

    #[test]
    fn staff_alerts_route_by_reason() {
        let lead = Lead::new("+5215550001111", Utc::now());
        let complaint = staff_alert(&lead, NotificationReason::Complaint, " nobody called me ");
        assert_eq!(complaint.recipient_role, RecipientRole::SalesManager);
        assert!(complaint.text.ends_with(": nobody called me"));

        let post_sale = staff_alert(&lead, NotificationReason::PostSaleIssue, "leak");
        assert_eq!(post_sale.recipient_role, RecipientRole::PostSaleTeam);
    }

    #[test]
    fn transcript_lists_texts_and_attachments_in_order() {
        let actions = vec![
            OutboundAction::text("Here you go."),
            OutboundAction::Attachment {
                development: Some("Monte Verde".to_string()),
                resource_type: ResourceType::Brochure,
                url: "https://cdn.example/mv.pdf".to_string(),
            },
        ];
        assert_eq!(transcript(&actions), "Here you go.\n[brochure] https://cdn.example/mv.pdf");
    }
}
