use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use leadflow_agent::calendar::{CalendarCall, InMemoryCalendar};
use leadflow_agent::dispatch::RecordingChannel;
use leadflow_agent::notify::InMemoryNotifier;
use leadflow_agent::orchestrator::{InboundMessage, Orchestrator, TurnOutcome, TurnRequest};
use leadflow_core::appointments::LifecycleDecision;
use leadflow_core::domain::batch::MutationBatch;
use leadflow_core::audit::InMemoryAuditSink;
use leadflow_core::config::AppConfig;
use leadflow_core::domain::appointment::{AppointmentKind, AppointmentStatus};
use leadflow_core::domain::catalog::{CatalogEntry, CatalogSnapshot, ResourceLink};
use leadflow_core::domain::delivery::ResourceType;
use leadflow_core::domain::intent::{IntentKind, InterpretedIntent};
use leadflow_core::domain::lead::{FunnelStatus, Lead, LeadId, PendingClarification};
use leadflow_core::domain::notification::{NotificationReason, RecipientRole};
use leadflow_core::domain::outbound::OutboundAction;
use leadflow_core::errors::ApplicationError;
use leadflow_core::phase::{Phase, PushStyle};
use leadflow_db::repositories::{InMemoryStore, LeadRepository, MutationStore, RepositoryError};
use leadflow_db::{connect_with_settings, migrations, Stores};

const PHONE: &str = "+5215550001111";

struct Harness {
    orchestrator: Arc<Orchestrator>,
    stores: Stores,
    calendar: InMemoryCalendar,
    notifier: InMemoryNotifier,
    audit: InMemoryAuditSink,
}

fn harness_with(stores: Stores) -> Harness {
    let calendar = InMemoryCalendar::default();
    let notifier = InMemoryNotifier::default();
    let audit = InMemoryAuditSink::default();
    let orchestrator = Orchestrator::new(
        &AppConfig::default(),
        stores.clone(),
        Arc::new(calendar.clone()),
        Arc::new(notifier.clone()),
        Arc::new(audit.clone()),
    )
    .expect("orchestrator");
    Harness { orchestrator: Arc::new(orchestrator), stores, calendar, notifier, audit }
}

fn harness() -> Harness {
    harness_with(Stores::from_memory(InMemoryStore::default()))
}

async fn sql_harness() -> Harness {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    harness_with(Stores::sql(pool))
}

/// Rejects the next `fail_next` batches, then writes through to the in-memory store.
struct FlakyMutations {
    inner: InMemoryStore,
    failures: AtomicUsize,
}

impl FlakyMutations {
    fn fail_next(&self, batches: usize) {
        self.failures.store(batches, Ordering::SeqCst);
    }
}

#[async_trait]
impl MutationStore for FlakyMutations {
    async fn apply_batch(
        &self,
        batch: &MutationBatch,
        conversation_window: usize,
    ) -> Result<(), RepositoryError> {
        let fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if fail {
            return Err(RepositoryError::Decode("transient".to_string()));
        }
        self.inner.apply_batch(batch, conversation_window).await
    }
}

/// Monday 2026-03-09 10:00 in Mexico City.
fn monday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 9, 16, 0, 0).single().expect("time")
}

fn at(seconds: i64) -> DateTime<Utc> {
    monday_morning() + Duration::seconds(seconds)
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, day).expect("date")
}

fn time(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).expect("time")
}

fn catalog() -> CatalogSnapshot {
    let entry = |name: &str, slug: &str| CatalogEntry {
        development_name: name.to_string(),
        resource_links: vec![
            ResourceLink {
                resource_type: ResourceType::Brochure,
                url: format!("https://cdn.example/{slug}.pdf"),
            },
            ResourceLink {
                resource_type: ResourceType::Video,
                url: format!("https://cdn.example/{slug}.mp4"),
            },
        ],
        price_range: None,
    };
    CatalogSnapshot {
        entries: vec![
            entry("Monte Verde", "monte-verde"),
            entry("Andes", "andes"),
            entry("Miravalle", "miravalle"),
        ],
        generic_asset: Some(ResourceLink {
            resource_type: ResourceType::GenericInfo,
            url: "https://cdn.example/overview.pdf".to_string(),
        }),
    }
}

fn request(
    id: &str,
    body: &str,
    received_at: DateTime<Utc>,
    intent: InterpretedIntent,
) -> TurnRequest {
    TurnRequest {
        message: InboundMessage {
            message_id: Some(id.to_string()),
            phone: PHONE.to_string(),
            body: body.to_string(),
            received_at,
            profile_name: None,
        },
        interpretation: intent,
        catalog: catalog(),
    }
}

/// First contact: the lead introduces themselves and names a development.
async fn introduce(harness: &Harness, name: &str, development: &str) -> LeadId {
    let intent = InterpretedIntent::new(IntentKind::ProvideInfo)
        .with_field("name", name)
        .with_field("development", development);
    let outcome = harness
        .orchestrator
        .handle(&request("intro", "hola", at(0), intent))
        .await
        .expect("intro");
    outcome.lead_id.expect("lead id")
}

fn schedule_visit(day: u32, hour: &str) -> InterpretedIntent {
    InterpretedIntent::new(IntentKind::ScheduleVisit)
        .with_field("date", format!("2026-03-{day:02}"))
        .with_field("time", hour)
}

async fn lead(harness: &Harness) -> Lead {
    harness.stores.leads.find_by_phone(PHONE).await.expect("lookup").expect("lead exists")
}

fn texts(outcome: &TurnOutcome) -> Vec<String> {
    outcome
        .actions
        .iter()
        .filter_map(|action| match action {
            OutboundAction::Text { body } => Some(body.clone()),
            OutboundAction::Attachment { .. } => None,
        })
        .collect()
}

#[tokio::test]
async fn saturday_afternoon_visit_is_rejected_and_nothing_is_stored() {
    let harness = harness();
    let lead_id = introduce(&harness, "Ana", "Andes").await;

    let outcome = harness
        .orchestrator
        .handle(&request("sat", "el sábado a las 3", at(60), schedule_visit(14, "15:00")))
        .await
        .expect("handle");

    assert!(matches!(outcome.decision, Some(LifecycleDecision::Rejected { .. })));
    let replies = texts(&outcome).join(" ");
    assert!(replies.contains("outside our visiting hours"), "{replies}");
    assert!(replies.contains("14:00"), "{replies}");

    let stored = harness.stores.appointments.list_for_lead(&lead_id).await.expect("list");
    assert!(stored.is_empty());
    assert!(harness.calendar.calls().is_empty());
    assert_eq!(lead(&harness).await.pending_clarification, PendingClarification::BusinessHours);
    assert_eq!(harness.audit.events_of("appointment.rejected").len(), 1);
}

#[tokio::test]
async fn monte_verde_goes_out_once_unless_asked_again_explicitly() {
    let harness = harness();
    let channel = RecordingChannel::default();
    let ask = |explicit: bool| {
        let mut intent = InterpretedIntent::new(IntentKind::RequestResources);
        intent.requested_resources = vec!["Monte Verde".to_string()];
        intent.explicit_resource_request = explicit;
        intent
    };

    let (first, report) = harness
        .orchestrator
        .process(&request("m1", "info de Monte Verde", at(0), ask(false)), &channel)
        .await
        .expect("first");
    assert_eq!(first.deliveries.len(), 2);
    assert_eq!(report.delivered.len(), 2);

    let (second, _) = harness
        .orchestrator
        .process(&request("m2", "info de Monte Verde", at(60), ask(false)), &channel)
        .await
        .expect("second");
    assert!(second.deliveries.is_empty());

    let (third, _) = harness
        .orchestrator
        .process(&request("m3", "mándame otra vez el brochure", at(120), ask(true)), &channel)
        .await
        .expect("third");
    assert_eq!(third.deliveries.len(), 2);

    let stored = lead(&harness).await;
    assert_eq!(stored.resources_sent_for.len(), 1);
    let records = harness.stores.deliveries.list_for_lead(&stored.id).await.expect("records");
    assert_eq!(records.len(), 2);

    let attachments = channel
        .sent()
        .into_iter()
        .filter(|(_, action)| matches!(action, OutboundAction::Attachment { .. }))
        .count();
    assert_eq!(attachments, 4);
}

#[tokio::test]
async fn rejected_attachments_are_not_recorded_and_go_out_next_time() {
    let harness = harness();
    let mut intent = InterpretedIntent::new(IntentKind::RequestResources);
    intent.requested_resources = vec!["Monte Verde".to_string()];

    let rejecting = RecordingChannel::rejecting_attachments();
    let (_, report) = harness
        .orchestrator
        .process(&request("r1", "info", at(0), intent.clone()), &rejecting)
        .await
        .expect("first");
    assert!(report.delivered.is_empty());
    assert_eq!(report.failed.len(), 2);
    assert!(lead(&harness).await.resources_sent_for.is_empty());

    let (retry, _) = harness
        .orchestrator
        .process(&request("r2", "info", at(60), intent), &RecordingChannel::default())
        .await
        .expect("retry");
    assert_eq!(retry.deliveries.len(), 2);
}

#[tokio::test]
async fn recording_the_same_delivery_twice_is_idempotent() {
    let harness = harness();
    let mut intent = InterpretedIntent::new(IntentKind::RequestResources);
    intent.requested_resources = vec!["Monte Verde".to_string()];
    let outcome = harness
        .orchestrator
        .handle(&request("d1", "info", at(0), intent))
        .await
        .expect("handle");
    assert_eq!(outcome.deliveries.len(), 2);

    for _ in 0..2 {
        harness
            .orchestrator
            .record_deliveries(PHONE, &outcome.deliveries, at(1))
            .await
            .expect("record");
    }

    let stored = lead(&harness).await;
    assert_eq!(stored.resources_sent_for.len(), 1);
    let records = harness.stores.deliveries.list_for_lead(&stored.id).await.expect("records");
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn move_it_to_five_keeps_the_day_and_updates_the_same_event() {
    let harness = harness();
    let lead_id = introduce(&harness, "Ana", "Miravalle").await;

    let booked = harness
        .orchestrator
        .handle(&request("b1", "quiero visitar", at(60), schedule_visit(10, "11:00")))
        .await
        .expect("book");
    let Some(LifecycleDecision::Created(created)) = booked.decision else {
        panic!("expected a created appointment, got {:?}", booked.decision);
    };
    let event_ref = created.external_calendar_ref.clone().expect("calendar ref");

    let moved = harness
        .orchestrator
        .handle(&request(
            "b2",
            "move it to 5",
            at(120),
            InterpretedIntent::new(IntentKind::Reschedule),
        ))
        .await
        .expect("reschedule");
    let Some(LifecycleDecision::Rescheduled { appointment, previous }) = moved.decision else {
        panic!("expected a reschedule, got {:?}", moved.decision);
    };

    assert_eq!(appointment.id, created.id);
    assert_eq!(appointment.scheduled_date, date(10));
    assert_eq!(appointment.scheduled_time, time(17));
    assert_eq!(previous.time, time(11));
    assert_eq!(appointment.external_calendar_ref.as_deref(), Some(event_ref.as_str()));

    let calls = harness.calendar.calls();
    let creates = calls.iter().filter(|call| matches!(call, CalendarCall::Create { .. })).count();
    assert_eq!(creates, 1);
    assert!(matches!(
        calls.last(),
        Some(CalendarCall::Update { event_ref: updated, .. }) if *updated == event_ref
    ));
    assert_eq!(harness.calendar.event_slot(&event_ref).as_deref(), Some("2026-03-10 17:00"));

    let stored = harness.stores.appointments.list_for_lead(&lead_id).await.expect("list");
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn redelivered_confirmation_books_once_and_notifies_once() {
    let harness = harness();
    introduce(&harness, "Ana", "Miravalle").await;

    let confirm = InterpretedIntent::new(IntentKind::ConfirmAppointment)
        .with_field("date", "2026-03-10")
        .with_field("time", "4pm");
    let first = request("c1", "confirm tomorrow 4pm", at(60), confirm.clone());
    let mut again = first.clone();
    again.message.received_at = at(61);

    let (a, b) =
        tokio::join!(harness.orchestrator.handle(&first), harness.orchestrator.handle(&again));
    let outcomes = [a.expect("first"), b.expect("second")];

    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_suppressed()).count(), 1);
    let suppressed = outcomes.iter().find(|outcome| outcome.is_suppressed()).expect("one");
    assert!(suppressed.actions.is_empty());

    let lead_id = lead(&harness).await.id;
    let appointments = harness.stores.appointments.list_for_lead(&lead_id).await.expect("list");
    assert_eq!(appointments.len(), 1);
    assert_eq!(appointments[0].scheduled_time, time(16));

    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 1, "the score jump rides on the booking page");
    let booked = sent
        .iter()
        .filter(|notification| notification.reason == NotificationReason::AppointmentBooked)
        .count();
    assert_eq!(booked, 1);
}

#[tokio::test]
async fn failed_commit_then_redelivery_books_and_pages_once() {
    let memory = InMemoryStore::default();
    let flaky =
        Arc::new(FlakyMutations { inner: memory.clone(), failures: AtomicUsize::new(0) });
    let mut stores = Stores::from_memory(memory);
    stores.mutations = flaky.clone();
    let harness = harness_with(stores);
    let lead_id = introduce(&harness, "Ana", "Miravalle").await;

    let booked_pages = |harness: &Harness| {
        harness
            .notifier
            .sent()
            .iter()
            .filter(|notification| notification.reason == NotificationReason::AppointmentBooked)
            .count()
    };

    flaky.fail_next(1);
    let booking = request("c1", "quiero visitar el martes", at(60), schedule_visit(10, "11:00"));
    let error = harness.orchestrator.handle(&booking).await.expect_err("commit fails");
    assert!(matches!(error, ApplicationError::Persistence(_)));
    assert!(harness.calendar.calls().is_empty());
    assert_eq!(booked_pages(&harness), 0);

    let outcome = harness.orchestrator.handle(&booking).await.expect("redelivery");
    assert!(!outcome.is_suppressed());
    assert!(matches!(outcome.decision, Some(LifecycleDecision::Created(_))));

    let creates = harness
        .calendar
        .calls()
        .iter()
        .filter(|call| matches!(call, CalendarCall::Create { .. }))
        .count();
    assert_eq!(creates, 1);
    assert_eq!(booked_pages(&harness), 1);

    let stored = harness.stores.appointments.list_for_lead(&lead_id).await.expect("list");
    assert_eq!(stored.len(), 1);
    assert!(stored[0].external_calendar_ref.is_some());
    assert!(!stored[0].sync_pending);
}

#[tokio::test]
async fn distinct_message_inside_the_window_is_suppressed() {
    let harness = harness();
    introduce(&harness, "Ana", "Miravalle").await;

    let first = harness
        .orchestrator
        .handle(&request("w1", "confirm tomorrow 4pm", at(60), schedule_visit(10, "16:00")))
        .await
        .expect("first");
    let second = harness
        .orchestrator
        .handle(&request("w2", "confirm tomorrow 4pm", at(62), schedule_visit(10, "16:00")))
        .await
        .expect("second");

    assert!(!first.is_suppressed());
    assert!(second.is_suppressed());
    assert_eq!(harness.audit.events_of("message.suppressed").len(), 1);
}

#[tokio::test]
async fn concurrent_creates_leave_one_active_visit() {
    let harness = sql_harness().await;
    let lead_id = introduce(&harness, "Ana", "Miravalle").await;

    let morning = request("x1", "visita el martes", at(60), schedule_visit(10, "11:00"));
    let noon = request("x2", "visita el martes", at(70), schedule_visit(10, "12:00"));
    let (a, b) =
        tokio::join!(harness.orchestrator.handle(&morning), harness.orchestrator.handle(&noon));
    let outcomes = [a.expect("first"), b.expect("second")];

    let created = outcomes
        .iter()
        .filter(|outcome| matches!(outcome.decision, Some(LifecycleDecision::Created(_))))
        .count();
    assert_eq!(created, 1);

    let stored = harness.stores.appointments.list_for_lead(&lead_id).await.expect("list");
    let active: Vec<_> = stored
        .iter()
        .filter(|appointment| appointment.kind == AppointmentKind::Visit && appointment.is_active())
        .collect();
    assert_eq!(stored.len(), 1);
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn cancelling_then_booking_again_keeps_one_active_visit() {
    let harness = sql_harness().await;
    let lead_id = introduce(&harness, "Ana", "Miravalle").await;

    harness
        .orchestrator
        .handle(&request("k1", "visita", at(60), schedule_visit(10, "11:00")))
        .await
        .expect("book");
    let cancelled = harness
        .orchestrator
        .handle(&request("k2", "cancela", at(120), InterpretedIntent::new(IntentKind::Cancel)))
        .await
        .expect("cancel");
    assert!(matches!(cancelled.decision, Some(LifecycleDecision::Cancelled(_))));
    let calls = harness.calendar.calls();
    assert!(calls.iter().any(|call| matches!(call, CalendarCall::Cancel { .. })));

    harness
        .orchestrator
        .handle(&request("k3", "mejor el jueves", at(180), schedule_visit(12, "12:00")))
        .await
        .expect("rebook");

    let stored = harness.stores.appointments.list_for_lead(&lead_id).await.expect("list");
    assert_eq!(stored.len(), 2);
    let statuses: Vec<_> = stored.iter().map(|appointment| appointment.status).collect();
    assert!(statuses.contains(&AppointmentStatus::Cancelled));
    assert_eq!(stored.iter().filter(|appointment| appointment.is_active()).count(), 1);
}

#[tokio::test]
async fn visited_leads_are_nurtured_softly_whatever_the_score() {
    let harness = harness();
    let mut visited = Lead::new(PHONE, at(-86_400));
    visited.name = Some("Ana".to_string());
    visited.funnel_status = FunnelStatus::Visited;
    visited.score = 95;
    visited.message_count = 12;
    harness.stores.leads.save(visited).await.expect("seed");

    let outcome = harness
        .orchestrator
        .handle(&request("v1", "gracias por la visita", at(0), InterpretedIntent::default()))
        .await
        .expect("handle");

    let phase = outcome.phase.expect("phase");
    assert_eq!(phase.phase, Phase::Nurturing);
    assert!(phase.allow_push_to_appointment);
    assert_eq!(phase.push_style, PushStyle::Soft);
    assert_eq!(lead(&harness).await.funnel_status, FunnelStatus::Visited);
}

#[tokio::test]
async fn calendar_outage_marks_sync_pending_and_resync_recovers() {
    let harness = harness();
    let lead_id = introduce(&harness, "Ana", "Miravalle").await;
    harness.calendar.fail_next(2);

    let booked = harness
        .orchestrator
        .handle(&request("s1", "visita", at(60), schedule_visit(10, "11:00")))
        .await
        .expect("book");
    assert!(matches!(booked.decision, Some(LifecycleDecision::Created(_))));

    let stored = harness.stores.appointments.list_for_lead(&lead_id).await.expect("list");
    assert!(stored[0].sync_pending);
    assert!(stored[0].external_calendar_ref.is_none());

    let recovered = harness.orchestrator.resync_pending().await.expect("resync");
    assert_eq!(recovered, 1);
    let stored = harness.stores.appointments.list_for_lead(&lead_id).await.expect("list");
    assert!(!stored[0].sync_pending);
    assert!(stored[0].external_calendar_ref.is_some());
}

#[tokio::test]
async fn complaints_reach_the_sales_manager_every_time() {
    let harness = harness();
    for (index, id) in ["q1", "q2"].into_iter().enumerate() {
        harness
            .orchestrator
            .handle(&request(
                id,
                "nadie me ha llamado",
                at(60 * index as i64),
                InterpretedIntent::new(IntentKind::Complaint),
            ))
            .await
            .expect("complaint");
    }

    let complaints: Vec<_> = harness
        .notifier
        .sent()
        .into_iter()
        .filter(|notification| notification.reason == NotificationReason::Complaint)
        .collect();
    assert_eq!(complaints.len(), 2);
    assert!(complaints
        .iter()
        .all(|notification| notification.recipient_role == RecipientRole::SalesManager));
}

#[tokio::test]
async fn booking_without_a_name_asks_for_it_and_resumes() {
    let harness = harness();
    let pending = harness
        .orchestrator
        .handle(&request("n1", "quiero visitar Miravalle", at(0), schedule_visit(10, "11:00")))
        .await
        .expect("first");
    assert!(matches!(
        pending.decision,
        Some(LifecycleDecision::PendingInfo { missing: PendingClarification::Name, .. })
    ));
    assert_eq!(lead(&harness).await.pending_clarification, PendingClarification::Name);

    let resumed = harness
        .orchestrator
        .handle(&request(
            "n2",
            "Ana",
            at(60),
            InterpretedIntent::new(IntentKind::ProvideInfo)
                .with_field("date", "2026-03-10")
                .with_field("time", "11:00"),
        ))
        .await
        .expect("second");
    assert!(matches!(resumed.decision, Some(LifecycleDecision::Created(_))));
    assert_eq!(lead(&harness).await.name.as_deref(), Some("Ana"));
}

#[tokio::test]
async fn callback_paused_for_a_name_keeps_its_slot() {
    let harness = harness();
    let ask = InterpretedIntent::new(IntentKind::ScheduleCallback)
        .with_field("date", "2026-03-10")
        .with_field("time", "11:00");
    let pending = harness
        .orchestrator
        .handle(&request("cb1", "llámame el martes a las 11", at(0), ask))
        .await
        .expect("first");
    assert!(matches!(
        pending.decision,
        Some(LifecycleDecision::PendingInfo { missing: PendingClarification::Name, .. })
    ));
    let paused = lead(&harness).await.pending_request.expect("request kept");
    assert_eq!(paused.kind, AppointmentKind::Callback);

    let resumed = harness
        .orchestrator
        .handle(&request("cb2", "Ana", at(60), InterpretedIntent::new(IntentKind::ProvideInfo)))
        .await
        .expect("second");
    let Some(LifecycleDecision::Created(callback)) = resumed.decision else {
        panic!("expected the callback to be booked, got {:?}", resumed.decision);
    };
    assert_eq!(callback.kind, AppointmentKind::Callback);
    assert_eq!(callback.scheduled_date, date(10));
    assert_eq!(callback.scheduled_time, time(11));

    let stored = lead(&harness).await;
    assert_eq!(stored.name.as_deref(), Some("Ana"));
    assert_eq!(stored.pending_request, None);
    assert_eq!(stored.pending_clarification, PendingClarification::None);
}

#[tokio::test]
async fn missing_phone_is_a_domain_error() {
    let harness = harness();
    let mut bad = request("e1", "hola", at(0), InterpretedIntent::default());
    bad.message.phone = "  ".to_string();

    let error = harness.orchestrator.handle(&bad).await.expect_err("must fail");
    assert!(matches!(error, ApplicationError::Domain(_)));
}
