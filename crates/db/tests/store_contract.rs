use chrono::{Duration, NaiveDate, NaiveTime, Utc};

use leadflow_core::domain::appointment::{
    Appointment, AppointmentId, AppointmentKind, AppointmentStatus,
};
use leadflow_core::domain::batch::{MutationBatch, ProcessedMessage};
use leadflow_core::domain::conversation::{ConversationTurn, TurnRole};
use leadflow_core::domain::delivery::{DeliveryKey, ResourceDeliveryRecord, ResourceType};
use leadflow_core::domain::lead::Lead;
use leadflow_core::domain::notification::{
    NotificationKey, NotificationReason, NotificationRecord, RecipientRole,
};
use leadflow_db::{connect_with_settings, migrations, RepositoryError, Stores};

async fn sql_stores() -> Stores {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    Stores::sql(pool)
}

fn visit(id: &str, lead: &Lead, status: AppointmentStatus) -> Appointment {
    let now = Utc::now();
    Appointment {
        id: AppointmentId(id.to_string()),
        lead_id: lead.id.clone(),
        kind: AppointmentKind::Visit,
        development: Some("Monte Verde".to_string()),
        scheduled_date: NaiveDate::from_ymd_opt(2026, 3, 10).expect("date"),
        scheduled_time: NaiveTime::from_hms_opt(11, 0, 0).expect("time"),
        status,
        external_calendar_ref: None,
        rescheduled_from: None,
        assigned_agent_id: None,
        sync_pending: false,
        created_at: now,
        updated_at: now,
    }
}

fn first_message_batch(lead: &Lead, message_id: &str) -> MutationBatch {
    let now = Utc::now();
    MutationBatch {
        lead: Some(lead.clone()),
        appointments: vec![visit("APT-1", lead, AppointmentStatus::Scheduled)],
        delivery_records: vec![ResourceDeliveryRecord {
            key: DeliveryKey {
                lead_id: lead.id.clone(),
                development: "Monte Verde".to_string(),
                resource_type: ResourceType::Brochure,
            },
            delivered_at: now,
        }],
        notification_records: vec![NotificationRecord {
            key: NotificationKey {
                lead_id: lead.id.clone(),
                recipient_role: RecipientRole::AssignedAgent,
                reason: NotificationReason::AppointmentBooked,
            },
            last_sent_at: now,
        }],
        turns: vec![
            ConversationTurn::new(lead.id.clone(), TurnRole::User, "hola", now),
            ConversationTurn::new(
                lead.id.clone(),
                TurnRole::Assistant,
                "¡Hola!",
                now + Duration::milliseconds(5),
            ),
        ],
        processed_message: Some(ProcessedMessage {
            message_id: message_id.to_string(),
            lead_id: lead.id.clone(),
            processed_at: now,
        }),
    }
}

async fn assert_batch_is_atomic(stores: Stores) {
    let lead = Lead::new("+5215550001111", Utc::now());
    stores.mutations.apply_batch(&first_message_batch(&lead, "wamid-1"), 30).await.expect("apply");

    assert!(stores.ledger.is_processed("wamid-1").await.expect("ledger"));
    assert_eq!(stores.deliveries.list_for_lead(&lead.id).await.expect("deliveries").len(), 1);
    assert_eq!(stores.conversations.recent(&lead.id, 30).await.expect("turns").len(), 2);

    let mut conflicting = first_message_batch(&lead, "wamid-2");
    conflicting.appointments = vec![visit("APT-2", &lead, AppointmentStatus::Scheduled)];
    let error = stores.mutations.apply_batch(&conflicting, 30).await.expect_err("conflict");
    assert!(matches!(error, RepositoryError::Conflict(_)));

    assert!(!stores.ledger.is_processed("wamid-2").await.expect("ledger"));
    assert_eq!(stores.conversations.recent(&lead.id, 30).await.expect("turns").len(), 2);
    assert_eq!(stores.appointments.list_for_lead(&lead.id).await.expect("list").len(), 1);
}

#[tokio::test]
async fn sql_store_applies_batches_atomically() {
    assert_batch_is_atomic(sql_stores().await).await;
}

#[tokio::test]
async fn in_memory_store_applies_batches_atomically() {
    assert_batch_is_atomic(Stores::in_memory()).await;
}

async fn assert_notification_records_upsert(stores: Stores) {
    let lead = Lead::new("+5215550002222", Utc::now());
    stores.leads.save(lead.clone()).await.expect("lead");
    let key = NotificationKey {
        lead_id: lead.id.clone(),
        recipient_role: RecipientRole::SalesManager,
        reason: NotificationReason::HotLead,
    };
    let first = Utc::now() - Duration::hours(5);
    let second = Utc::now();

    stores
        .notifications
        .save(NotificationRecord { key: key.clone(), last_sent_at: first })
        .await
        .expect("first");
    stores
        .notifications
        .save(NotificationRecord { key: key.clone(), last_sent_at: second })
        .await
        .expect("second");

    let stored = stores.notifications.find(&key).await.expect("find").expect("record");
    assert_eq!(stored.last_sent_at, second);
}

#[tokio::test]
async fn sql_notification_records_upsert_by_key() {
    assert_notification_records_upsert(sql_stores().await).await;
}

#[tokio::test]
async fn in_memory_notification_records_upsert_by_key() {
    assert_notification_records_upsert(Stores::in_memory()).await;
}
