//! Calendar and staff-notification side effects, run only after the turn's batch commits.
//!
//! Every external call is tried twice. A calendar failure flags the appointment
//! `sync_pending` instead of undoing the local change; a notification failure is logged and
//! leaves no cooldown record, so the next trigger sends again.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{info, warn};

use leadflow_core::config::PolicyConfig;
use leadflow_core::domain::appointment::{Appointment, AppointmentStatus};
use leadflow_core::domain::batch::MutationBatch;
use leadflow_core::domain::lead::Lead;
use leadflow_core::domain::notification::{NotificationRecord, StaffNotification};
use leadflow_db::repositories::NotificationRepository;

use crate::calendar::{CalendarError, CalendarProvider};
use crate::notify::{NotifyError, StaffNotifier};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("calendar sync failed for appointment {appointment_id}: {source}")]
    Calendar { appointment_id: String, source: CalendarError },
    #[error("staff notification failed: {0}")]
    Notification(#[from] NotifyError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent,
    CoolingDown,
    Disabled,
    Failed,
}

async fn retry_once<T, E, F, Fut>(mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match operation().await {
        Ok(value) => Ok(value),
        Err(error) => {
            warn!(event_name = "sync.retry", error = %error, "external call failed; retrying once");
            operation().await
        }
    }
}

pub struct ExternalSync {
    calendar: Arc<dyn CalendarProvider>,
    notifier: Arc<dyn StaffNotifier>,
    notifications: Arc<dyn NotificationRepository>,
    cooldown: Duration,
}

impl ExternalSync {
    pub fn new(
        calendar: Arc<dyn CalendarProvider>,
        notifier: Arc<dyn StaffNotifier>,
        notifications: Arc<dyn NotificationRepository>,
        policy: &PolicyConfig,
    ) -> Self {
        let cooldown = Duration::seconds(
            i64::try_from(policy.notification_cooldown_secs).unwrap_or(i64::MAX),
        );
        Self { calendar, notifier, notifications, cooldown }
    }

    pub fn calendar_enabled(&self) -> bool {
        self.calendar.enabled()
    }

    /// Brings the external event in line with `appointment`, keyed on its id: no ref means
    /// create, an existing ref is updated in place, and a cancel without a ref is a no-op.
    pub async fn sync_calendar(
        &self,
        appointment: &mut Appointment,
        lead: &Lead,
    ) -> Result<(), SyncError> {
        if !self.calendar.enabled() {
            return Ok(());
        }

        let existing_ref = appointment.external_calendar_ref.clone();
        let snapshot = appointment.clone();
        let result = match (existing_ref.as_deref(), snapshot.status) {
            (None, AppointmentStatus::Cancelled) => Ok(()),
            (Some(event_ref), AppointmentStatus::Cancelled) => {
                retry_once(|| self.calendar.cancel_event(event_ref)).await
            }
            (Some(event_ref), _) => {
                retry_once(|| self.calendar.update_event(event_ref, &snapshot, lead)).await
            }
            (None, _) => retry_once(|| self.calendar.create_event(&snapshot, lead))
                .await
                .map(|event_ref| appointment.external_calendar_ref = Some(event_ref)),
        };

        match result {
            Ok(()) => {
                appointment.sync_pending = false;
                Ok(())
            }
            Err(source) => {
                appointment.sync_pending = true;
                warn!(
                    event_name = "sync.calendar.pending",
                    appointment_id = %appointment.id.0,
                    lead_id = %appointment.lead_id.0,
                    error = %source,
                    "calendar sync failed twice; marked sync_pending"
                );
                Err(SyncError::Calendar { appointment_id: appointment.id.0.clone(), source })
            }
        }
    }

    /// Sends unless the same `(lead, role, reason)` went out within the cooldown. Urgent
    /// reasons always send. Records staged in `batch` count as already sent; a successful send
    /// stages its record there for the caller to persist.
    pub async fn notify(
        &self,
        notification: &StaffNotification,
        now: DateTime<Utc>,
        batch: &mut MutationBatch,
    ) -> NotifyOutcome {
        let key = notification.key();

        if !notification.reason.is_urgent() {
            let staged = batch
                .notification_records
                .iter()
                .find(|record| record.key == key)
                .map(|record| record.last_sent_at);
            let last_sent_at = match staged {
                Some(at) => Some(at),
                None => match self.notifications.find(&key).await {
                    Ok(record) => record.map(|record| record.last_sent_at),
                    Err(error) => {
                        warn!(
                            event_name = "sync.notify.cooldown_lookup_failed",
                            lead_id = %key.lead_id.0,
                            error = %error,
                            "cooldown lookup failed; sending anyway"
                        );
                        None
                    }
                },
            };
            if let Some(last) = last_sent_at {
                if now >= last && now - last < self.cooldown {
                    info!(
                        event_name = "sync.notify.cooldown",
                        lead_id = %key.lead_id.0,
                        reason = notification.reason.as_str(),
                        recipient_role = notification.recipient_role.as_str(),
                        "notification suppressed by cooldown"
                    );
                    return NotifyOutcome::CoolingDown;
                }
            }
        }

        if !self.notifier.enabled() {
            return NotifyOutcome::Disabled;
        }

        match retry_once(|| self.notifier.send(notification)).await {
            Ok(()) => {
                batch.push_notification_record(NotificationRecord { key, last_sent_at: now });
                NotifyOutcome::Sent
            }
            Err(error) => {
                let error = SyncError::from(error);
                warn!(
                    event_name = "sync.notify.failed",
                    lead_id = %key.lead_id.0,
                    reason = notification.reason.as_str(),
                    error = %error,
                    "staff notification failed twice"
                );
                NotifyOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

    use leadflow_core::config::PolicyConfig;
    use leadflow_core::domain::appointment::{
        Appointment, AppointmentId, AppointmentKind, AppointmentStatus, Slot,
    };
    use leadflow_core::domain::batch::MutationBatch;
    use leadflow_core::domain::lead::Lead;
    use leadflow_core::domain::notification::{
        NotificationReason, NotificationRecord, RecipientRole, StaffNotification,
    };
    use leadflow_db::repositories::{InMemoryStore, NotificationRepository};

    use super::{ExternalSync, NotifyOutcome, SyncError};
    use crate::calendar::{CalendarCall, InMemoryCalendar, NoopCalendar};
    use crate::notify::InMemoryNotifier;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 9, 16, 0, 0).single().expect("now")
    }

    fn appointment(lead: &Lead) -> Appointment {
        Appointment {
            id: AppointmentId("APT-1".to_string()),
            lead_id: lead.id.clone(),
            kind: AppointmentKind::Visit,
            development: Some("Miravalle".to_string()),
            scheduled_date: NaiveDate::from_ymd_opt(2026, 3, 10).expect("date"),
            scheduled_time: NaiveTime::from_hms_opt(11, 0, 0).expect("time"),
            status: AppointmentStatus::Scheduled,
            external_calendar_ref: None,
            rescheduled_from: None,
            assigned_agent_id: Some("agent-7".to_string()),
            sync_pending: false,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn sync_with(
        calendar: InMemoryCalendar,
        notifier: InMemoryNotifier,
        store: InMemoryStore,
    ) -> ExternalSync {
        ExternalSync::new(
            Arc::new(calendar),
            Arc::new(notifier),
            Arc::new(store),
            &PolicyConfig::default(),
        )
    }

    fn calendar_sync(calendar: InMemoryCalendar) -> ExternalSync {
        sync_with(calendar, InMemoryNotifier::default(), InMemoryStore::default())
    }

    fn notification(lead: &Lead, reason: NotificationReason) -> StaffNotification {
        StaffNotification {
            lead_id: lead.id.clone(),
            recipient_role: RecipientRole::AssignedAgent,
            recipient_id: Some("agent-7".to_string()),
            reason,
            text: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn create_then_reschedule_updates_same_event() {
        let calendar = InMemoryCalendar::default();
        let sync = calendar_sync(calendar.clone());
        let lead = Lead::new("+5215550001111", now());
        let mut appointment = appointment(&lead);

        sync.sync_calendar(&mut appointment, &lead).await.expect("create");
        let event_ref = appointment.external_calendar_ref.clone().expect("ref assigned");

        let target = Slot {
            date: appointment.scheduled_date,
            time: NaiveTime::from_hms_opt(17, 0, 0).expect("time"),
        };
        appointment.reschedule_in_place(target, now()).expect("reschedule");
        sync.sync_calendar(&mut appointment, &lead).await.expect("update");

        assert_eq!(appointment.external_calendar_ref.as_deref(), Some(event_ref.as_str()));
        assert_eq!(calendar.event_slot(&event_ref).as_deref(), Some("2026-03-10 17:00"));
        assert!(matches!(calendar.calls()[1], CalendarCall::Update { .. }));
    }

    #[tokio::test]
    async fn single_failure_is_retried() {
        let calendar = InMemoryCalendar::default();
        calendar.fail_next(1);
        let sync = calendar_sync(calendar.clone());
        let lead = Lead::new("+5215550001111", now());
        let mut appointment = appointment(&lead);

        sync.sync_calendar(&mut appointment, &lead).await.expect("second attempt succeeds");

        assert!(!appointment.sync_pending);
        assert_eq!(calendar.calls().len(), 2);
    }

    #[tokio::test]
    async fn double_failure_marks_sync_pending() {
        let calendar = InMemoryCalendar::default();
        calendar.fail_next(2);
        let sync = calendar_sync(calendar.clone());
        let lead = Lead::new("+5215550001111", now());
        let mut appointment = appointment(&lead);

        let error = sync.sync_calendar(&mut appointment, &lead).await.expect_err("both fail");

        assert!(matches!(error, SyncError::Calendar { .. }));
        assert!(appointment.sync_pending);
        assert_eq!(appointment.external_calendar_ref, None);
        assert_eq!(appointment.status, AppointmentStatus::Scheduled);
    }

    #[tokio::test]
    async fn cancel_without_ref_is_noop_and_disabled_calendar_is_skipped() {
        let calendar = InMemoryCalendar::default();
        let sync = calendar_sync(calendar.clone());
        let lead = Lead::new("+5215550001111", now());
        let mut cancelled = appointment(&lead);
        cancelled.status = AppointmentStatus::Cancelled;

        sync.sync_calendar(&mut cancelled, &lead).await.expect("noop");
        assert!(calendar.calls().is_empty());

        let disabled = ExternalSync::new(
            Arc::new(NoopCalendar),
            Arc::new(InMemoryNotifier::default()),
            Arc::new(InMemoryStore::default()),
            &PolicyConfig::default(),
        );
        let mut fresh = appointment(&lead);
        disabled.sync_calendar(&mut fresh, &lead).await.expect("skipped");
        assert_eq!(fresh.external_calendar_ref, None);
        assert!(!fresh.sync_pending);
    }

    #[tokio::test]
    async fn cooldown_suppresses_repeat_but_not_urgent() {
        let store = InMemoryStore::default();
        let notifier = InMemoryNotifier::default();
        let sync = sync_with(InMemoryCalendar::default(), notifier.clone(), store.clone());
        let lead = Lead::new("+5215550001111", now());

        let booked = notification(&lead, NotificationReason::AppointmentBooked);
        store
            .save(NotificationRecord { key: booked.key(), last_sent_at: now() - Duration::hours(1) })
            .await
            .expect("prior record");

        let mut batch = MutationBatch::default();
        assert_eq!(sync.notify(&booked, now(), &mut batch).await, NotifyOutcome::CoolingDown);

        let complaint = notification(&lead, NotificationReason::Complaint);
        assert_eq!(sync.notify(&complaint, now(), &mut batch).await, NotifyOutcome::Sent);
        assert_eq!(sync.notify(&complaint, now(), &mut batch).await, NotifyOutcome::Sent);

        let later = now() + Duration::hours(4);
        assert_eq!(sync.notify(&booked, later, &mut batch).await, NotifyOutcome::Sent);

        assert_eq!(notifier.sent().len(), 3);
        assert_eq!(batch.notification_records.len(), 2);
    }

    #[tokio::test]
    async fn failed_notification_leaves_no_record() {
        let notifier = InMemoryNotifier::default();
        notifier.fail_next(2);
        let sync =
            sync_with(InMemoryCalendar::default(), notifier.clone(), InMemoryStore::default());
        let lead = Lead::new("+5215550001111", now());

        let mut batch = MutationBatch::default();
        let outcome =
            sync.notify(&notification(&lead, NotificationReason::HotLead), now(), &mut batch).await;

        assert_eq!(outcome, NotifyOutcome::Failed);
        assert!(batch.notification_records.is_empty());
        assert!(notifier.sent().is_empty());
    }
}
