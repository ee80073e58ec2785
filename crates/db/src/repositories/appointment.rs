use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};

use leadflow_core::domain::appointment::{
    Appointment, AppointmentId, AppointmentKind, AppointmentStatus, Slot,
};
use leadflow_core::domain::lead::LeadId;

use super::codec::{
    encode_date, encode_time, encode_timestamp, map_write_error, parse_date, parse_enum,
    parse_time, parse_timestamp,
};
use super::{AppointmentRepository, RepositoryError};
use crate::DbPool;

const APPOINTMENT_COLUMNS: &str = "id,
                lead_id,
                kind,
                development,
                scheduled_date,
                scheduled_time,
                status,
                external_calendar_ref,
                rescheduled_from_date,
                rescheduled_from_time,
                assigned_agent_id,
                sync_pending,
                created_at,
                updated_at";

pub struct SqlAppointmentRepository {
    pool: DbPool,
}

impl SqlAppointmentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AppointmentRepository for SqlAppointmentRepository {
    async fn find_by_id(
        &self,
        id: &AppointmentId,
    ) -> Result<Option<Appointment>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {APPOINTMENT_COLUMNS} FROM appointment WHERE id = ?"))
                .bind(&id.0)
                .fetch_optional(&self.pool)
                .await?;

        row.map(appointment_from_row).transpose()
    }

    async fn find_active(
        &self,
        lead_id: &LeadId,
        kind: AppointmentKind,
    ) -> Result<Option<Appointment>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {APPOINTMENT_COLUMNS}
             FROM appointment
             WHERE lead_id = ? AND kind = ? AND status IN ('scheduled', 'confirmed')
             ORDER BY updated_at DESC
             LIMIT 1"
        ))
        .bind(&lead_id.0)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(appointment_from_row).transpose()
    }

    async fn list_for_lead(&self, lead_id: &LeadId) -> Result<Vec<Appointment>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {APPOINTMENT_COLUMNS}
             FROM appointment
             WHERE lead_id = ?
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(&lead_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(appointment_from_row).collect()
    }

    async fn list_sync_pending(&self) -> Result<Vec<Appointment>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {APPOINTMENT_COLUMNS}
             FROM appointment
             WHERE sync_pending = 1
             ORDER BY updated_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(appointment_from_row).collect()
    }

    async fn save(&self, appointment: Appointment) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        upsert_appointment(&mut conn, &appointment).await
    }
}

pub(crate) async fn upsert_appointment(
    conn: &mut SqliteConnection,
    appointment: &Appointment,
) -> Result<(), RepositoryError> {
    let (from_date, from_time) = match appointment.rescheduled_from {
        Some(slot) => (Some(encode_date(slot.date)), Some(encode_time(slot.time))),
        None => (None, None),
    };

    sqlx::query(
        "INSERT INTO appointment (
            id,
            lead_id,
            kind,
            development,
            scheduled_date,
            scheduled_time,
            status,
            external_calendar_ref,
            rescheduled_from_date,
            rescheduled_from_time,
            assigned_agent_id,
            sync_pending,
            created_at,
            updated_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
            development = excluded.development,
            scheduled_date = excluded.scheduled_date,
            scheduled_time = excluded.scheduled_time,
            status = excluded.status,
            external_calendar_ref = excluded.external_calendar_ref,
            rescheduled_from_date = excluded.rescheduled_from_date,
            rescheduled_from_time = excluded.rescheduled_from_time,
            assigned_agent_id = excluded.assigned_agent_id,
            sync_pending = excluded.sync_pending,
            updated_at = excluded.updated_at",
    )
    .bind(&appointment.id.0)
    .bind(&appointment.lead_id.0)
    .bind(appointment.kind.as_str())
    .bind(appointment.development.as_deref())
    .bind(encode_date(appointment.scheduled_date))
    .bind(encode_time(appointment.scheduled_time))
    .bind(appointment.status.as_str())
    .bind(appointment.external_calendar_ref.as_deref())
    .bind(from_date)
    .bind(from_time)
    .bind(appointment.assigned_agent_id.as_deref())
    .bind(appointment.sync_pending)
    .bind(encode_timestamp(appointment.created_at))
    .bind(encode_timestamp(appointment.updated_at))
    .execute(&mut *conn)
    .await
    .map_err(|error| map_write_error(error, "active appointment"))?;

    Ok(())
}

fn appointment_from_row(row: SqliteRow) -> Result<Appointment, RepositoryError> {
    let kind_raw = row.try_get::<String, _>("kind")?;
    let status_raw = row.try_get::<String, _>("status")?;
    let from_date = row.try_get::<Option<String>, _>("rescheduled_from_date")?;
    let from_time = row.try_get::<Option<String>, _>("rescheduled_from_time")?;

    let rescheduled_from = match (from_date, from_time) {
        (Some(date), Some(time)) => Some(Slot {
            date: parse_date("rescheduled_from_date", &date)?,
            time: parse_time("rescheduled_from_time", &time)?,
        }),
        _ => None,
    };

    Ok(Appointment {
        id: AppointmentId(row.try_get("id")?),
        lead_id: LeadId(row.try_get("lead_id")?),
        kind: parse_enum("appointment kind", &kind_raw, AppointmentKind::parse)?,
        development: row.try_get("development")?,
        scheduled_date: parse_date(
            "scheduled_date",
            &row.try_get::<String, _>("scheduled_date")?,
        )?,
        scheduled_time: parse_time(
            "scheduled_time",
            &row.try_get::<String, _>("scheduled_time")?,
        )?,
        status: parse_enum("appointment status", &status_raw, AppointmentStatus::parse)?,
        external_calendar_ref: row.try_get("external_calendar_ref")?,
        rescheduled_from,
        assigned_agent_id: row.try_get("assigned_agent_id")?,
        sync_pending: row.try_get("sync_pending")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}
