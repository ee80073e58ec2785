use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};

use leadflow_core::domain::lead::{FunnelStatus, Lead, LeadId, PendingClarification};

use super::codec::{
    encode_json, encode_timestamp, map_write_error, parse_enum, parse_json, parse_timestamp,
    parse_u32, parse_u8,
};
use super::{LeadRepository, RepositoryError};
use crate::DbPool;

const LEAD_COLUMNS: &str = "id,
                phone,
                name,
                score,
                funnel_status,
                property_interest_json,
                notes_json,
                resources_sent_for_json,
                name_ask_count,
                pending_clarification,
                pending_request_json,
                assigned_agent_id,
                message_count,
                created_at,
                last_message_at";

pub struct SqlLeadRepository {
    pool: DbPool,
}

impl SqlLeadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl LeadRepository for SqlLeadRepository {
    async fn find_by_id(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {LEAD_COLUMNS} FROM lead WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(lead_from_row).transpose()
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Lead>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {LEAD_COLUMNS} FROM lead WHERE phone = ?"))
            .bind(phone)
            .fetch_optional(&self.pool)
            .await?;

        row.map(lead_from_row).transpose()
    }

    async fn save(&self, lead: Lead) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        upsert_lead(&mut conn, &lead).await
    }
}

pub(crate) async fn upsert_lead(
    conn: &mut SqliteConnection,
    lead: &Lead,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO lead (
            id,
            phone,
            name,
            score,
            funnel_status,
            property_interest_json,
            notes_json,
            resources_sent_for_json,
            name_ask_count,
            pending_clarification,
            pending_request_json,
            assigned_agent_id,
            message_count,
            created_at,
            last_message_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
            phone = excluded.phone,
            name = excluded.name,
            score = excluded.score,
            funnel_status = excluded.funnel_status,
            property_interest_json = excluded.property_interest_json,
            notes_json = excluded.notes_json,
            resources_sent_for_json = excluded.resources_sent_for_json,
            name_ask_count = excluded.name_ask_count,
            pending_clarification = excluded.pending_clarification,
            pending_request_json = excluded.pending_request_json,
            assigned_agent_id = excluded.assigned_agent_id,
            message_count = excluded.message_count,
            last_message_at = excluded.last_message_at",
    )
    .bind(&lead.id.0)
    .bind(&lead.phone)
    .bind(lead.name.as_deref())
    .bind(i64::from(lead.score))
    .bind(lead.funnel_status.as_str())
    .bind(encode_json("property_interest_json", &lead.property_interest)?)
    .bind(encode_json("notes_json", &lead.notes)?)
    .bind(encode_json("resources_sent_for_json", &lead.resources_sent_for)?)
    .bind(i64::from(lead.name_ask_count))
    .bind(lead.pending_clarification.as_str())
    .bind(
        lead.pending_request
            .as_ref()
            .map(|request| encode_json("pending_request_json", request))
            .transpose()?,
    )
    .bind(lead.assigned_agent_id.as_deref())
    .bind(i64::from(lead.message_count))
    .bind(encode_timestamp(lead.created_at))
    .bind(encode_timestamp(lead.last_message_at))
    .execute(&mut *conn)
    .await
    .map_err(|error| map_write_error(error, "lead"))?;

    Ok(())
}

fn lead_from_row(row: SqliteRow) -> Result<Lead, RepositoryError> {
    let funnel_raw = row.try_get::<String, _>("funnel_status")?;
    let pending_raw = row.try_get::<String, _>("pending_clarification")?;

    Ok(Lead {
        id: LeadId(row.try_get("id")?),
        phone: row.try_get("phone")?,
        name: row.try_get("name")?,
        score: parse_u8("score", row.try_get("score")?)?,
        funnel_status: parse_enum("funnel status", &funnel_raw, FunnelStatus::parse)?,
        property_interest: parse_json(
            "property_interest_json",
            &row.try_get::<String, _>("property_interest_json")?,
        )?,
        notes: parse_json("notes_json", &row.try_get::<String, _>("notes_json")?)?,
        resources_sent_for: parse_json(
            "resources_sent_for_json",
            &row.try_get::<String, _>("resources_sent_for_json")?,
        )?,
        name_ask_count: parse_u8("name_ask_count", row.try_get("name_ask_count")?)?,
        pending_clarification: parse_enum(
            "pending clarification",
            &pending_raw,
            PendingClarification::parse,
        )?,
        pending_request: row
            .try_get::<Option<String>, _>("pending_request_json")?
            .map(|raw| parse_json("pending_request_json", &raw))
            .transpose()?,
        assigned_agent_id: row.try_get("assigned_agent_id")?,
        message_count: parse_u32("message_count", row.try_get("message_count")?)?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        last_message_at: parse_timestamp("last_message_at", row.try_get("last_message_at")?)?,
    })
}
