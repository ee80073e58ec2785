use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};

use leadflow_core::domain::delivery::{DeliveryKey, ResourceDeliveryRecord, ResourceType};
use leadflow_core::domain::lead::LeadId;

use super::codec::{encode_timestamp, map_write_error, parse_enum, parse_timestamp};
use super::{DeliveryRepository, RepositoryError};
use crate::DbPool;

pub struct SqlDeliveryRepository {
    pool: DbPool,
}

impl SqlDeliveryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DeliveryRepository for SqlDeliveryRepository {
    async fn find(
        &self,
        key: &DeliveryKey,
    ) -> Result<Option<ResourceDeliveryRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT lead_id, development, resource_type, delivered_at
             FROM resource_delivery
             WHERE lead_id = ? AND development = ? AND resource_type = ?",
        )
        .bind(&key.lead_id.0)
        .bind(&key.development)
        .bind(key.resource_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(record_from_row).transpose()
    }

    async fn list_for_lead(
        &self,
        lead_id: &LeadId,
    ) -> Result<Vec<ResourceDeliveryRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT lead_id, development, resource_type, delivered_at
             FROM resource_delivery
             WHERE lead_id = ?
             ORDER BY delivered_at ASC, development ASC",
        )
        .bind(&lead_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(record_from_row).collect()
    }

    async fn record(&self, record: ResourceDeliveryRecord) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        upsert_delivery(&mut conn, &record).await
    }
}

pub(crate) async fn upsert_delivery(
    conn: &mut SqliteConnection,
    record: &ResourceDeliveryRecord,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO resource_delivery (lead_id, development, resource_type, delivered_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(lead_id, development, resource_type)
         DO UPDATE SET delivered_at = excluded.delivered_at",
    )
    .bind(&record.key.lead_id.0)
    .bind(&record.key.development)
    .bind(record.key.resource_type.as_str())
    .bind(encode_timestamp(record.delivered_at))
    .execute(&mut *conn)
    .await
    .map_err(|error| map_write_error(error, "resource delivery"))?;
    Ok(())
}

fn record_from_row(row: SqliteRow) -> Result<ResourceDeliveryRecord, RepositoryError> {
    let resource_raw = row.try_get::<String, _>("resource_type")?;
    Ok(ResourceDeliveryRecord {
        key: DeliveryKey {
            lead_id: LeadId(row.try_get("lead_id")?),
            development: row.try_get("development")?,
            resource_type: parse_enum("resource type", &resource_raw, ResourceType::parse)?,
        },
        delivered_at: parse_timestamp("delivered_at", row.try_get("delivered_at")?)?,
    })
}
