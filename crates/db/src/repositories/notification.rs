use sqlx::{Row, SqliteConnection};

use leadflow_core::domain::notification::NotificationRecord;
use leadflow_core::domain::notification::NotificationKey;

use super::codec::{encode_timestamp, map_write_error, parse_timestamp};
use super::{NotificationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlNotificationRepository {
    pool: DbPool,
}

impl SqlNotificationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl NotificationRepository for SqlNotificationRepository {
    async fn find(
        &self,
        key: &NotificationKey,
    ) -> Result<Option<NotificationRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT last_sent_at
             FROM notification_record
             WHERE lead_id = ? AND recipient_role = ? AND reason = ?",
        )
        .bind(&key.lead_id.0)
        .bind(key.recipient_role.as_str())
        .bind(key.reason.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(NotificationRecord {
                key: key.clone(),
                last_sent_at: parse_timestamp("last_sent_at", row.try_get("last_sent_at")?)?,
            })
        })
        .transpose()
    }

    async fn save(&self, record: NotificationRecord) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        upsert_notification(&mut conn, &record).await
    }
}

pub(crate) async fn upsert_notification(
    conn: &mut SqliteConnection,
    record: &NotificationRecord,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO notification_record (lead_id, recipient_role, reason, last_sent_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(lead_id, recipient_role, reason)
         DO UPDATE SET last_sent_at = excluded.last_sent_at",
    )
    .bind(&record.key.lead_id.0)
    .bind(record.key.recipient_role.as_str())
    .bind(record.key.reason.as_str())
    .bind(encode_timestamp(record.last_sent_at))
    .execute(&mut *conn)
    .await
    .map_err(|error| map_write_error(error, "notification record"))?;
    Ok(())
}
