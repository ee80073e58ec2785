use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};

use leadflow_core::domain::batch::ProcessedMessage;
use leadflow_core::domain::lead::LeadId;

use super::codec::{encode_timestamp, map_write_error, parse_timestamp};
use super::{MessageLedgerRepository, RepositoryError};
use crate::DbPool;

/// Ledger of inbound message ids that made it through the gate.
pub struct SqlMessageLedgerRepository {
    pool: DbPool,
}

impl SqlMessageLedgerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MessageLedgerRepository for SqlMessageLedgerRepository {
    async fn is_processed(&self, message_id: &str) -> Result<bool, RepositoryError> {
        let count = sqlx::query(
            "SELECT COUNT(*) AS count FROM processed_message WHERE message_id = ?",
        )
        .bind(message_id)
        .fetch_one(&self.pool)
        .await?
        .try_get::<i64, _>("count")?;

        Ok(count > 0)
    }

    async fn last_processed_at(
        &self,
        lead_id: &LeadId,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        let value = sqlx::query(
            "SELECT MAX(processed_at) AS processed_at FROM processed_message WHERE lead_id = ?",
        )
        .bind(&lead_id.0)
        .fetch_one(&self.pool)
        .await?
        .try_get::<Option<String>, _>("processed_at")?;

        value.map(|raw| parse_timestamp("processed_at", raw)).transpose()
    }
}

/// A replayed message id surfaces as `Conflict`, which rolls back the whole batch.
pub(crate) async fn insert_processed(
    conn: &mut SqliteConnection,
    message: &ProcessedMessage,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO processed_message (message_id, lead_id, processed_at) VALUES (?, ?, ?)",
    )
    .bind(&message.message_id)
    .bind(&message.lead_id.0)
    .bind(encode_timestamp(message.processed_at))
    .execute(&mut *conn)
    .await
    .map_err(|error| map_write_error(error, "processed message"))?;
    Ok(())
}
