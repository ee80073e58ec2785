use sqlx::{Row, SqliteConnection};

use leadflow_core::domain::conversation::{ConversationTurn, TurnRole};
use leadflow_core::domain::lead::LeadId;

use super::codec::{encode_timestamp, map_write_error, parse_enum, parse_timestamp};
use super::{ConversationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlConversationRepository {
    pool: DbPool,
}

impl SqlConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ConversationRepository for SqlConversationRepository {
    async fn append(&self, turn: ConversationTurn, window: usize) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        insert_turn(&mut tx, &turn).await?;
        trim_history(&mut tx, &turn.lead_id, window).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn recent(
        &self,
        lead_id: &LeadId,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT lead_id, role, content, timestamp
             FROM conversation_turn
             WHERE lead_id = ?
             ORDER BY seq DESC
             LIMIT ?",
        )
        .bind(&lead_id.0)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let mut turns = rows
            .into_iter()
            .map(|row| {
                let role_raw = row.try_get::<String, _>("role")?;
                Ok(ConversationTurn {
                    lead_id: LeadId(row.try_get("lead_id")?),
                    role: parse_enum("turn role", &role_raw, TurnRole::parse)?,
                    content: row.try_get("content")?,
                    timestamp: parse_timestamp("timestamp", row.try_get("timestamp")?)?,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;
        turns.reverse();
        Ok(turns)
    }
}

pub(crate) async fn insert_turn(
    conn: &mut SqliteConnection,
    turn: &ConversationTurn,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO conversation_turn (lead_id, role, content, timestamp) VALUES (?, ?, ?, ?)",
    )
    .bind(&turn.lead_id.0)
    .bind(turn.role.as_str())
    .bind(&turn.content)
    .bind(encode_timestamp(turn.timestamp))
    .execute(&mut *conn)
    .await
    .map_err(|error| map_write_error(error, "conversation turn"))?;
    Ok(())
}

/// Deletes everything but the newest `window` turns for the lead.
pub(crate) async fn trim_history(
    conn: &mut SqliteConnection,
    lead_id: &LeadId,
    window: usize,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "DELETE FROM conversation_turn
         WHERE lead_id = ?
           AND seq NOT IN (
               SELECT seq FROM conversation_turn
               WHERE lead_id = ?
               ORDER BY seq DESC
               LIMIT ?
           )",
    )
    .bind(&lead_id.0)
    .bind(&lead_id.0)
    .bind(i64::try_from(window).unwrap_or(i64::MAX))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use leadflow_core::domain::conversation::{ConversationTurn, TurnRole};
    use leadflow_core::domain::lead::Lead;

    use super::SqlConversationRepository;
    use crate::repositories::{ConversationRepository, LeadRepository, SqlLeadRepository};
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn history_is_trimmed_to_window_and_returned_oldest_first() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let lead = Lead::new("+5215550001111", Utc::now());
        SqlLeadRepository::new(pool.clone()).save(lead.clone()).await.expect("lead");
        let repo = SqlConversationRepository::new(pool);

        let start = Utc::now();
        for index in 0..6 {
            let role = if index % 2 == 0 { TurnRole::User } else { TurnRole::Assistant };
            let turn = ConversationTurn::new(
                lead.id.clone(),
                role,
                format!("turn {index}"),
                start + Duration::seconds(index),
            );
            repo.append(turn, 4).await.expect("append");
        }

        let turns = repo.recent(&lead.id, 10).await.expect("recent");
        let contents = turns.iter().map(|turn| turn.content.as_str()).collect::<Vec<_>>();
        assert_eq!(contents, vec!["turn 2", "turn 3", "turn 4", "turn 5"]);

        let last_two = repo.recent(&lead.id, 2).await.expect("recent two");
        assert_eq!(last_two[0].content, "turn 4");
        assert_eq!(last_two[1].role, TurnRole::Assistant);
    }
}
