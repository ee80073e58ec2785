use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::{connect_with_settings, migrations::MIGRATOR, DbPool};

    const MANAGED_TABLES: &[&str] = &[
        "lead",
        "appointment",
        "conversation_turn",
        "resource_delivery",
        "notification_record",
        "processed_message",
    ];

    const MANAGED_INDEXES: &[&str] = &[
        "idx_appointment_one_active",
        "idx_appointment_lead_id",
        "idx_conversation_turn_lead_seq",
        "idx_processed_message_lead_time",
    ];

    async fn object_count(pool: &DbPool, kind: &str, name: &str) -> i64 {
        sqlx::query("SELECT COUNT(*) AS count FROM sqlite_master WHERE type = ? AND name = ?")
            .bind(kind)
            .bind(name)
            .fetch_one(pool)
            .await
            .expect("query sqlite_master")
            .get::<i64, _>("count")
    }

    #[tokio::test]
    async fn migrations_create_baseline_tables() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for table in MANAGED_TABLES {
            assert_eq!(object_count(&pool, "table", table).await, 1, "missing table {table}");
        }
        for index in MANAGED_INDEXES {
            assert_eq!(object_count(&pool, "index", index).await, 1, "missing index {index}");
        }
    }

    #[tokio::test]
    async fn migrations_are_reversible() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        for table in MANAGED_TABLES {
            assert_eq!(object_count(&pool, "table", table).await, 0, "table {table} survived");
        }
    }

    #[tokio::test]
    async fn migrations_up_down_up_preserves_schema_signature() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let initial_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            initial_signature.len(),
            MANAGED_TABLES.len() + MANAGED_INDEXES.len(),
            "initial migration pass should create all managed schema objects",
        );

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");
        assert!(
            managed_schema_signature(&pool).await.is_empty(),
            "managed schema objects should be removed after full undo",
        );

        run_pending(&pool).await.expect("re-run migrations");
        assert_eq!(
            managed_schema_signature(&pool).await,
            initial_signature,
            "up/down/up should preserve migration-managed schema signature",
        );
    }

    async fn managed_schema_signature(pool: &DbPool) -> Vec<(String, String, String)> {
        let mut signature: Vec<(String, String, String)> = sqlx::query(
            "SELECT type, name, IFNULL(sql, '') AS sql
             FROM sqlite_master
             WHERE type IN ('table', 'index')",
        )
        .fetch_all(pool)
        .await
        .expect("load schema objects")
        .into_iter()
        .filter_map(|row| {
            let name = row.get::<String, _>("name");
            let managed = MANAGED_TABLES.contains(&name.as_str())
                || MANAGED_INDEXES.contains(&name.as_str());
            managed.then(|| (row.get::<String, _>("type"), name, row.get::<String, _>("sql")))
        })
        .collect();
        signature.sort();
        signature
    }
}
