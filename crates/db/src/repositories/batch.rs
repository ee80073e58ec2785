use tracing::debug;

use leadflow_core::domain::batch::MutationBatch;

use super::appointment::upsert_appointment;
use super::conversation::{insert_turn, trim_history};
use super::delivery::upsert_delivery;
use super::lead::upsert_lead;
use super::ledger::insert_processed;
use super::notification::upsert_notification;
use super::{MutationStore, RepositoryError};
use crate::DbPool;

pub struct SqlMutationStore {
    pool: DbPool,
}

impl SqlMutationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MutationStore for SqlMutationStore {
    async fn apply_batch(
        &self,
        batch: &MutationBatch,
        conversation_window: usize,
    ) -> Result<(), RepositoryError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        if let Some(lead) = &batch.lead {
            upsert_lead(&mut tx, lead).await?;
        }
        if let Some(message) = &batch.processed_message {
            insert_processed(&mut tx, message).await?;
        }

        // Closing writes go first so a replacement never trips the one-active index.
        let (closing, opening): (Vec<_>, Vec<_>) =
            batch.appointments.iter().partition(|appointment| !appointment.is_active());
        for appointment in closing.into_iter().chain(opening) {
            upsert_appointment(&mut tx, appointment).await?;
        }

        for record in &batch.delivery_records {
            upsert_delivery(&mut tx, record).await?;
        }
        for record in &batch.notification_records {
            upsert_notification(&mut tx, record).await?;
        }

        let mut trimmed = Vec::new();
        for turn in &batch.turns {
            insert_turn(&mut tx, turn).await?;
            if !trimmed.contains(&&turn.lead_id) {
                trimmed.push(&turn.lead_id);
            }
        }
        for lead_id in trimmed {
            trim_history(&mut tx, lead_id, conversation_window).await?;
        }

        tx.commit().await?;

        debug!(
            appointments = batch.appointments.len(),
            deliveries = batch.delivery_records.len(),
            notifications = batch.notification_records.len(),
            turns = batch.turns.len(),
            "mutation batch committed"
        );
        Ok(())
    }
}
