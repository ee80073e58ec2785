use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use leadflow_core::domain::appointment::{Appointment, AppointmentId, AppointmentKind};
use leadflow_core::domain::batch::MutationBatch;
use leadflow_core::domain::conversation::ConversationTurn;
use leadflow_core::domain::delivery::{DeliveryKey, ResourceDeliveryRecord};
use leadflow_core::domain::lead::{Lead, LeadId};
use leadflow_core::domain::notification::{NotificationKey, NotificationRecord};

use crate::DbPool;

mod codec;

pub mod appointment;
pub mod batch;
pub mod conversation;
pub mod delivery;
pub mod lead;
pub mod ledger;
pub mod memory;
pub mod notification;

pub use appointment::SqlAppointmentRepository;
pub use batch::SqlMutationStore;
pub use conversation::SqlConversationRepository;
pub use delivery::SqlDeliveryRepository;
pub use lead::SqlLeadRepository;
pub use ledger::SqlMessageLedgerRepository;
pub use memory::InMemoryStore;
pub use notification::SqlNotificationRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("conflicting write: {0}")]
    Conflict(String),
}

impl RepositoryError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn find_by_id(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError>;
    async fn find_by_phone(&self, phone: &str) -> Result<Option<Lead>, RepositoryError>;
    async fn save(&self, lead: Lead) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn find_by_id(&self, id: &AppointmentId)
        -> Result<Option<Appointment>, RepositoryError>;

    /// The scheduled or confirmed appointment of `kind`, if any.
    async fn find_active(
        &self,
        lead_id: &LeadId,
        kind: AppointmentKind,
    ) -> Result<Option<Appointment>, RepositoryError>;

    async fn list_for_lead(&self, lead_id: &LeadId) -> Result<Vec<Appointment>, RepositoryError>;

    async fn list_sync_pending(&self) -> Result<Vec<Appointment>, RepositoryError>;

    /// Upsert. A second active appointment for the same `(lead, kind)` is a `Conflict`.
    async fn save(&self, appointment: Appointment) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Appends and trims the lead's history to the most recent `window` turns.
    async fn append(&self, turn: ConversationTurn, window: usize) -> Result<(), RepositoryError>;

    /// Most recent turns, oldest first.
    async fn recent(
        &self,
        lead_id: &LeadId,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, RepositoryError>;
}

#[async_trait]
pub trait DeliveryRepository: Send + Sync {
    async fn find(
        &self,
        key: &DeliveryKey,
    ) -> Result<Option<ResourceDeliveryRecord>, RepositoryError>;

    async fn list_for_lead(
        &self,
        lead_id: &LeadId,
    ) -> Result<Vec<ResourceDeliveryRecord>, RepositoryError>;

    /// Idempotent per key; a repeat only refreshes `delivered_at`.
    async fn record(&self, record: ResourceDeliveryRecord) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn find(
        &self,
        key: &NotificationKey,
    ) -> Result<Option<NotificationRecord>, RepositoryError>;

    async fn save(&self, record: NotificationRecord) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait MessageLedgerRepository: Send + Sync {
    async fn is_processed(&self, message_id: &str) -> Result<bool, RepositoryError>;

    /// When the lead last had a message allowed through the gate.
    async fn last_processed_at(
        &self,
        lead_id: &LeadId,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError>;
}

#[async_trait]
pub trait MutationStore: Send + Sync {
    /// Applies every change in `batch` in one transaction, trimming conversation history to
    /// `conversation_window` turns per lead.
    async fn apply_batch(
        &self,
        batch: &MutationBatch,
        conversation_window: usize,
    ) -> Result<(), RepositoryError>;
}

/// Every repository behind one cloneable handle.
#[derive(Clone)]
pub struct Stores {
    pub leads: Arc<dyn LeadRepository>,
    pub appointments: Arc<dyn AppointmentRepository>,
    pub conversations: Arc<dyn ConversationRepository>,
    pub deliveries: Arc<dyn DeliveryRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub ledger: Arc<dyn MessageLedgerRepository>,
    pub mutations: Arc<dyn MutationStore>,
}

impl Stores {
    pub fn sql(pool: DbPool) -> Self {
        Self {
            leads: Arc::new(SqlLeadRepository::new(pool.clone())),
            appointments: Arc::new(SqlAppointmentRepository::new(pool.clone())),
            conversations: Arc::new(SqlConversationRepository::new(pool.clone())),
            deliveries: Arc::new(SqlDeliveryRepository::new(pool.clone())),
            notifications: Arc::new(SqlNotificationRepository::new(pool.clone())),
            ledger: Arc::new(SqlMessageLedgerRepository::new(pool.clone())),
            mutations: Arc::new(SqlMutationStore::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        Self::from_memory(InMemoryStore::default())
    }

    /// Wraps an existing in-memory store so tests can keep a handle for inspection.
    pub fn from_memory(store: InMemoryStore) -> Self {
        Self {
            leads: Arc::new(store.clone()),
            appointments: Arc::new(store.clone()),
            conversations: Arc::new(store.clone()),
            deliveries: Arc::new(store.clone()),
            notifications: Arc::new(store.clone()),
            ledger: Arc::new(store.clone()),
            mutations: Arc::new(store),
        }
    }
}
