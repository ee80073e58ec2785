pub mod appointments;
pub mod audit;
pub mod config;
pub mod dedup;
pub mod delivery;
pub mod domain;
pub mod errors;
pub mod extract;
pub mod phase;
pub mod planner;
pub mod scoring;

pub use appointments::{
    decide, AppointmentCommand, BusinessHours, LifecycleContext, LifecycleDecision,
};
pub use dedup::{DedupPolicy, GateDecision};
pub use domain::appointment::{
    Appointment, AppointmentId, AppointmentKind, AppointmentStatus, Slot,
};
pub use domain::batch::{MutationBatch, ProcessedMessage};
pub use domain::catalog::{CatalogEntry, CatalogSnapshot, ResourceLink};
pub use domain::conversation::{ConversationTurn, TurnRole};
pub use domain::delivery::{DeliveryKey, ResourceDeliveryRecord, ResourceType};
pub use domain::intent::{IntentKind, InterpretedIntent};
pub use domain::lead::{FunnelStatus, Lead, LeadId, LeadNotes, PendingClarification};
pub use domain::notification::{
    NotificationKey, NotificationReason, NotificationRecord, RecipientRole, StaffNotification,
};
pub use domain::outbound::OutboundAction;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use phase::{Phase, PhaseAssessment, PushStyle};
pub use scoring::{ScoreEngine, ScoreEvaluation, Temperature};
