//! Leadflow agent: the I/O side of the sales-conversation core.
//!
//! `leadflow-core` decides; this crate fetches fresh state under a per-lead lock, talks to
//! the calendar and staff-notification services, transmits replies and persists one
//! mutation batch per message.
//!
//! # Flow
//!
//! 1. **Gate** (`gate`) - per-phone lock, redelivery and rate-window suppression
//! 2. **Plan** (`leadflow_core::planner`) - extracted fields merged into a lead snapshot
//! 3. **Appointments** (`appointments`, `sync`) - lifecycle decision, calendar sync
//! 4. **Score and phase** (`leadflow_core::scoring`, `leadflow_core::phase`)
//! 5. **Deliveries** (`delivery`) - which resources go out this turn
//! 6. **Persist** - one `MutationBatch`, applied atomically
//! 7. **Dispatch** (`dispatch`) - transmission, then delivery records
//!
//! `orchestrator::Orchestrator` wires the steps together.

pub mod appointments;
pub mod audit;
pub mod calendar;
pub mod delivery;
pub mod dispatch;
pub mod gate;
pub mod notify;
pub mod orchestrator;
pub mod sync;

pub use audit::TracingAuditSink;
pub use calendar::{CalendarProvider, HttpCalendar, InMemoryCalendar, NoopCalendar};
pub use dispatch::{MessageChannel, RecordingChannel};
pub use notify::{InMemoryNotifier, NoopNotifier, StaffNotifier, WebhookNotifier};
pub use orchestrator::{InboundMessage, Orchestrator, TurnOutcome, TurnRequest, TurnStatus};
