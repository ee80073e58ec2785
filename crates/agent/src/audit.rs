use tracing::info;

use leadflow_core::audit::{AuditEvent, AuditSink};

/// Production sink: every audit event becomes one structured `tracing` record.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let metadata = serde_json::to_string(&event.metadata).unwrap_or_default();
        info!(
            event_name = %event.event_type,
            event_id = %event.event_id,
            correlation_id = %event.correlation_id,
            lead_id = event.lead_id.as_ref().map(|id| id.0.as_str()).unwrap_or("unknown"),
            category = ?event.category,
            outcome = ?event.outcome,
            actor = %event.actor,
            metadata = %metadata,
            "audit event"
        );
    }
}
