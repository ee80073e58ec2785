//! Per-lead serialization and the inbound de-duplication gate.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use leadflow_core::dedup::{DedupPolicy, GateDecision};
use leadflow_core::domain::lead::LeadId;
use leadflow_db::repositories::MessageLedgerRepository;

/// One async mutex per phone number. Distinct leads never contend.
///
/// An entry lives only while someone holds or waits on it; the last guard out removes it.
#[derive(Clone, Default)]
pub struct LeadLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl LeadLocks {
    pub async fn acquire(&self, phone: &str) -> LeadGuard {
        let lock = self
            .locks
            .entry(phone.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        LeadGuard { guard: Some(guard), phone: phone.to_string(), locks: self.locks.clone() }
    }

    pub fn tracked(&self) -> usize {
        self.locks.len()
    }
}

/// Held for the duration of one lead's processing.
pub struct LeadGuard {
    guard: Option<OwnedMutexGuard<()>>,
    phone: String,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl Drop for LeadGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // The map holds one reference; any other means a waiter already cloned the lock.
        self.locks.remove_if(&self.phone, |_, lock| Arc::strong_count(lock) == 1);
    }
}

pub struct DedupGate {
    policy: DedupPolicy,
    ledger: Arc<dyn MessageLedgerRepository>,
}

impl DedupGate {
    pub fn new(policy: DedupPolicy, ledger: Arc<dyn MessageLedgerRepository>) -> Self {
        Self { policy, ledger }
    }

    pub fn policy(&self) -> DedupPolicy {
        self.policy
    }

    /// Must be called while holding the lead's lock.
    ///
    /// A redelivered message id is always suppressed. Otherwise the lead is suppressed while
    /// its last allowed message is inside the window. Store failures let the message through.
    pub async fn check(
        &self,
        message_id: &str,
        lead_id: Option<&LeadId>,
        arrival: DateTime<Utc>,
    ) -> GateDecision {
        match self.ledger.is_processed(message_id).await {
            Ok(true) => {
                debug!(event_name = "gate.redelivery", message_id, "message id already processed");
                return GateDecision::Suppress;
            }
            Ok(false) => {}
            Err(error) => {
                warn!(
                    event_name = "gate.fail_open",
                    message_id,
                    error = %error,
                    "message ledger lookup failed; allowing message"
                );
                return GateDecision::Allow;
            }
        }

        let Some(lead_id) = lead_id else {
            return GateDecision::Allow;
        };

        match self.ledger.last_processed_at(lead_id).await {
            Ok(last_allowed_at) => self.policy.check(last_allowed_at, arrival),
            Err(error) => {
                warn!(
                    event_name = "gate.fail_open",
                    lead_id = %lead_id.0,
                    error = %error,
                    "last processed lookup failed; allowing message"
                );
                GateDecision::Allow
            }
        }
    }
}
