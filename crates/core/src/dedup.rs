use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::PolicyConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateDecision {
    Allow,
    Suppress,
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Suppresses a message when the same lead got an allowed response less than `window` ago.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DedupPolicy {
    window: Duration,
}

impl DedupPolicy {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn from_config(policy: &PolicyConfig) -> Self {
        let secs = i64::try_from(policy.dedup_window_secs).unwrap_or(i64::MAX);
        Self::new(Duration::seconds(secs))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn check(
        &self,
        last_allowed_at: Option<DateTime<Utc>>,
        arrival: DateTime<Utc>,
    ) -> GateDecision {
        match last_allowed_at {
            Some(last) if arrival >= last && arrival - last < self.window => GateDecision::Suppress,
            // Arrival stamped before the last allowed response: clocks disagree or the
            // channel redelivered late. Either way it is inside the window.
            Some(last) if arrival < last => GateDecision::Suppress,
            _ => GateDecision::Allow,
        }
    }
}

impl Default for DedupPolicy {
    fn default() -> Self {
        Self::from_config(&PolicyConfig::default())
    }
}

/// Stable fingerprint of an inbound message used when the channel omits a message id.
pub fn message_fingerprint(phone: &str, body: &str, sent_at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(phone.trim().as_bytes());
    hasher.update([0u8]);
    hasher.update(body.trim().as_bytes());
    hasher.update([0u8]);
    hasher.update(sent_at.timestamp().to_be_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}
