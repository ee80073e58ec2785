//! Execution stage: transmits the decided actions in order.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use leadflow_core::delivery::PlannedDelivery;
use leadflow_core::domain::outbound::OutboundAction;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("channel rejected message: {0}")]
pub struct ChannelError(pub String);

#[async_trait]
pub trait MessageChannel: Send + Sync {
    async fn send(&self, phone: &str, action: &OutboundAction) -> Result<(), ChannelError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: Vec<OutboundAction>,
    pub failed: Vec<(OutboundAction, ChannelError)>,
    /// Planned attachments the channel accepted.
    pub delivered: Vec<PlannedDelivery>,
}

pub struct Dispatcher;

impl Dispatcher {
    /// Sends every action even after a failure; later texts do not depend on earlier ones.
    pub async fn dispatch(
        channel: &dyn MessageChannel,
        phone: &str,
        actions: &[OutboundAction],
        planned: &[PlannedDelivery],
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        for action in actions {
            match channel.send(phone, action).await {
                Ok(()) => {
                    for delivery in planned {
                        if &delivery.to_action() == action && !report.delivered.contains(delivery) {
                            report.delivered.push(delivery.clone());
                        }
                    }
                    report.sent.push(action.clone());
                }
                Err(error) => {
                    warn!(event_name = "dispatch.failed", error = %error, "outbound action not sent");
                    report.failed.push((action.clone(), error));
                }
            }
        }
        report
    }
}

#[derive(Default)]
struct ChannelLog {
    sent: Vec<(String, OutboundAction)>,
    reject_attachments: bool,
}

/// Accepts everything and keeps it, unless told to reject attachments.
#[derive(Clone, Default)]
pub struct RecordingChannel {
    log: Arc<Mutex<ChannelLog>>,
}

impl RecordingChannel {
    pub fn rejecting_attachments() -> Self {
        let channel = Self::default();
        channel.with_log(|log| log.reject_attachments = true);
        channel
    }

    pub fn sent(&self) -> Vec<(String, OutboundAction)> {
        self.with_log(|log| log.sent.clone())
    }

    fn with_log<T>(&self, f: impl FnOnce(&mut ChannelLog) -> T) -> T {
        match self.log.lock() {
            Ok(mut log) => f(&mut log),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

#[async_trait]
impl MessageChannel for RecordingChannel {
    async fn send(&self, phone: &str, action: &OutboundAction) -> Result<(), ChannelError> {
        self.with_log(|log| {
            if log.reject_attachments && matches!(action, OutboundAction::Attachment { .. }) {
                return Err(ChannelError("attachment too large".to_string()));
            }
            log.sent.push((phone.to_string(), action.clone()));
            Ok(())
        })
    }
}
