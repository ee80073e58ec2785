use serde::{Deserialize, Serialize};

use crate::domain::delivery::ResourceType;

/// One message the host must transmit to the lead, in order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundAction {
    Text {
        body: String,
    },
    Attachment {
        /// `None` for the generic informational asset.
        development: Option<String>,
        resource_type: ResourceType,
        url: String,
    },
}

impl OutboundAction {
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text { body: body.into() }
    }
}
