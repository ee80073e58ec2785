use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::lead::LeadId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
    ActionMarker,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::ActionMarker => "action_marker",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "action_marker" => Some(Self::ActionMarker),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub lead_id: LeadId,
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(
        lead_id: LeadId,
        role: TurnRole,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self { lead_id, role, content: content.into(), timestamp }
    }
}

/// Keeps only the most recent `window` turns, oldest first.
pub fn retain_window(turns: &mut Vec<ConversationTurn>, window: usize) {
    if turns.len() > window {
        let overflow = turns.len() - window;
        turns.drain(..overflow);
    }
}
