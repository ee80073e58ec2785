use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::appointment::AppointmentKind;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeadId(pub String);

impl LeadId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunnelStatus {
    New,
    Contacted,
    Scheduled,
    Visited,
    Negotiating,
    Reserved,
    Sold,
    Delivered,
    Lost,
}

impl FunnelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::Scheduled => "scheduled",
            Self::Visited => "visited",
            Self::Negotiating => "negotiating",
            Self::Reserved => "reserved",
            Self::Sold => "sold",
            Self::Delivered => "delivered",
            Self::Lost => "lost",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "new" => Some(Self::New),
            "contacted" => Some(Self::Contacted),
            "scheduled" => Some(Self::Scheduled),
            "visited" => Some(Self::Visited),
            "negotiating" => Some(Self::Negotiating),
            "reserved" => Some(Self::Reserved),
            "sold" => Some(Self::Sold),
            "delivered" => Some(Self::Delivered),
            "lost" => Some(Self::Lost),
            _ => None,
        }
    }

    /// Position along the sales funnel. `Lost` sits outside the progression.
    pub fn rank(&self) -> u8 {
        match self {
            Self::New => 0,
            Self::Contacted => 1,
            Self::Scheduled => 2,
            Self::Visited => 3,
            Self::Negotiating => 4,
            Self::Reserved => 5,
            Self::Sold => 6,
            Self::Delivered => 7,
            Self::Lost => u8::MAX,
        }
    }

    pub fn is_post_visit(&self) -> bool {
        matches!(
            self,
            Self::Visited
                | Self::Negotiating
                | Self::Reserved
                | Self::Sold
                | Self::Delivered
                | Self::Lost
        )
    }
}

/// What the agent is currently waiting on from the lead.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingClarification {
    #[default]
    None,
    Name,
    Development,
    DateTime,
    BusinessHours,
}

impl PendingClarification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Name => "name",
            Self::Development => "development",
            Self::DateTime => "date_time",
            Self::BusinessHours => "business_hours",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(Self::None),
            "name" => Some(Self::Name),
            "development" => Some(Self::Development),
            "date_time" => Some(Self::DateTime),
            "business_hours" => Some(Self::BusinessHours),
            _ => None,
        }
    }
}

/// A booking paused on a clarifying question, kept until the answer completes it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub kind: AppointmentKind,
    pub development: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadNotes {
    pub last_response_time: Option<DateTime<Utc>>,
    pub budget: Option<Decimal>,
    pub monthly_income: Option<Decimal>,
    pub bedrooms: Option<u8>,
    pub needs_financing: bool,
    #[serde(default)]
    pub preferences: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub phone: String,
    pub name: Option<String>,
    pub score: u8,
    pub funnel_status: FunnelStatus,
    pub property_interest: Vec<String>,
    pub notes: LeadNotes,
    pub resources_sent_for: BTreeSet<String>,
    pub name_ask_count: u8,
    pub pending_clarification: PendingClarification,
    #[serde(default)]
    pub pending_request: Option<PendingRequest>,
    pub assigned_agent_id: Option<String>,
    pub message_count: u32,
    pub created_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
}

impl Lead {
    pub fn new(phone: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: LeadId::generate(),
            phone: phone.into(),
            name: None,
            score: 0,
            funnel_status: FunnelStatus::New,
            property_interest: Vec::new(),
            notes: LeadNotes::default(),
            resources_sent_for: BTreeSet::new(),
            name_ask_count: 0,
            pending_clarification: PendingClarification::None,
            pending_request: None,
            assigned_agent_id: None,
            message_count: 0,
            created_at: now,
            last_message_at: now,
        }
    }

    /// The lead's name, unless it is missing or a placeholder.
    pub fn resolved_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !is_placeholder_name(name))
    }

    pub fn has_property_interest(&self) -> bool {
        self.property_interest.iter().any(|interest| !interest.trim().is_empty())
    }

    pub fn has_budget(&self) -> bool {
        self.notes.budget.is_some()
    }

    pub fn has_bedroom_count(&self) -> bool {
        self.notes.bedrooms.is_some()
    }

    pub fn add_property_interest(&mut self, development: &str) {
        let exists = self
            .property_interest
            .iter()
            .any(|interest| interest.eq_ignore_ascii_case(development));
        if !exists {
            self.property_interest.push(development.to_string());
        }
    }
}

const PLACEHOLDER_NAMES: &[&str] = &[
    "cliente",
    "client",
    "customer",
    "lead",
    "prospecto",
    "usuario",
    "user",
    "unknown",
    "desconocido",
    "sin nombre",
    "no name",
    "n/a",
    "na",
    "whatsapp user",
];

/// Returns true for names a channel or upstream system fills in when the real name is unknown.
pub fn is_placeholder_name(name: &str) -> bool {
    let trimmed = name.trim();
    if trimmed.chars().count() < 2 {
        return true;
    }
    if !trimmed.chars().any(char::is_alphabetic) {
        return true;
    }
    if trimmed.contains('@') || trimmed.starts_with('+') {
        return true;
    }
    let lowered = trimmed.to_lowercase();
    PLACEHOLDER_NAMES.contains(&lowered.as_str())
}
