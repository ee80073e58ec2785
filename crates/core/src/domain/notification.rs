use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::lead::LeadId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientRole {
    AssignedAgent,
    SalesManager,
    PostSaleTeam,
}

impl RecipientRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AssignedAgent => "assigned_agent",
            Self::SalesManager => "sales_manager",
            Self::PostSaleTeam => "post_sale_team",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "assigned_agent" => Some(Self::AssignedAgent),
            "sales_manager" => Some(Self::SalesManager),
            "post_sale_team" => Some(Self::PostSaleTeam),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationReason {
    AppointmentBooked,
    AppointmentRescheduled,
    AppointmentCancelled,
    HotLead,
    Complaint,
    PostSaleIssue,
}

impl NotificationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppointmentBooked => "appointment_booked",
            Self::AppointmentRescheduled => "appointment_rescheduled",
            Self::AppointmentCancelled => "appointment_cancelled",
            Self::HotLead => "hot_lead",
            Self::Complaint => "complaint",
            Self::PostSaleIssue => "post_sale_issue",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "appointment_booked" => Some(Self::AppointmentBooked),
            "appointment_rescheduled" => Some(Self::AppointmentRescheduled),
            "appointment_cancelled" => Some(Self::AppointmentCancelled),
            "hot_lead" => Some(Self::HotLead),
            "complaint" => Some(Self::Complaint),
            "post_sale_issue" => Some(Self::PostSaleIssue),
            _ => None,
        }
    }

    /// Urgent reasons skip the cooldown guard.
    pub fn is_urgent(&self) -> bool {
        matches!(self, Self::Complaint | Self::PostSaleIssue)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationKey {
    pub lead_id: LeadId,
    pub recipient_role: RecipientRole,
    pub reason: NotificationReason,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub key: NotificationKey,
    pub last_sent_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffNotification {
    pub lead_id: LeadId,
    pub recipient_role: RecipientRole,
    pub recipient_id: Option<String>,
    pub reason: NotificationReason,
    pub text: String,
}

impl StaffNotification {
    pub fn key(&self) -> NotificationKey {
        NotificationKey {
            lead_id: self.lead_id.clone(),
            recipient_role: self.recipient_role,
            reason: self.reason,
        }
    }
}
