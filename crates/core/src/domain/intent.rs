use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::appointment::AppointmentKind;

/// Intent labels produced by the external language-understanding service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Greeting,
    PropertyInquiry,
    ProvideInfo,
    ScheduleVisit,
    ScheduleCallback,
    ConfirmAppointment,
    Reschedule,
    Cancel,
    AppointmentInfo,
    RequestResources,
    Complaint,
    PostSaleIssue,
    #[serde(other)]
    Unknown,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::PropertyInquiry => "property_inquiry",
            Self::ProvideInfo => "provide_info",
            Self::ScheduleVisit => "schedule_visit",
            Self::ScheduleCallback => "schedule_callback",
            Self::ConfirmAppointment => "confirm_appointment",
            Self::Reschedule => "reschedule",
            Self::Cancel => "cancel",
            Self::AppointmentInfo => "appointment_info",
            Self::RequestResources => "request_resources",
            Self::Complaint => "complaint",
            Self::PostSaleIssue => "post_sale_issue",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_appointment_operation(&self) -> bool {
        matches!(
            self,
            Self::ScheduleVisit
                | Self::ScheduleCallback
                | Self::ConfirmAppointment
                | Self::Reschedule
                | Self::Cancel
                | Self::AppointmentInfo
        )
    }
}

/// Best-effort structured interpretation of one inbound message.
///
/// Nothing in here is trusted blindly: names, dates, times and development names are
/// re-validated by the extractor chain before they influence a decision.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpretedIntent {
    pub intent: IntentKind,
    #[serde(default)]
    pub extracted_fields: BTreeMap<String, String>,
    #[serde(default)]
    pub requested_resources: Vec<String>,
    #[serde(default)]
    pub explicit_resource_request: bool,
    #[serde(default)]
    pub appointment_kind: Option<AppointmentKind>,
    #[serde(default)]
    pub detected_language: Option<String>,
}

impl Default for IntentKind {
    fn default() -> Self {
        Self::Unknown
    }
}

impl InterpretedIntent {
    pub fn new(intent: IntentKind) -> Self {
        Self { intent, ..Self::default() }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extracted_fields.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.extracted_fields.get(key).map(String::as_str).filter(|value| !value.trim().is_empty())
    }

    /// The appointment kind this intent targets. Callbacks must be named explicitly.
    pub fn target_kind(&self) -> AppointmentKind {
        match (self.intent, self.appointment_kind) {
            (IntentKind::ScheduleCallback, _) => AppointmentKind::Callback,
            (_, Some(kind)) => kind,
            _ => AppointmentKind::Visit,
        }
    }
}
