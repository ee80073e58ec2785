use thiserror::Error;

use crate::domain::appointment::AppointmentStatus;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid appointment transition from {from:?} to {to:?}")]
    InvalidAppointmentTransition { from: AppointmentStatus, to: AppointmentStatus },
    #[error("requested slot {requested} is outside business hours ({valid_range})")]
    OutsideBusinessHours { requested: String, valid_range: String },
    #[error("requested slot {requested} does not exist or has already passed in local time")]
    UnavailableSlot { requested: String },
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    /// Next-step phrasing shown to the lead instead of raw error text.
    pub fn clarifying_question(&self) -> String {
        match self {
            Self::OutsideBusinessHours { valid_range, .. } => format!(
                "That time is outside our visiting hours ({valid_range}). What other time works for you?"
            ),
            Self::UnavailableSlot { .. } => {
                "That time is no longer available. What other day and time works for you?"
                    .to_owned()
            }
            Self::MissingField("name") => "Before I book it, may I have your name?".to_owned(),
            Self::MissingField("development") => {
                "Which development would you like to visit?".to_owned()
            }
            Self::MissingField("date") | Self::MissingField("time") => {
                "What day and time would work best for you?".to_owned()
            }
            Self::MissingField(_) | Self::InvalidAppointmentTransition { .. } => {
                "Could you tell me a bit more about what you'd like to do?".to_owned()
            }
            Self::InvariantViolation(_) => {
                "Let me check that with the team. Is there anything else I can help with meanwhile?"
                    .to_owned()
            }
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "We could not read that message. Could you send it again with a bit more detail?"
            }
            Self::ServiceUnavailable { .. } => {
                "We are having a brief delay on our side. Could you write again in a few minutes?"
            }
            Self::Internal { .. } => {
                "Something went wrong on our side. An advisor will follow up with you shortly."
            }
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(error) => Self::BadRequest {
                message: error.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Persistence(message) | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::appointment::AppointmentStatus;
    use crate::errors::{ApplicationError, DomainError, InterfaceError};

    #[test]
    fn domain_error_maps_to_bad_request_interface_error() {
        let interface = ApplicationError::from(DomainError::InvalidAppointmentTransition {
            from: AppointmentStatus::Cancelled,
            to: AppointmentStatus::Confirmed,
        })
        .into_interface("msg-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "msg-1"
        ));
    }

    #[test]
    fn user_messages_never_leak_raw_error_text() {
        let interface = ApplicationError::Persistence("database is locked".to_owned())
            .into_interface("msg-2");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert!(!interface.user_message().contains("database"));
        assert_eq!(interface.correlation_id(), "msg-2");
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface = ApplicationError::Configuration("invalid timezone".to_owned())
            .into_interface("msg-3");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
    }

    #[test]
    fn out_of_hours_question_includes_valid_range() {
        let error = DomainError::OutsideBusinessHours {
            requested: "2026-03-10 21:00".to_owned(),
            valid_range: "09:00-19:00".to_owned(),
        };
        let question = error.clarifying_question();
        assert!(question.contains("09:00-19:00"));
        assert!(question.ends_with('?'));
    }

    #[test]
    fn missing_name_asks_for_name() {
        assert!(DomainError::MissingField("name").clarifying_question().contains("name"));
    }
}
