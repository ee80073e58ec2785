//! Conversational phase derived from funnel status and lead signals.
//!
//! Rules are evaluated top to bottom and the first match wins.

use serde::{Deserialize, Serialize};

use crate::domain::lead::{FunnelStatus, Lead};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Discovery,
    Qualification,
    Presentation,
    Closing,
    ClosingHasAppointment,
    Nurturing,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::Qualification => "qualification",
            Self::Presentation => "presentation",
            Self::Closing => "closing",
            Self::ClosingHasAppointment => "closing_has_appointment",
            Self::Nurturing => "nurturing",
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            Self::Discovery => 1,
            Self::Qualification => 2,
            Self::Presentation => 3,
            Self::Closing | Self::ClosingHasAppointment => 4,
            Self::Nurturing => 5,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushStyle {
    None,
    Soft,
    Full,
    Gentle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseSignals {
    pub funnel_status: FunnelStatus,
    pub score: u8,
    pub message_count: u32,
    pub has_name: bool,
    pub has_property_interest: bool,
    pub has_budget: bool,
    pub has_bedroom_count: bool,
    pub has_active_appointment: bool,
}

impl PhaseSignals {
    pub fn from_lead(lead: &Lead, has_active_appointment: bool) -> Self {
        Self {
            funnel_status: lead.funnel_status,
            score: lead.score,
            message_count: lead.message_count,
            has_name: lead.resolved_name().is_some(),
            has_property_interest: lead.has_property_interest(),
            has_budget: lead.has_budget(),
            has_bedroom_count: lead.has_bedroom_count(),
            has_active_appointment,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseAssessment {
    pub phase: Phase,
    pub phase_number: u8,
    pub allow_push_to_appointment: bool,
    pub push_style: PushStyle,
}

impl PhaseAssessment {
    fn new(phase: Phase, allow_push_to_appointment: bool, push_style: PushStyle) -> Self {
        Self { phase, phase_number: phase.number(), allow_push_to_appointment, push_style }
    }
}

pub fn classify(signals: &PhaseSignals) -> PhaseAssessment {
    if signals.funnel_status.is_post_visit() {
        let visited = signals.funnel_status == FunnelStatus::Visited;
        let style = if visited { PushStyle::Soft } else { PushStyle::None };
        return PhaseAssessment::new(Phase::Nurturing, visited, style);
    }

    if signals.has_active_appointment || signals.funnel_status == FunnelStatus::Scheduled {
        // Only confirmation reminders from here on.
        return PhaseAssessment::new(Phase::ClosingHasAppointment, false, PushStyle::Gentle);
    }

    if signals.has_property_interest {
        let qualified = signals.score >= 40
            || (signals.has_budget && signals.has_bedroom_count)
            || signals.message_count > 7;
        if qualified {
            return PhaseAssessment::new(Phase::Closing, true, PushStyle::Full);
        }
        return PhaseAssessment::new(Phase::Presentation, true, PushStyle::Soft);
    }

    if signals.message_count >= 3
        || (signals.has_name && (signals.has_bedroom_count || signals.has_budget))
    {
        return PhaseAssessment::new(Phase::Qualification, false, PushStyle::None);
    }

    PhaseAssessment::new(Phase::Discovery, false, PushStyle::None)
}

#[cfg(test)]
mod tests {
    use super::{classify, Phase, PhaseSignals, PushStyle};
    use crate::domain::lead::FunnelStatus;

    fn signals(funnel_status: FunnelStatus) -> PhaseSignals {
        PhaseSignals {
            funnel_status,
            score: 0,
            message_count: 0,
            has_name: false,
            has_property_interest: false,
            has_budget: false,
            has_bedroom_count: false,
            has_active_appointment: false,
        }
    }

    #[test]
    fn visited_is_always_soft_nurturing_regardless_of_score() {
        for score in [0, 39, 40, 70, 100] {
            let mut input = signals(FunnelStatus::Visited);
            input.score = score;
            input.has_active_appointment = true;
            input.has_property_interest = true;

            let result = classify(&input);
            assert_eq!(result.phase, Phase::Nurturing);
            assert_eq!(result.phase_number, 5);
            assert!(result.allow_push_to_appointment);
            assert_eq!(result.push_style, PushStyle::Soft);
        }
    }

    #[test]
    fn other_post_visit_statuses_do_not_push() {
        for status in [FunnelStatus::Negotiating, FunnelStatus::Sold, FunnelStatus::Lost] {
            let result = classify(&signals(status));
            assert_eq!(result.phase, Phase::Nurturing);
            assert!(!result.allow_push_to_appointment);
            assert_eq!(result.push_style, PushStyle::None);
        }
    }

    #[test]
    fn active_appointment_wins_over_interest() {
        let mut input = signals(FunnelStatus::Contacted);
        input.has_active_appointment = true;
        input.has_property_interest = true;
        input.score = 80;

        let result = classify(&input);
        assert_eq!(result.phase, Phase::ClosingHasAppointment);
        assert_eq!(result.phase_number, 4);
        assert!(!result.allow_push_to_appointment);
        assert_eq!(result.push_style, PushStyle::Gentle);
    }

    #[test]
    fn interest_with_budget_and_bedrooms_is_closing() {
        let mut input = signals(FunnelStatus::Contacted);
        input.has_property_interest = true;
        assert_eq!(classify(&input).phase, Phase::Presentation);

        input.has_budget = true;
        input.has_bedroom_count = true;
        let result = classify(&input);
        assert_eq!(result.phase, Phase::Closing);
        assert_eq!(result.push_style, PushStyle::Full);
    }

    #[test]
    fn long_conversations_with_interest_are_closing() {
        let mut input = signals(FunnelStatus::Contacted);
        input.has_property_interest = true;
        input.message_count = 7;
        assert_eq!(classify(&input).phase, Phase::Presentation);
        input.message_count = 8;
        assert_eq!(classify(&input).phase, Phase::Closing);
    }

    #[test]
    fn qualification_and_discovery() {
        let mut input = signals(FunnelStatus::New);
        assert_eq!(classify(&input).phase, Phase::Discovery);

        input.has_name = true;
        input.has_budget = true;
        assert_eq!(classify(&input).phase, Phase::Qualification);

        let mut chatty = signals(FunnelStatus::New);
        chatty.message_count = 3;
        let result = classify(&chatty);
        assert_eq!(result.phase, Phase::Qualification);
        assert_eq!(result.phase_number, 2);
        assert!(!result.allow_push_to_appointment);
    }
}
