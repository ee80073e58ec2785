//! Lead score and funnel progression.

use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::domain::intent::IntentKind;
use crate::domain::lead::{FunnelStatus, Lead};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Temperature {
    Cold,
    Warm,
    Hot,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScoreInput<'a> {
    pub lead: &'a Lead,
    pub has_active_appointment: bool,
    pub intent: IntentKind,
    /// Administrative reset: the computed score replaces the prior one even when lower.
    pub admin_reset: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEvaluation {
    pub previous_score: u8,
    pub score: u8,
    pub temperature: Temperature,
    pub target_funnel_status: FunnelStatus,
    pub status_changed: bool,
    /// Set when the score rose by at least the configured jump threshold in this evaluation.
    pub significant_jump: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ScoreEngine {
    config: ScoringConfig,
}

impl ScoreEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn evaluate(&self, input: &ScoreInput<'_>) -> ScoreEvaluation {
        let current = input.lead.funnel_status;
        let target = target_funnel_status(current, input.has_active_appointment);
        let raw = self.raw_score(input, target);

        let previous = input.lead.score.min(100);
        let score = if input.admin_reset { raw } else { previous.max(raw) };
        // A lead that was never scored is measured from first contact, not from zero.
        let jump_from = if current == FunnelStatus::New {
            previous.max(stage_baseline(FunnelStatus::Contacted))
        } else {
            previous
        };
        let significant_jump =
            !input.admin_reset && score.saturating_sub(jump_from) >= self.config.jump_threshold;

        ScoreEvaluation {
            previous_score: previous,
            score,
            temperature: self.temperature(score),
            target_funnel_status: target,
            status_changed: target != current,
            significant_jump,
        }
    }

    pub fn temperature(&self, score: u8) -> Temperature {
        if score >= self.config.hot_threshold {
            Temperature::Hot
        } else if score >= self.config.warm_threshold {
            Temperature::Warm
        } else {
            Temperature::Cold
        }
    }

    fn raw_score(&self, input: &ScoreInput<'_>, status: FunnelStatus) -> u8 {
        let notes = &input.lead.notes;
        let mut total = u32::from(stage_baseline(status));

        if input.has_active_appointment {
            total += u32::from(self.config.appointment_bonus);
        }
        if notes.budget.is_some() {
            total += u32::from(self.config.budget_bonus);
        }
        if notes.monthly_income.is_some() {
            total += u32::from(self.config.income_bonus);
        }
        if notes.needs_financing {
            total += u32::from(self.config.financing_bonus);
        }
        total += u32::from(match input.intent {
            IntentKind::ScheduleVisit
            | IntentKind::ScheduleCallback
            | IntentKind::ConfirmAppointment
            | IntentKind::Reschedule => self.config.visit_intent_bonus,
            IntentKind::PropertyInquiry | IntentKind::RequestResources => {
                self.config.inquiry_intent_bonus
            }
            _ => 0,
        });

        u8::try_from(total.min(100)).unwrap_or(100)
    }
}

fn stage_baseline(status: FunnelStatus) -> u8 {
    match status {
        FunnelStatus::New => 10,
        FunnelStatus::Contacted => 20,
        FunnelStatus::Scheduled => 60,
        FunnelStatus::Visited => 75,
        FunnelStatus::Negotiating => 85,
        FunnelStatus::Reserved => 92,
        FunnelStatus::Sold | FunnelStatus::Delivered => 100,
        FunnelStatus::Lost => 0,
    }
}

/// Funnel status after this message. Only the early stages are advanced here; later stages
/// are set by staff and left untouched.
pub fn target_funnel_status(current: FunnelStatus, has_active_appointment: bool) -> FunnelStatus {
    match current {
        FunnelStatus::New | FunnelStatus::Contacted if has_active_appointment => {
            FunnelStatus::Scheduled
        }
        FunnelStatus::New => FunnelStatus::Contacted,
        other => other,
    }
}
