// 🎯 Credit Pass - Return points for events and recruitments
//
// No currency moves here: events and recruitments only change how the return
// pool gets split later.

use tracing::{debug, info};

use crate::allocation::return_multiplier;
use crate::config::SettlementConfig;
use crate::entities::ParticipantRegistry;
use crate::parser::{CtaInput, RecruitmentInput};

pub struct CreditEngine {
    config: SettlementConfig,
}

impl CreditEngine {
    pub fn new() -> Self {
        CreditEngine {
            config: SettlementConfig::default(),
        }
    }

    pub fn with_config(config: &SettlementConfig) -> Self {
        CreditEngine {
            config: config.clone(),
        }
    }

    /// Multiplier for an event: the caller counts as a participant, then doubled
    pub fn event_multiplier(&self, event: &CtaInput) -> f64 {
        return_multiplier(event.participants.len() + 1) * self.config.event_multiplier_factor
    }

    /// Credit every event; returns the total points granted
    pub fn credit_events(&self, events: &[CtaInput], registry: &mut ParticipantRegistry) -> f64 {
        let mut granted = 0.0;

        for event in events {
            let multiplier = self.event_multiplier(event);
            let caller_points = self.config.organizer_caller_return_base * multiplier;
            let participant_points = self.config.participant_return_base * multiplier;

            registry.participant_mut(&event.caller).add_return_points(caller_points);
            granted += caller_points;

            for participant in &event.participants {
                registry.participant_mut(participant).add_return_points(participant_points);
                granted += participant_points;
            }

            debug!(
                event_id = event.id,
                caller = %event.caller,
                participants = event.participants.len(),
                multiplier,
                "event credited"
            );
        }

        info!(events = events.len(), points = granted, "event credit pass complete");
        granted
    }

    /// Credit recruitments at their literal value; returns the total
    pub fn credit_recruitments(
        &self,
        recruitments: &[RecruitmentInput],
        registry: &mut ParticipantRegistry,
    ) -> f64 {
        let mut total = 0.0;
        for recruitment in recruitments {
            registry
                .participant_mut(&recruitment.recruiter)
                .add_return_points(recruitment.points);
            total += recruitment.points;
        }

        info!(
            recruitments = recruitments.len(),
            points = total,
            "recruitment credit pass complete"
        );
        total
    }
}

impl Default for CreditEngine {
    fn default() -> Self {
        Self::new()
    }
}
