// ⚖️ Haul Allocation Engine - Per-session distribution of after-tax proceeds
//
// For every haul:
//   share_points = organizer (2, if present on this haul)
//                + caller    (2 full / 1 half, unless the caller IS the organizer)
//                + Σ participants (2 full / 1 half)
//   unit         = floor(after_tax / share_points / 1000) × 1000
//   remainder    = after_tax - unit × share_points   → folded into haul tax
//
// Everything handed out is tracked against a running "left to distribute"
// counter per currency. When the haul is done the counter MUST equal the
// remainder; anything else is an AllocationError, never a silent leak.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SettlementConfig;
use crate::entities::{HaulParticipant, LocationTab, ParticipantId, ParticipantRegistry};
use crate::error::{AllocationError, AllocationResult, Currency};
use crate::parser::{ContentInput, HaulInput};
use crate::tax::{round_down, split_with};

/// Return points may drift by float rounding, never by more than this
const RETURN_POINT_TOLERANCE: f64 = 1e-9;

// ============================================================================
// DERIVED TYPES
// ============================================================================

/// A haul after tax, with the unit and remainder it was allocated with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Haul {
    pub index: usize,
    pub location: String,
    pub tab: String,
    pub items_before_tax: i64,
    pub cash_before_tax: i64,
    pub items_after_tax: i64,
    pub cash_after_tax: i64,

    /// Splitter tax plus the allocation remainder
    pub items_tax: i64,
    pub cash_tax: i64,

    /// Fed into the global return pool
    pub returns_from_items: i64,
    pub returns_from_cash: i64,

    pub share_points: i64,
    pub items_unit: i64,
    pub cash_unit: i64,
    pub had_organizer: bool,
    pub caller: Option<HaulParticipant>,
    pub participants: Vec<HaulParticipant>,
}

/// A settled session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub id: u32,
    pub organizer: Option<ParticipantId>,
    pub return_multiplier: f64,
    pub hauls: Vec<Haul>,
    pub items_tax_total: i64,
    pub cash_tax_total: i64,
    pub returns_from_items_total: i64,
    pub returns_from_cash_total: i64,

    /// Union of all haul participants (callers and organizer not included)
    pub participants: Vec<ParticipantId>,
}

impl Content {
    pub fn items_before_tax(&self) -> i64 {
        self.hauls.iter().map(|h| h.items_before_tax).sum()
    }

    pub fn cash_before_tax(&self) -> i64 {
        self.hauls.iter().map(|h| h.cash_before_tax).sum()
    }
}

// ============================================================================
// RETURN MULTIPLIER
// ============================================================================

/// 1.0 for 1-5 participants, 2.0 for 6-10, 3.0 for 11-15, ...
pub fn return_multiplier(participant_count: usize) -> f64 {
    if participant_count <= 5 {
        return 1.0;
    }
    ((participant_count - 1) / 5 + 1) as f64
}

/// Distinct identities touching a session: organizer + callers + participants
pub fn distinct_participant_count(input: &ContentInput) -> usize {
    let mut seen: Vec<&ParticipantId> = Vec::new();
    let callers = input.hauls.iter().filter_map(|h| h.caller.as_ref().map(|c| &c.id));
    let participants = input
        .hauls
        .iter()
        .flat_map(|h| h.participants.iter().map(|p| &p.id));

    for id in input.organizer.iter().chain(callers).chain(participants) {
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen.len()
}

// ============================================================================
// ALLOCATION ENGINE
// ============================================================================

/// Return-point budgets for one haul of a session
#[derive(Debug, Clone, Copy)]
struct HaulBudget {
    participant: f64,
    organizer_caller: f64,
}

pub struct HaulAllocationEngine {
    config: SettlementConfig,
}

impl HaulAllocationEngine {
    pub fn new() -> Self {
        HaulAllocationEngine {
            config: SettlementConfig::default(),
        }
    }

    pub fn with_config(config: &SettlementConfig) -> Self {
        HaulAllocationEngine {
            config: config.clone(),
        }
    }

    /// Allocate every session in order, mutating the shared registry
    pub fn allocate(
        &self,
        contents: &[ContentInput],
        registry: &mut ParticipantRegistry,
    ) -> AllocationResult<Vec<Content>> {
        contents
            .iter()
            .map(|content| self.allocate_session(content, registry))
            .collect()
    }

    /// Allocate one session
    pub fn allocate_session(
        &self,
        input: &ContentInput,
        registry: &mut ParticipantRegistry,
    ) -> AllocationResult<Content> {
        let participant_count = distinct_participant_count(input);

        // Return points only flow through sessions with an organizer
        let multiplier = if input.organizer.is_some() {
            return_multiplier(participant_count)
        } else {
            0.0
        };

        let haul_count = input.hauls.len().max(1) as f64;
        let budget = HaulBudget {
            participant: self.config.participant_return_base * multiplier / haul_count,
            organizer_caller: self.config.organizer_caller_return_base * multiplier / haul_count,
        };

        let mut hauls = Vec::with_capacity(input.hauls.len());
        for (index, haul_input) in input.hauls.iter().enumerate() {
            let haul = self.allocate_haul(input, index, haul_input, budget, registry)?;
            hauls.push(haul);
        }

        let mut participants: Vec<ParticipantId> = Vec::new();
        for participant in hauls.iter().flat_map(|h| h.participants.iter()) {
            if !participants.contains(&participant.id) {
                participants.push(participant.id.clone());
            }
        }

        let content = Content {
            id: input.id,
            organizer: input.organizer.clone(),
            return_multiplier: multiplier,
            items_tax_total: hauls.iter().map(|h| h.items_tax).sum(),
            cash_tax_total: hauls.iter().map(|h| h.cash_tax).sum(),
            returns_from_items_total: hauls.iter().map(|h| h.returns_from_items).sum(),
            returns_from_cash_total: hauls.iter().map(|h| h.returns_from_cash).sum(),
            participants,
            hauls,
        };

        info!(
            session_id = content.id,
            hauls = content.hauls.len(),
            participants = participant_count,
            multiplier,
            items_tax = content.items_tax_total,
            cash_tax = content.cash_tax_total,
            "session allocated"
        );
        Ok(content)
    }

    fn allocate_haul(
        &self,
        session: &ContentInput,
        index: usize,
        input: &HaulInput,
        budget: HaulBudget,
        registry: &mut ParticipantRegistry,
    ) -> AllocationResult<Haul> {
        let items = split_with(input.items_before_tax, &self.config);
        let cash = split_with(input.cash_before_tax, &self.config);

        let organizer = session.organizer.as_ref().filter(|_| input.had_organizer);
        // An organizer who also calls is paid once, as organizer: no caller share or points
        let caller = input
            .caller
            .as_ref()
            .filter(|c| session.organizer.as_ref() != Some(&c.id));

        let share_points = organizer.map(|_| 2).unwrap_or(0)
            + caller.map(|c| c.share.points()).unwrap_or(0)
            + input.participants.iter().map(|p| p.share.points()).sum::<i64>();

        let unit_of = |after_tax: i64| {
            if share_points > 0 {
                round_down(after_tax / share_points, self.config.rounding_unit)
            } else {
                0
            }
        };
        let items_unit = unit_of(items.after_tax);
        let cash_unit = unit_of(cash.after_tax);

        let items_remainder = items.after_tax - items_unit * share_points;
        let cash_remainder = cash.after_tax - cash_unit * share_points;

        let bucket = LocationTab::new(&input.location, &input.tab);
        let mut items_left = items.after_tax;
        let mut cash_left = cash.after_tax;
        let points_before = registry.total_return_points();
        let mut expected_points = 0.0;

        let mut pay = |registry: &mut ParticipantRegistry, id: &ParticipantId, points: i64, return_points: f64| {
            let items_paid = items_unit * points;
            let cash_paid = cash_unit * points;
            let participant = registry.participant_mut(id);
            participant.credit_haul(&bucket, items_paid, cash_paid);
            participant.add_return_points(return_points);
            items_left -= items_paid;
            cash_left -= cash_paid;
        };

        if let Some(organizer) = organizer {
            let points = 2.0 * budget.organizer_caller;
            pay(&mut *registry, organizer, 2, points);
            expected_points += points;
        }

        if let Some(caller) = caller {
            pay(&mut *registry, &caller.id, caller.share.points(), budget.organizer_caller);
            expected_points += budget.organizer_caller;
        }

        for participant in &input.participants {
            pay(&mut *registry, &participant.id, participant.share.points(), budget.participant);
            expected_points += budget.participant;
        }

        if items_left != items_remainder {
            return Err(AllocationError::DistributionMismatch {
                session_id: session.id,
                haul_index: index,
                currency: Currency::Items,
                expected: items_remainder,
                actual: items_left,
            });
        }
        if cash_left != cash_remainder {
            return Err(AllocationError::DistributionMismatch {
                session_id: session.id,
                haul_index: index,
                currency: Currency::Cash,
                expected: cash_remainder,
                actual: cash_left,
            });
        }

        let granted_points = registry.total_return_points() - points_before;
        if (granted_points - expected_points).abs() > RETURN_POINT_TOLERANCE {
            return Err(AllocationError::ReturnPointMismatch {
                session_id: session.id,
                haul_index: index,
                expected: expected_points,
                actual: granted_points,
            });
        }

        debug!(
            session_id = session.id,
            haul_index = index,
            location = %bucket.label(),
            share_points,
            items_unit,
            cash_unit,
            items_remainder,
            cash_remainder,
            "haul allocated"
        );

        Ok(Haul {
            index,
            location: input.location.clone(),
            tab: input.tab.clone(),
            items_before_tax: input.items_before_tax,
            cash_before_tax: input.cash_before_tax,
            items_after_tax: items.after_tax,
            cash_after_tax: cash.after_tax,
            items_tax: items.tax + items_remainder,
            cash_tax: cash.tax + cash_remainder,
            returns_from_items: items.returns,
            returns_from_cash: cash.returns,
            share_points,
            items_unit,
            cash_unit,
            had_organizer: input.had_organizer,
            caller: input.caller.clone(),
            participants: input.participants.clone(),
        })
    }
}

impl Default for HaulAllocationEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::HaulParticipant;
    use proptest::prelude::*;

    fn session(id: u32, organizer: Option<&str>, hauls: Vec<HaulInput>) -> ContentInput {
        ContentInput {
            id,
            organizer: organizer.map(ParticipantId::from_name),
            hauls,
        }
    }

    fn allocate(input: &ContentInput) -> (Content, ParticipantRegistry) {
        let mut registry = ParticipantRegistry::new();
        let content = HaulAllocationEngine::new()
            .allocate_session(input, &mut registry)
            .unwrap();
        (content, registry)
    }

    fn get<'a>(registry: &'a ParticipantRegistry, name: &str) -> &'a crate::entities::Participant {
        registry.find_by_name(name).unwrap()
    }

    #[test]
    fn test_return_multiplier_curve() {
        assert_eq!(return_multiplier(1), 1.0);
        assert_eq!(return_multiplier(3), 1.0);
        assert_eq!(return_multiplier(5), 1.0);
        assert_eq!(return_multiplier(6), 2.0);
        assert_eq!(return_multiplier(10), 2.0);
        assert_eq!(return_multiplier(11), 3.0);
        assert_eq!(return_multiplier(15), 3.0);
        assert_eq!(return_multiplier(16), 4.0);
    }

    #[test]
    fn test_distinct_participant_count() {
        let input = session(
            1,
            Some("lead"),
            vec![
                HaulInput::new(10, 0, "BEACH", "1")
                    .with_caller(HaulParticipant::full("lead"))
                    .with_participant(HaulParticipant::full("a"))
                    .with_participant(HaulParticipant::half("b")),
                HaulInput::new(10, 0, "BEACH", "1")
                    .with_caller(HaulParticipant::full("c"))
                    .with_participant(HaulParticipant::full("a")),
            ],
        );

        // lead, a, b, c
        assert_eq!(distinct_participant_count(&input), 4);
    }

    #[test]
    fn test_two_full_participants_no_organizer() {
        let input = session(
            1,
            None,
            vec![HaulInput::new(10_000, 5_000, "TEST", "1")
                .with_participant(HaulParticipant::full("player1"))
                .with_participant(HaulParticipant::full("player2"))],
        );
        let (content, registry) = allocate(&input);

        let p1 = get(&registry, "player1");
        let p2 = get(&registry, "player2");
        assert_eq!(p1.cash_after_tax, p2.cash_after_tax);
        assert_eq!(p1.cash_after_tax, 2_000);
        assert_eq!(p1.items_after_tax.get("TEST", "1"), 4_000);
        assert_eq!(p2.items_after_tax.get("TEST", "1"), 4_000);
        assert!(content.items_tax_total > 0);
        assert!(content.cash_tax_total > 0);

        // No organizer → no return points
        assert_eq!(content.return_multiplier, 0.0);
        assert_eq!(p1.return_points, 0.0);
    }

    #[test]
    fn test_organizer_matches_full_participant() {
        let input = session(
            1,
            Some("organizer"),
            vec![HaulInput::new(10_000, 5_000, "TEST", "1")
                .with_organizer_present()
                .with_participant(HaulParticipant::full("player1"))],
        );
        let (_, registry) = allocate(&input);

        let organizer = get(&registry, "organizer");
        let player = get(&registry, "player1");
        assert!(organizer.cash_after_tax > 0);
        assert_eq!(organizer.cash_after_tax, player.cash_after_tax);
        assert!(organizer.return_points > 0.0);

        // 2 × 0.25 × multiplier(2) / 1 haul
        assert!((organizer.return_points - 0.5).abs() < 1e-12);
        assert!((player.return_points - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_half_share_gets_half() {
        let input = session(
            1,
            None,
            vec![HaulInput::new(12_000, 6_000, "TEST", "1")
                .with_participant(HaulParticipant::full("fullplayer"))
                .with_participant(HaulParticipant::half("halfplayer"))],
        );
        let (_, registry) = allocate(&input);

        let full = get(&registry, "fullplayer");
        let half = get(&registry, "halfplayer");
        assert!(full.items_after_tax.total() > half.items_after_tax.total());

        let ratio = full.items_after_tax.total() as f64 / half.items_after_tax.total() as f64;
        assert!((1.8..=2.2).contains(&ratio), "ratio was {}", ratio);
    }

    #[test]
    fn test_organizer_absent_from_haul_gets_nothing_there() {
        let input = session(
            1,
            Some("lead"),
            vec![
                HaulInput::new(100_000, 0, "BEACH", "1")
                    .with_organizer_present()
                    .with_participant(HaulParticipant::full("a")),
                HaulInput::new(100_000, 0, "FORT", "2").with_participant(HaulParticipant::full("a")),
            ],
        );
        let (_, registry) = allocate(&input);

        let lead = get(&registry, "lead");
        let a = get(&registry, "a");
        assert_eq!(lead.items_after_tax.get("BEACH", "1"), 40_000);
        assert_eq!(lead.items_after_tax.get("FORT", "2"), 0);
        assert_eq!(a.items_after_tax.get("BEACH", "1"), 40_000);
        assert_eq!(a.items_after_tax.get("FORT", "2"), 80_000);

        // multiplier(2) = 1, two hauls: organizer 2 × 0.125 on one haul only
        assert!((lead.return_points - 0.25).abs() < 1e-12);
        assert!((a.return_points - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_caller_paid_without_organizer_flag() {
        let input = session(
            1,
            Some("lead"),
            vec![HaulInput::new(60_000, 0, "BEACH", "1")
                .with_caller(HaulParticipant::half("shotcaller"))
                .with_participant(HaulParticipant::full("a"))],
        );
        let (content, registry) = allocate(&input);

        // share points: caller 1 + a 2 = 3; 48000 / 3 = 16000
        assert_eq!(content.hauls[0].share_points, 3);
        assert_eq!(content.hauls[0].items_unit, 16_000);

        let caller = get(&registry, "shotcaller");
        assert_eq!(caller.items_after_tax.get("BEACH", "1"), 16_000);
        assert!((caller.return_points - 0.25).abs() < 1e-12);
        assert!(registry.find_by_name("lead").is_none());
    }

    #[test]
    fn test_caller_same_as_organizer_gets_no_extra_share() {
        let input = session(
            1,
            Some("lead"),
            vec![HaulInput::new(40_000, 0, "BEACH", "1")
                .with_organizer_present()
                .with_caller(HaulParticipant::full("LEAD"))
                .with_participant(HaulParticipant::full("a"))],
        );
        let (content, registry) = allocate(&input);

        assert_eq!(content.hauls[0].share_points, 4);
        let lead = get(&registry, "lead");
        assert_eq!(lead.items_after_tax.total(), 16_000);
        assert!((lead.return_points - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_remainder_is_folded_into_tax() {
        // 100000 → after 80000, returns 10000, tax 10000
        // 3 full participants = 6 points; unit = floor(80000/6/1000)*1000 = 13000
        // remainder = 80000 - 78000 = 2000
        let input = session(
            1,
            None,
            vec![HaulInput::new(100_000, 0, "BEACH", "1")
                .with_participant(HaulParticipant::full("a"))
                .with_participant(HaulParticipant::full("b"))
                .with_participant(HaulParticipant::full("c"))],
        );
        let (content, registry) = allocate(&input);

        assert_eq!(content.hauls[0].items_unit, 13_000);
        assert_eq!(content.hauls[0].items_tax, 12_000);
        assert_eq!(content.returns_from_items_total, 10_000);
        assert_eq!(registry.total_items_after_tax(), 78_000);
    }

    #[test]
    fn test_haul_without_share_points_goes_to_tax() {
        let input = session(1, None, vec![HaulInput::new(10_000, 10_000, "BEACH", "1")]);
        let (content, registry) = allocate(&input);

        assert_eq!(content.hauls[0].share_points, 0);
        assert_eq!(content.items_tax_total, 9_000);
        assert_eq!(content.cash_tax_total, 9_000);
        assert_eq!(registry.total_cash_after_tax(), 0);
    }

    #[test]
    fn test_multiplier_scales_with_roster() {
        let mut haul = HaulInput::new(100_000, 0, "BEACH", "1").with_organizer_present();
        for i in 0..6 {
            haul = haul.with_participant(HaulParticipant::full(&format!("p{}", i)));
        }
        // organizer + 6 = 7 distinct → multiplier 2
        let input = session(1, Some("lead"), vec![haul]);
        let (content, registry) = allocate(&input);

        assert_eq!(content.return_multiplier, 2.0);
        assert!((get(&registry, "lead").return_points - 1.0).abs() < 1e-12);
        assert!((get(&registry, "p0").return_points - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_session_participants_union() {
        let input = session(
            3,
            Some("lead"),
            vec![
                HaulInput::new(10_000, 0, "BEACH", "1")
                    .with_caller(HaulParticipant::full("c"))
                    .with_participant(HaulParticipant::full("a")),
                HaulInput::new(10_000, 0, "BEACH", "2")
                    .with_participant(HaulParticipant::full("a"))
                    .with_participant(HaulParticipant::half("b")),
            ],
        );
        let (content, _) = allocate(&input);

        assert_eq!(
            content.participants,
            vec![ParticipantId::from_name("a"), ParticipantId::from_name("b")]
        );
    }

    #[test]
    fn test_allocate_accumulates_across_sessions() {
        let first = session(
            1,
            None,
            vec![HaulInput::new(10_000, 0, "BEACH", "1").with_participant(HaulParticipant::full("a"))],
        );
        let second = session(
            2,
            None,
            vec![HaulInput::new(10_000, 0, "BEACH", "1").with_participant(HaulParticipant::full("a"))],
        );
        let mut registry = ParticipantRegistry::new();
        let contents = HaulAllocationEngine::new()
            .allocate(&[first, second], &mut registry)
            .unwrap();

        assert_eq!(contents.len(), 2);
        assert_eq!(registry.count(), 1);
        assert_eq!(get(&registry, "a").items_after_tax.get("BEACH", "1"), 16_000);
    }

    fn arb_haul() -> impl Strategy<Value = HaulInput> {
        (
            0i64..50_000_000,
            0i64..10_000_000,
            any::<bool>(),
            proptest::option::of((0usize..8, any::<bool>())),
            proptest::collection::vec((0usize..8, any::<bool>()), 0..8),
        )
            .prop_map(|(items, cash, had_organizer, caller, participants)| {
                let share = |full: bool| if full { HaulParticipant::full } else { HaulParticipant::half };
                let mut haul = HaulInput::new(items, cash, "LOC", "1");
                haul.had_organizer = had_organizer;
                haul.caller = caller.map(|(i, full)| share(full)(&format!("p{}", i)));
                for (i, full) in participants {
                    haul.add_participant(share(full)(&format!("p{}", i)));
                }
                haul
            })
    }

    proptest! {
        #[test]
        fn prop_distributed_plus_tax_is_after_tax(
            mut hauls in proptest::collection::vec(arb_haul(), 1..5),
            with_organizer in any::<bool>(),
        ) {
            // One tab per haul so each haul's item payouts land in their own bucket
            for (i, haul) in hauls.iter_mut().enumerate() {
                haul.tab = i.to_string();
            }
            let organizer = if with_organizer { Some("p0") } else { None };
            let input = session(1, organizer, hauls);
            let mut registry = ParticipantRegistry::new();
            let content = HaulAllocationEngine::new()
                .allocate_session(&input, &mut registry)
                .unwrap();
            let config = SettlementConfig::default();

            for haul in &content.hauls {
                let split = split_with(haul.items_before_tax, &config);
                let paid_items: i64 = registry
                    .all()
                    .iter()
                    .map(|p| p.items_after_tax.get(&haul.location, &haul.tab))
                    .sum();
                let items_remainder = haul.items_tax - split.tax;

                prop_assert_eq!(paid_items, haul.items_unit * haul.share_points);
                prop_assert_eq!(paid_items + items_remainder, haul.items_after_tax);
                prop_assert!(items_remainder >= 0);
                prop_assert_eq!(haul.returns_from_items, split.returns);

                let split = split_with(haul.cash_before_tax, &config);
                let cash_remainder = haul.cash_tax - split.tax;
                prop_assert_eq!(haul.cash_unit * haul.share_points + cash_remainder, haul.cash_after_tax);
                prop_assert!(cash_remainder >= 0);
                prop_assert_eq!(haul.returns_from_cash, split.returns);

                prop_assert!(haul.items_unit % 1000 == 0);
                prop_assert!(haul.cash_unit % 1000 == 0);
            }

            let paid_cash: i64 = content.hauls.iter().map(|h| h.cash_unit * h.share_points).sum();
            prop_assert_eq!(registry.total_cash_after_tax(), paid_cash);
        }
    }
}
