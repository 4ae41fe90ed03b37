// ⚖️ Settlement Reconciliation - Validate every unit of input is accounted for
//
// Per currency:
//   gross input = payouts + returns received + tax total + undistributed pool
//
// Amounts are integers, so the check is exact. Anything off by even one unit
// means the pipeline leaked or invented value.

use serde::{Deserialize, Serialize};

use crate::error::Currency;
use crate::payroll::Payroll;

// ============================================================================
// RECONCILIATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReconciliationResult {
    /// Every unit of gross input ended up somewhere
    Balanced {
        gross: i64,
        payouts: i64,
        returns_received: i64,
        tax: i64,
        undistributed: i64,
    },

    /// Gross input and accounted total differ
    Discrepancy {
        expected: i64,
        actual: i64,
        difference: i64,
    },
}

impl ReconciliationResult {
    pub fn is_balanced(&self) -> bool {
        matches!(self, ReconciliationResult::Balanced { .. })
    }

    pub fn has_discrepancy(&self) -> bool {
        !self.is_balanced()
    }

    pub fn difference(&self) -> i64 {
        match self {
            ReconciliationResult::Balanced { .. } => 0,
            ReconciliationResult::Discrepancy { difference, .. } => *difference,
        }
    }
}

// ============================================================================
// SETTLEMENT REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyReconciliation {
    pub currency: Currency,
    pub result: ReconciliationResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementReport {
    pub items: CurrencyReconciliation,
    pub cash: CurrencyReconciliation,
    pub session_count: usize,
    pub participant_count: usize,
    pub reconciled_at: chrono::DateTime<chrono::Utc>,
}

impl SettlementReport {
    pub fn is_balanced(&self) -> bool {
        self.items.result.is_balanced() && self.cash.result.is_balanced()
    }

    pub fn result(&self, currency: Currency) -> &ReconciliationResult {
        match currency {
            Currency::Items => &self.items.result,
            Currency::Cash => &self.cash.result,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Reconciliation of {} sessions, {} participants: items {}, cash {}",
            self.session_count,
            self.participant_count,
            describe(&self.items.result),
            describe(&self.cash.result),
        )
    }
}

fn describe(result: &ReconciliationResult) -> String {
    match result {
        ReconciliationResult::Balanced { gross, .. } => format!("balanced at {}", gross),
        ReconciliationResult::Discrepancy {
            expected, actual, difference,
        } => format!("expected {}, accounted {}, off by {}", expected, actual, difference),
    }
}

// ============================================================================
// RECONCILER
// ============================================================================

pub struct SettlementReconciler;

impl SettlementReconciler {
    pub fn new() -> Self {
        SettlementReconciler
    }

    /// Check both currencies of a settled payroll
    pub fn reconcile(&self, payroll: &Payroll) -> SettlementReport {
        SettlementReport {
            items: self.reconcile_currency(payroll, Currency::Items),
            cash: self.reconcile_currency(payroll, Currency::Cash),
            session_count: payroll.contents.len(),
            participant_count: payroll.participants.count(),
            reconciled_at: chrono::Utc::now(),
        }
    }

    pub fn reconcile_currency(&self, payroll: &Payroll, currency: Currency) -> CurrencyReconciliation {
        let gross = payroll.gross(currency);
        let payouts = payroll.payouts(currency);
        let returns_received = payroll.returns_received(currency);
        let tax = payroll.tax_total(currency);
        let undistributed = payroll.undistributed(currency);

        let accounted = payouts + returns_received + tax + undistributed;

        let result = if accounted == gross {
            ReconciliationResult::Balanced {
                gross,
                payouts,
                returns_received,
                tax,
                undistributed,
            }
        } else {
            ReconciliationResult::Discrepancy {
                expected: gross,
                actual: accounted,
                difference: accounted - gross,
            }
        };

        CurrencyReconciliation { currency, result }
    }
}

impl Default for SettlementReconciler {
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
    use crate::config::SettlementConfig;
    use crate::parser::parse_payroll_input;
    use crate::payroll::calculate_payroll;
    use proptest::prelude::*;

    fn create_test_payroll(lines: &[&str]) -> Payroll {
        calculate_payroll(parse_payroll_input(lines), &SettlementConfig::default()).unwrap()
    }

    #[test]
    fn test_reconciliation_balanced() {
        let payroll = create_test_payroll(&[
            "KONTENTY:",
            "1: Orzech",
            "  1: 1234, 567, BEACH, 1, TAK, karoll, smokq, juri(50%)",
            "  2: 40, 0, FORT, 2, nie, , smokq",
            "2:",
            "  1: 77, 13, CAVE, A, NIE, juri, a, b(50%)",
            "CTA:",
            "1: karoll - smokq, juri, kacper17",
            "REKRUTACJA:",
            "kacper17: 6",
        ]);

        let report = SettlementReconciler::new().reconcile(&payroll);

        assert!(report.is_balanced(), "{}", report.summary());
        assert_eq!(report.session_count, 2);
        assert!(matches!(
            report.result(Currency::Items),
            ReconciliationResult::Balanced { gross: 1_351_000, .. }
        ));

        println!("✅ Test passed: {}", report.summary());
    }

    #[test]
    fn test_reconciliation_counts_undistributed_pool() {
        let payroll = create_test_payroll(&["KONTENTY:", "1:", "  1: 10, 5, TEST, 1, NIE, , p1, p2"]);

        let report = SettlementReconciler::new().reconcile(&payroll);

        assert!(report.is_balanced());
        match report.result(Currency::Items) {
            ReconciliationResult::Balanced { undistributed, .. } => assert_eq!(*undistributed, 1_000),
            other => panic!("expected balanced, got {:?}", other),
        }
    }

    #[test]
    fn test_reconciliation_detects_leak() {
        let mut payroll = create_test_payroll(&["KONTENTY:", "1: lead", "  1: 10, 0, A, 1, TAK, , b"]);
        payroll.items_tax_total -= 1_000;

        let report = SettlementReconciler::new().reconcile(&payroll);

        assert!(!report.is_balanced());
        assert!(report.cash.result.is_balanced());
        assert_eq!(report.items.result.difference(), -1_000);
        assert!(report.summary().contains("off by -1000"));
    }

    #[test]
    fn test_reconciliation_empty_payroll() {
        let lines: [&str; 0] = [];
        let report = SettlementReconciler::new().reconcile(&create_test_payroll(&lines));

        assert!(report.is_balanced());
        assert_eq!(report.participant_count, 0);
    }
    fn arb_haul_line() -> impl Strategy<Value = String> {
        (
            0u32..5_000,
            0u32..5_000,
            any::<bool>(),
            proptest::option::of(0usize..6),
            proptest::collection::vec((0usize..6, any::<bool>()), 0..6),
        )
            .prop_map(|(items, cash, flag, caller, participants)| {
                let caller = caller.map(|c| format!("p{}", c)).unwrap_or_default();
                let participants: Vec<String> = participants
                    .iter()
                    .map(|(p, half)| if *half { format!("p{}(50%)", p) } else { format!("p{}", p) })
                    .collect();
                format!(
                    "  1: {}, {}, LOC, 1, {}, {}, {}",
                    items,
                    cash,
                    if flag { "TAK" } else { "NIE" },
                    caller,
                    participants.join(", ")
                )
            })
    }

    proptest! {
        #[test]
        fn prop_any_fixture_reconciles(
            sessions in proptest::collection::vec(
                (proptest::option::of(0usize..6), proptest::collection::vec(arb_haul_line(), 1..4)),
                1..4,
            ),
            event_roster in proptest::collection::vec(0usize..6, 0..4),
            recruitment in proptest::option::of(0u32..10),
        ) {
            let mut lines = vec!["KONTENTY:".to_string()];
            for (i, (organizer, hauls)) in sessions.iter().enumerate() {
                let organizer = organizer.map(|o| format!("p{}", o)).unwrap_or_default();
                lines.push(format!("{}: {}", i + 1, organizer));
                lines.extend(hauls.iter().cloned());
            }
            lines.push("CTA:".to_string());
            if !event_roster.is_empty() {
                let roster: Vec<String> = event_roster.iter().map(|p| format!("p{}", p)).collect();
                lines.push(format!("1: caller - {}", roster.join(", ")));
            }
            lines.push("REKRUTACJA:".to_string());
            if let Some(points) = recruitment {
                lines.push(format!("p0: {}", points));
            }

            let payroll = calculate_payroll(parse_payroll_input(&lines), &SettlementConfig::default()).unwrap();
            let report = SettlementReconciler::new().reconcile(&payroll);

            prop_assert!(report.is_balanced(), "{}", report.summary());
        }
    }
}
