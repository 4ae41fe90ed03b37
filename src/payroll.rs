// 🧾 Payroll Pipeline - parse → allocate → event credit → recruitment credit → distribute
//
// The registry built by the parser is moved into the pipeline and threaded
// through every phase by &mut; the finished ledger lives on the Payroll.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::allocation::{Content, HaulAllocationEngine};
use crate::config::SettlementConfig;
use crate::credits::CreditEngine;
use crate::distribution::{DistributionOutcome, ReturnPoolDistributor};
use crate::entities::ParticipantRegistry;
use crate::error::{AllocationResult, Currency};
use crate::parser::{ParseDiagnostic, ParsedInput, PayrollParser};

/// The settled ledger and its headline totals
#[derive(Debug, Clone, Serialize)]
pub struct Payroll {
    /// Haul tax + allocation remainders + distributor remainder
    pub items_tax_total: i64,
    pub cash_tax_total: i64,

    /// Sum of pre-tax haul amounts fed in
    pub gross_items: i64,
    pub gross_cash: i64,

    pub event_points_total: f64,
    pub recruitment_points_total: f64,

    pub undistributed_items: i64,
    pub undistributed_cash: i64,

    pub distribution: DistributionOutcome,
    pub contents: Vec<Content>,
    pub participants: ParticipantRegistry,
    pub diagnostics: Vec<ParseDiagnostic>,
}

impl Payroll {
    pub fn tax_total(&self, currency: Currency) -> i64 {
        match currency {
            Currency::Items => self.items_tax_total,
            Currency::Cash => self.cash_tax_total,
        }
    }

    pub fn gross(&self, currency: Currency) -> i64 {
        match currency {
            Currency::Items => self.gross_items,
            Currency::Cash => self.gross_cash,
        }
    }

    pub fn undistributed(&self, currency: Currency) -> i64 {
        match currency {
            Currency::Items => self.undistributed_items,
            Currency::Cash => self.undistributed_cash,
        }
    }

    /// Σ after-tax payouts held by participants
    pub fn payouts(&self, currency: Currency) -> i64 {
        match currency {
            Currency::Items => self.participants.total_items_after_tax(),
            Currency::Cash => self.participants.total_cash_after_tax(),
        }
    }

    /// Σ return-pool grants held by participants
    pub fn returns_received(&self, currency: Currency) -> i64 {
        self.participants.total_returns(currency)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} sessions, {} participants: items tax {}, cash tax {}, items paid {}, cash paid {}",
            self.contents.len(),
            self.participants.count(),
            self.items_tax_total,
            self.cash_tax_total,
            self.payouts(Currency::Items),
            self.payouts(Currency::Cash),
        )
    }
}

/// Run every settlement phase over parsed input
pub fn calculate_payroll(input: ParsedInput, config: &SettlementConfig) -> AllocationResult<Payroll> {
    let ParsedInput {
        contents: content_inputs,
        events,
        recruitments,
        mut registry,
        diagnostics,
    } = input;

    let gross_items: i64 = content_inputs
        .iter()
        .flat_map(|c| c.hauls.iter())
        .map(|h| h.items_before_tax.max(0))
        .sum();
    let gross_cash: i64 = content_inputs
        .iter()
        .flat_map(|c| c.hauls.iter())
        .map(|h| h.cash_before_tax.max(0))
        .sum();

    // Phase 1: hauls
    let contents = HaulAllocationEngine::with_config(config).allocate(&content_inputs, &mut registry)?;

    // Phase 2-3: return points
    let credits = CreditEngine::with_config(config);
    let event_points_total = credits.credit_events(&events, &mut registry);
    let recruitment_points_total = credits.credit_recruitments(&recruitments, &mut registry);

    // Phase 4: return pool
    let distribution = ReturnPoolDistributor::with_config(config).distribute(&contents, &mut registry);

    let items_tax_total =
        contents.iter().map(|c| c.items_tax_total).sum::<i64>() + distribution.item_remainder;
    let cash_tax_total =
        contents.iter().map(|c| c.cash_tax_total).sum::<i64>() + distribution.cash_remainder;

    let payroll = Payroll {
        items_tax_total,
        cash_tax_total,
        gross_items,
        gross_cash,
        event_points_total,
        recruitment_points_total,
        undistributed_items: distribution.undistributed_items,
        undistributed_cash: distribution.undistributed_cash,
        distribution,
        contents,
        participants: registry,
        diagnostics,
    };

    info!(
        sessions = payroll.contents.len(),
        participants = payroll.participants.count(),
        items_tax = payroll.items_tax_total,
        cash_tax = payroll.cash_tax_total,
        "payroll calculated"
    );
    Ok(payroll)
}

/// Parse a file and settle it
pub fn calculate_payroll_from_file(path: &Path, config: &SettlementConfig) -> Result<Payroll> {
    let input = PayrollParser::with_config(config).parse_file(path)?;
    Ok(calculate_payroll(input, config)?)
}

// ============================================================================
// TESTS
// ============================================================================
