// 💰 Tax/Return Splitter - Pure per-amount arithmetic
//
// Formula:
//   after_tax = floor(amount × 0.8)  rounded down to thousands
//   returns   = floor(amount × 0.1)  rounded down to thousands
//   tax       = amount - after_tax - returns
//
// Tax absorbs all rounding slack, so after_tax + returns + tax == amount always.

use serde::{Deserialize, Serialize};

use crate::config::SettlementConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxSplit {
    pub after_tax: i64,
    pub returns: i64,
    pub tax: i64,
}

impl TaxSplit {
    /// Reassemble the gross amount
    pub fn gross(&self) -> i64 {
        self.after_tax + self.returns + self.tax
    }
}

/// Split with the default 80% / 10% / 1000-unit rules
pub fn split_tax_and_returns(amount: i64) -> TaxSplit {
    split_with(amount, &SettlementConfig::default())
}

/// Split a non-negative gross amount; negative input is treated as 0
pub fn split_with(amount: i64, config: &SettlementConfig) -> TaxSplit {
    let amount = amount.max(0);
    let after_tax = round_down(
        portion(amount, config.after_tax_basis_points),
        config.rounding_unit,
    );
    let returns = round_down(
        portion(amount, config.returns_basis_points),
        config.rounding_unit,
    );

    TaxSplit {
        after_tax,
        returns,
        tax: amount - after_tax - returns,
    }
}

/// Round a non-negative value down to a multiple of `unit`
pub fn round_down(value: i64, unit: i64) -> i64 {
    if unit <= 0 {
        return value;
    }
    value / unit * unit
}

/// floor(amount × basis_points / 10000), exact in integers
fn portion(amount: i64, basis_points: i64) -> i64 {
    ((amount as i128 * basis_points as i128) / 10_000) as i64
}

// ============================================================================
// TESTS
// ============================================================================
