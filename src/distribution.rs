// 📦 Return-Pool Distributor - Share the global return pool by points
//
// value_per_point = pool / Σ return_points     (per currency)
// grant           = floor(points × value_per_point + ε) rounded down to 1000
// remainder       = pool - Σ grants             (back into the tax totals)

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::allocation::Content;
use crate::config::SettlementConfig;
use crate::entities::ParticipantRegistry;
use crate::error::Currency;
use crate::tax::round_down;

/// Absorbs float noise like 999.9999999 so an exact share is not floored away
const GRANT_EPSILON: f64 = 1e-6;

/// What the distributor did with the pool
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DistributionOutcome {
    pub items_pool: i64,
    pub cash_pool: i64,
    pub total_return_points: f64,

    /// Rounding slack, to be added to tax
    pub item_remainder: i64,
    pub cash_remainder: i64,

    /// Pool left untouched because nobody held return points
    pub undistributed_items: i64,
    pub undistributed_cash: i64,
}

impl DistributionOutcome {
    pub fn remainder(&self, currency: Currency) -> i64 {
        match currency {
            Currency::Items => self.item_remainder,
            Currency::Cash => self.cash_remainder,
        }
    }

    pub fn undistributed(&self, currency: Currency) -> i64 {
        match currency {
            Currency::Items => self.undistributed_items,
            Currency::Cash => self.undistributed_cash,
        }
    }

    pub fn is_distributed(&self) -> bool {
        self.undistributed_items == 0 && self.undistributed_cash == 0
    }
}

pub struct ReturnPoolDistributor {
    rounding_unit: i64,
}

impl ReturnPoolDistributor {
    pub fn new() -> Self {
        Self::with_config(&SettlementConfig::default())
    }

    pub fn with_config(config: &SettlementConfig) -> Self {
        ReturnPoolDistributor {
            rounding_unit: config.rounding_unit,
        }
    }

    /// Distribute the returns generated by `contents` across the registry
    pub fn distribute(
        &self,
        contents: &[Content],
        registry: &mut ParticipantRegistry,
    ) -> DistributionOutcome {
        let items_pool: i64 = contents.iter().map(|c| c.returns_from_items_total).sum();
        let cash_pool: i64 = contents.iter().map(|c| c.returns_from_cash_total).sum();
        self.distribute_pool(items_pool, cash_pool, registry)
    }

    pub fn distribute_pool(
        &self,
        items_pool: i64,
        cash_pool: i64,
        registry: &mut ParticipantRegistry,
    ) -> DistributionOutcome {
        // Only positive balances can receive a grant, so only they set the price
        let total_return_points: f64 = registry
            .all()
            .iter()
            .map(|p| p.return_points)
            .filter(|points| *points > 0.0)
            .sum();
        let mut outcome = DistributionOutcome {
            items_pool,
            cash_pool,
            total_return_points,
            ..DistributionOutcome::default()
        };

        if total_return_points <= 0.0 || !total_return_points.is_finite() {
            outcome.undistributed_items = items_pool;
            outcome.undistributed_cash = cash_pool;
            warn!(
                items_pool,
                cash_pool,
                total_return_points,
                "no return points held, pool left undistributed"
            );
            return outcome;
        }

        let items_per_point = items_pool as f64 / total_return_points;
        let cash_per_point = cash_pool as f64 / total_return_points;
        let mut items_granted = 0;
        let mut cash_granted = 0;

        for participant in registry.all_mut() {
            let items = self.grant(participant.return_points, items_per_point);
            let cash = self.grant(participant.return_points, cash_per_point);
            participant.credit_returns(Currency::Items, items);
            participant.credit_returns(Currency::Cash, cash);
            items_granted += items;
            cash_granted += cash;
        }

        outcome.item_remainder = items_pool - items_granted;
        outcome.cash_remainder = cash_pool - cash_granted;

        info!(
            items_pool,
            cash_pool,
            total_return_points,
            items_per_point,
            cash_per_point,
            item_remainder = outcome.item_remainder,
            cash_remainder = outcome.cash_remainder,
            "return pool distributed"
        );
        outcome
    }

    /// ⌊points × value_per_point⌋ rounded down to the unit, with GRANT_EPSILON
    /// added before the floor. This intentionally differs from a pure floor:
    /// a product like 2999.9999999 must still grant 3000.
    fn grant(&self, points: f64, value_per_point: f64) -> i64 {
        if points <= 0.0 {
            return 0;
        }
        let raw = (points * value_per_point + GRANT_EPSILON).floor() as i64;
        round_down(raw, self.rounding_unit)
    }
}

impl Default for ReturnPoolDistributor {
    fn default() -> Self {
        Self::new()
    }
}
