// ⚙️ Settlement Configuration - Rates, markers and thresholds as data
// Every constant the engine uses lives here so a guild can tune its rules
// without touching the allocation code.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// SECTION MARKERS
// ============================================================================

/// Marker lines that open each section of the input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionMarkers {
    /// Looting sessions ("contents")
    pub contents: String,

    /// Standalone participation events (CTA)
    pub events: String,

    /// Manual recruitment credits
    pub recruitments: String,
}

impl Default for SectionMarkers {
    fn default() -> Self {
        SectionMarkers {
            contents: "KONTENTY:".to_string(),
            events: "CTA:".to_string(),
            recruitments: "REKRUTACJA:".to_string(),
        }
    }
}

// ============================================================================
// SETTLEMENT CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// Share of a gross amount paid out after tax, in basis points (default: 8000 = 80%)
    pub after_tax_basis_points: i64,

    /// Share of a gross amount fed into the return pool, in basis points (default: 1000 = 10%)
    pub returns_basis_points: i64,

    /// Every payout and grant is rounded down to a multiple of this (default: 1000)
    pub rounding_unit: i64,

    /// Haul amounts are written in thousands and scaled on parse (default: 1000)
    pub amount_scale: i64,

    /// Return-point base for a haul or event participant (default: 0.05)
    pub participant_return_base: f64,

    /// Return-point base for an organizer or caller (default: 0.25)
    pub organizer_caller_return_base: f64,

    /// Events pay this many times the normal multiplier curve (default: 2.0)
    pub event_multiplier_factor: f64,

    /// Name pairs scoring at or above this are flagged (default: 0.75)
    pub similarity_threshold: f64,

    /// Case-folded value of the organizer-present flag meaning "yes" (default: "tak")
    pub affirmative_token: String,

    /// Suffix marking a reduced (half) share (default: "(50%)")
    pub reduced_share_suffix: String,

    pub markers: SectionMarkers,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        SettlementConfig {
            after_tax_basis_points: 8000,
            returns_basis_points: 1000,
            rounding_unit: 1000,
            amount_scale: 1000,
            participant_return_base: 0.05,
            organizer_caller_return_base: 0.25,
            event_multiplier_factor: 2.0,
            similarity_threshold: 0.75,
            affirmative_token: "tak".to_string(),
            reduced_share_suffix: "(50%)".to_string(),
            markers: SectionMarkers::default(),
        }
    }
}

impl SettlementConfig {
    /// Load config from JSON file; missing fields keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: SettlementConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configs that would break the conservation arithmetic
    pub fn validate(&self) -> Result<()> {
        if self.rounding_unit <= 0 {
            anyhow::bail!("rounding_unit must be positive, got {}", self.rounding_unit);
        }
        if self.amount_scale <= 0 {
            anyhow::bail!("amount_scale must be positive, got {}", self.amount_scale);
        }
        if self.after_tax_basis_points < 0
            || self.returns_basis_points < 0
            || self.after_tax_basis_points + self.returns_basis_points > 10_000
        {
            anyhow::bail!(
                "after-tax ({}) and returns ({}) basis points must be non-negative and sum to at most 10000",
                self.after_tax_basis_points,
                self.returns_basis_points
            );
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            anyhow::bail!(
                "similarity_threshold must be within 0.0..=1.0, got {}",
                self.similarity_threshold
            );
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
