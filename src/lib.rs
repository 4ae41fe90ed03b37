// Haul Payroll - Core Library
// Settlement engine for group loot hauls: parse, allocate, credit, distribute,
// reconcile, report. Exposes all modules for use in the CLI and tests.

pub mod config;
pub mod error;
pub mod entities;
pub mod parser;
pub mod tax;            // Tax/return splitter
pub mod allocation;     // Haul allocation engine
pub mod credits;        // Event & recruitment credit pass
pub mod distribution;   // Return-pool distributor
pub mod similarity;     // Name-similarity auditor
pub mod payroll;        // Pipeline
pub mod reconciliation; // Conservation check
pub mod report;         // Text / CSV output

// Re-export commonly used types
pub use config::{SectionMarkers, SettlementConfig};
pub use error::{AllocationError, AllocationResult, Currency};
pub use entities::{
    HaulParticipant, ItemLedger, LocationTab, Participant, ParticipantId, ParticipantRegistry,
    Share,
};
pub use parser::{
    ContentInput, CtaInput, DiagnosticKind, HaulInput, ParseDiagnostic, ParsedInput,
    PayrollParser, RecruitmentInput,
    parse_participant, parse_payroll_input,
};
pub use tax::{TaxSplit, split_tax_and_returns, split_with};
pub use allocation::{Content, Haul, HaulAllocationEngine, return_multiplier};
pub use credits::CreditEngine;
pub use distribution::{DistributionOutcome, ReturnPoolDistributor};
pub use similarity::{NameSimilarityAuditor, SimilarNamePair, jaro_winkler};
pub use payroll::{Payroll, calculate_payroll, calculate_payroll_from_file};
pub use reconciliation::{
    CurrencyReconciliation, ReconciliationResult, SettlementReconciler, SettlementReport,
};
pub use report::{
    format_thousands, format_thousands_k, render_text, write_csv, write_csv_file,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
