//! Settlement errors

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which pool a figure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    Items,
    Cash,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Items => "items",
            Currency::Cash => "cash",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invariant violation raised while allocating a session
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AllocationError {
    #[error(
        "session {session_id}, haul {haul_index}: {currency} left undistributed is {actual}, expected remainder {expected}"
    )]
    DistributionMismatch {
        session_id: u32,
        haul_index: usize,
        currency: Currency,
        expected: i64,
        actual: i64,
    },

    #[error(
        "session {session_id}, haul {haul_index}: granted {actual} return points, expected {expected}"
    )]
    ReturnPointMismatch {
        session_id: u32,
        haul_index: usize,
        expected: f64,
        actual: f64,
    },
}

/// Result type for allocation operations
pub type AllocationResult<T> = Result<T, AllocationError>;
