//! Error types for exit math and slippage bounds

use exit_types::{Decimal, MathError, SnapshotError};
use thiserror::Error;

/// Failures of the pool math engine
///
/// All variants except [`ExitError::PoolReserveExceeded`] are caller bugs.
/// The reserve case is user-reachable; callers that render results should
/// check reserves first and present a clamped price impact instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExitError {
    #[error("Token index {index} out of range for pool with {count} tokens")]
    InvalidTokenIndex { index: usize, count: usize },

    #[error("Expected {expected} token amounts, got {found}")]
    AmountCountMismatch { expected: usize, found: usize },

    #[error("Share amount {amount} exceeds total supply {supply}")]
    ShareAmountExceedsSupply { amount: Decimal, supply: Decimal },

    #[error("Requested {requested} of token {index} exceeds pool reserve {reserve}")]
    PoolReserveExceeded {
        index: usize,
        requested: Decimal,
        reserve: Decimal,
    },

    #[error("Stable invariant did not converge after {iterations} iterations")]
    NoConvergence { iterations: usize },

    #[error("Invalid pool snapshot: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Math(#[from] MathError),
}

/// Failures of the slippage engine
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SlippageError {
    /// Tolerance outside `[0, 10000]` basis points
    #[error("Configuration error: slippage tolerance {bps} bps is outside [0, 10000]")]
    Configuration { bps: u32 },

    #[error(transparent)]
    Math(#[from] MathError),
}
