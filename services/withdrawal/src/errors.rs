//! Error types for withdrawal sessions and their collaborators

use exit_amm::{ExitError, SlippageError};
use exit_types::{Decimal, MathError, SnapshotError};
use thiserror::Error;

/// Failures of a session mutator; the session keeps its previous state
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    #[error("Share amount {amount} exceeds share balance {balance}")]
    ShareAmountExceedsBalance { amount: Decimal, balance: Decimal },

    #[error("Invalid pool snapshot: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Exit(#[from] ExitError),

    #[error(transparent)]
    Slippage(#[from] SlippageError),

    #[error(transparent)]
    Math(#[from] MathError),
}

/// Failures reported by external data collaborators
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SourceError {
    #[error("Pool {pool_id} not found")]
    PoolNotFound { pool_id: String },

    #[error("Stale data for pool {pool_id}: block {received} is older than {current}")]
    StaleData {
        pool_id: String,
        received: u64,
        current: u64,
    },

    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the async withdrawal flow
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Readiness signal closed before becoming ready")]
    ReadinessClosed,

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Session(#[from] SessionError),
}
