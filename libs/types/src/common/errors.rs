//! Error types for fixed-point arithmetic and pool snapshot validation
//!
//! Math errors indicate a caller bug or malformed input and are always
//! propagated, never recovered silently: a masked error here would corrupt
//! the minimum-output guards derived from the result.

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur during fixed-point arithmetic operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MathError {
    /// Division by zero in fixed-point arithmetic
    #[error("Division by zero in fixed-point arithmetic")]
    DivisionByZero,

    /// Result does not fit the 96-bit decimal mantissa
    #[error("Overflow: {operation} exceeds the representable decimal range")]
    Overflow { operation: &'static str },

    /// Amount is negative, unparseable, or not a finite decimal
    #[error("Amount is negative or not a finite decimal: '{input}'")]
    NegativeOrNonFiniteAmount { input: String },

    /// Amount carries more fractional digits than the token supports
    #[error("Precision loss: {value} has more than {decimals} fractional digits")]
    PrecisionExceeded { value: Decimal, decimals: u32 },

    /// Token decimals beyond what a 96-bit decimal can scale
    #[error("Unsupported token decimals {decimals}, maximum is {max}")]
    UnsupportedDecimals { decimals: u32, max: u32 },
}

impl MathError {
    pub(crate) fn negative(value: Decimal) -> Self {
        MathError::NegativeOrNonFiniteAmount {
            input: value.to_string(),
        }
    }
}

/// Errors raised while validating a pool snapshot received from a collaborator
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SnapshotError {
    #[error("Pool must hold at least two tokens, found {count}")]
    TooFewTokens { count: usize },

    #[error("Weighted pool token {index} has no weight")]
    MissingWeight { index: usize },

    #[error("Normalized weights must sum to one, got {sum}")]
    InvalidWeights { sum: Decimal },

    #[error("Stable pool requires a positive amplification parameter")]
    MissingAmplification,

    #[error("Composed pool needs one linear pool per token: expected {expected}, found {found}")]
    CompositionMismatch { expected: usize, found: usize },

    #[error("Linear pool {index} has a non-positive price rate {rate}")]
    InvalidPriceRate { index: usize, rate: Decimal },

    #[error("Token {index} has a negative balance {balance}")]
    NegativeBalance { index: usize, balance: Decimal },

    #[error("Swap fee {fee} must be within [0, 1)")]
    InvalidSwapFee { fee: Decimal },

    #[error("Total share supply {supply} must not be negative")]
    InvalidTotalSupply { supply: Decimal },

    #[error("Token decimals {decimals} at index {index} exceed the supported maximum")]
    UnsupportedDecimals { index: usize, decimals: u32 },

    #[error(transparent)]
    Math(#[from] MathError),
}
