//! # Pool Exit Types Library
//!
//! Shared type system for the pool-exit math engine and the withdrawal
//! session built on top of it.
//!
//! ## Design Philosophy
//!
//! - **No Precision Loss**: All amounts are exact `Decimal` values, never floats
//! - **Directional Rounding**: Every precision reduction names its direction
//! - **Immutable Snapshots**: Pool state is replaced wholesale, never patched
//! - **Typed Errors**: Arithmetic and validation failures are distinct enums
//!
//! ## Quick Start
//!
//! ```rust
//! use exit_types::{FixedPoint, Rounding};
//! use rust_decimal_macros::dec;
//!
//! let raw = FixedPoint::scale_to_raw(dec!(1.5), 6).unwrap();
//! assert_eq!(raw, dec!(1500000));
//!
//! let floor = FixedPoint::round_to_precision(dec!(0.123456789), 6, Rounding::Down).unwrap();
//! assert_eq!(floor, dec!(0.123456));
//! ```

pub mod common;
pub mod pool;

pub use common::errors::{MathError, SnapshotError};
pub use common::fixed_point::{FixedPoint, Rounding, MAX_DECIMALS};
pub use pool::{
    Composition, LinearPool, PoolKind, PoolSnapshot, PoolToken, TokenInfo,
    DEFAULT_SHARE_DECIMALS,
};

/// Common types for exit calculations
pub use rust_decimal::Decimal;
pub use rust_decimal_macros::dec;
