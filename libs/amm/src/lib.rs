//! # Pool Exit AMM Library - Precise Withdrawal Mathematics Engine
//!
//! ## Purpose
//!
//! Mathematical library computing what a liquidity provider receives when
//! exiting a pool, mirroring the rounding and bound semantics of the on-chain
//! contracts so its outputs can be submitted as minimum-output guards.
//!
//! ## Integration Points
//!
//! - **Input Sources**: Pool snapshots supplied by external data collaborators
//! - **Output Destinations**: Withdrawal sessions, quoting CLIs, UI layers
//! - **Pool Support**: Weighted, stable, and composed stable-phantom pools
//! - **Precision**: Token outputs rounded down, share burns rounded up
//!
//! ## Architecture Role
//!
//! - [`ExitMath`]: proportional exit, single-asset exits, inverse share
//!   solver, price impact
//! - [`SlippageEngine`]: conservative tolerance bounds on raw amounts
//! - [`WeightedMath`] / [`StableMath`]: bonding curves behind [`ExitCurve`]
//!
//! ## Performance Profile
//!
//! - **Precision**: Zero floating point; `Decimal` arithmetic throughout
//! - **Allocation**: One curve object per call, no shared state
//! - **Iteration**: Stable invariants converge within 255 Newton rounds

pub mod errors;
pub mod exit_math;
pub mod pool_traits;
pub mod slippage;
pub mod stable_math;
pub mod weighted_math;

pub use errors::{ExitError, SlippageError};
pub use exit_math::{ExitMath, PriceImpactOptions, ProportionalAmounts};
pub use pool_traits::{curve_for, ExitCurve};
pub use slippage::{SlippageEngine, SlippageTolerance};
pub use stable_math::{StableMath, StablePoolState};
pub use weighted_math::{WeightedMath, WeightedPoolState};

/// Common types for exit calculations
pub use rust_decimal::Decimal;
pub use rust_decimal_macros::dec;
