//! # Withdrawal Service
//!
//! ## Purpose
//!
//! Holds the inputs of one pool withdrawal and exposes outputs that are
//! always consistent with them: full amounts, minimum-output guards, share
//! token to burn, and price impact.
//!
//! ## Integration Points
//!
//! - **Input**: [`PoolSource`] snapshots, [`BalanceSource`] share balances,
//!   a `tokio::sync::watch` readiness signal
//! - **Output**: [`DerivedOutputs`] for UI layers and the `withdraw_quote` CLI
//! - **Display**: [`FiatPricer`] aggregation, never used for guards
//!
//! ## Architecture Role
//!
//! ```text
//! PoolSource ──┐
//!              ├─→ [WithdrawalFlow] ─→ [WithdrawalSession] ─→ DerivedOutputs
//! BalanceSource┘                            │
//!                                           └─→ exit-amm (ExitMath, SlippageEngine)
//! ```

pub mod errors;
pub mod flow;
pub mod outputs;
pub mod session;
pub mod sources;

pub use errors::{FlowError, SessionError, SourceError};
pub use flow::WithdrawalFlow;
pub use outputs::{DerivedOutputs, ExitMode, FiatSummary, WithdrawalInput, WithdrawalMode};
pub use session::{SessionSettings, WithdrawalSession, DEFAULT_HIGH_PRICE_IMPACT};
pub use sources::{BalanceSource, FiatPricer, Fixture, JsonFileSource, PoolSource};
