//! Slippage bounds with conservative rounding
//!
//! A tolerance is applied to the raw (smallest-unit) amount. The delta is
//! rounded up when subtracted and down when added, so a minimum-output floor
//! is never overstated and a maximum-input ceiling is never understated by
//! more than the tolerance allows.

use crate::errors::SlippageError;
use exit_types::{Decimal, FixedPoint, Rounding};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

const BPS_DENOMINATOR: Decimal = dec!(10000);

/// Slippage tolerance in basis points, validated to `[0, 10000]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct SlippageTolerance(u32);

impl SlippageTolerance {
    pub const MAX_BPS: u32 = 10_000;

    pub const ZERO: Self = Self(0);

    pub fn from_bps(bps: u32) -> Result<Self, SlippageError> {
        if bps > Self::MAX_BPS {
            return Err(SlippageError::Configuration { bps });
        }
        Ok(Self(bps))
    }

    pub fn bps(self) -> u32 {
        self.0
    }

    /// Tolerance as a fraction (50 bps = 0.005)
    pub fn as_fraction(self) -> Decimal {
        Decimal::from(self.0) / BPS_DENOMINATOR
    }
}

impl Default for SlippageTolerance {
    fn default() -> Self {
        Self(50)
    }
}

impl TryFrom<u32> for SlippageTolerance {
    type Error = SlippageError;

    fn try_from(bps: u32) -> Result<Self, Self::Error> {
        Self::from_bps(bps)
    }
}

impl From<SlippageTolerance> for u32 {
    fn from(tolerance: SlippageTolerance) -> Self {
        tolerance.0
    }
}

/// Applies and removes slippage tolerances
pub struct SlippageEngine;

impl SlippageEngine {
    /// Minimum acceptable output: `amount - delta`, delta rounded up
    ///
    /// `amount` must fit within `decimals` fractional digits.
    pub fn reduce_by_slippage(
        amount: Decimal,
        decimals: u32,
        tolerance: SlippageTolerance,
    ) -> Result<Decimal, SlippageError> {
        let raw = FixedPoint::scale_to_raw(amount, decimals)?;
        let delta = Self::raw_delta(raw, tolerance, Rounding::Up)?;
        let reduced = FixedPoint::sub(raw, delta)?;
        Ok(FixedPoint::scale_from_raw(reduced, decimals)?)
    }

    /// Maximum acceptable input: `amount + delta`, delta rounded down
    pub fn increase_by_slippage(
        amount: Decimal,
        decimals: u32,
        tolerance: SlippageTolerance,
    ) -> Result<Decimal, SlippageError> {
        let raw = FixedPoint::scale_to_raw(amount, decimals)?;
        let delta = Self::raw_delta(raw, tolerance, Rounding::Down)?;
        let increased = FixedPoint::add(raw, delta)?;
        Ok(FixedPoint::scale_from_raw(increased, decimals)?)
    }

    fn raw_delta(
        raw: Decimal,
        tolerance: SlippageTolerance,
        rounding: Rounding,
    ) -> Result<Decimal, SlippageError> {
        // Multiplying by bps first overflows for 18-decimal amounts above ~1.6e9
        let delta = FixedPoint::mul(raw, tolerance.as_fraction())?;
        Ok(FixedPoint::round_to_precision(delta, 0, rounding)?)
    }
}
