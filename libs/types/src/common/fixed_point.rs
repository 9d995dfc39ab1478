//! Fixed-point decimal arithmetic keyed to token decimals
//!
//! All pool-exit math routes through this module. Amounts are `Decimal`
//! values in token units; raw amounts are integer-valued `Decimal`s in the
//! token's smallest unit (wei for an 18-decimal token).
//!
//! ## Design Principles
//!
//! - **No Floating Point**: Every operation is exact decimal arithmetic
//! - **Directional Rounding**: Callers pick the rounding direction that keeps
//!   a bound conservative, never the nearest value
//! - **Checked Arithmetic**: Overflow and division by zero surface as
//!   [`MathError`] instead of panicking

use crate::common::errors::MathError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Largest scale a 96-bit decimal can carry
pub const MAX_DECIMALS: u32 = 28;

/// Rounding direction for precision reduction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rounding {
    /// Toward positive infinity
    Up,
    /// Toward negative infinity
    Down,
}

impl Rounding {
    fn strategy(self) -> RoundingStrategy {
        match self {
            Rounding::Up => RoundingStrategy::ToPositiveInfinity,
            Rounding::Down => RoundingStrategy::ToNegativeInfinity,
        }
    }
}

/// Fixed-point arithmetic with explicit error handling
pub struct FixedPoint;

impl FixedPoint {
    /// Checked addition
    pub fn add(lhs: Decimal, rhs: Decimal) -> Result<Decimal, MathError> {
        lhs.checked_add(rhs)
            .ok_or(MathError::Overflow { operation: "add" })
    }

    /// Checked subtraction
    pub fn sub(lhs: Decimal, rhs: Decimal) -> Result<Decimal, MathError> {
        lhs.checked_sub(rhs)
            .ok_or(MathError::Overflow { operation: "sub" })
    }

    /// Checked multiplication
    pub fn mul(lhs: Decimal, rhs: Decimal) -> Result<Decimal, MathError> {
        lhs.checked_mul(rhs)
            .ok_or(MathError::Overflow { operation: "mul" })
    }

    /// Checked division, rejecting a zero divisor
    pub fn div(lhs: Decimal, rhs: Decimal) -> Result<Decimal, MathError> {
        if rhs.is_zero() {
            return Err(MathError::DivisionByZero);
        }
        lhs.checked_div(rhs)
            .ok_or(MathError::Overflow { operation: "div" })
    }

    /// `10^decimals` as a decimal
    pub fn pow10(decimals: u32) -> Result<Decimal, MathError> {
        if decimals > MAX_DECIMALS {
            return Err(MathError::UnsupportedDecimals {
                decimals,
                max: MAX_DECIMALS,
            });
        }
        Ok(Decimal::from_i128_with_scale(10i128.pow(decimals), 0))
    }

    /// Convert a token-unit amount into raw smallest units
    ///
    /// Fails with [`MathError::PrecisionExceeded`] when the amount carries more
    /// fractional digits than `decimals`, matching how the chain parses units.
    pub fn scale_to_raw(amount: Decimal, decimals: u32) -> Result<Decimal, MathError> {
        Self::ensure_non_negative(amount)?;
        let factor = Self::pow10(decimals)?;
        if amount.normalize().scale() > decimals {
            return Err(MathError::PrecisionExceeded {
                value: amount,
                decimals,
            });
        }
        Ok(Self::mul(amount, factor)?.normalize())
    }

    /// Convert raw smallest units back into a token-unit amount
    pub fn scale_from_raw(raw: Decimal, decimals: u32) -> Result<Decimal, MathError> {
        Self::ensure_non_negative(raw)?;
        if !raw.fract().is_zero() {
            return Err(MathError::PrecisionExceeded {
                value: raw,
                decimals: 0,
            });
        }
        let factor = Self::pow10(decimals)?;
        Ok(Self::div(raw, factor)?.normalize())
    }

    /// Reduce `amount` to at most `decimals` fractional digits
    pub fn round_to_precision(
        amount: Decimal,
        decimals: u32,
        direction: Rounding,
    ) -> Result<Decimal, MathError> {
        if decimals > MAX_DECIMALS {
            return Err(MathError::UnsupportedDecimals {
                decimals,
                max: MAX_DECIMALS,
            });
        }
        Ok(amount
            .round_dp_with_strategy(decimals, direction.strategy())
            .normalize())
    }

    /// Reject negative amounts
    pub fn ensure_non_negative(amount: Decimal) -> Result<Decimal, MathError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MathError::negative(amount));
        }
        Ok(amount)
    }

    /// Parse a caller-typed amount
    ///
    /// Blank input means "no amount" and yields `Ok(None)`.
    pub fn parse_amount(input: &str) -> Result<Option<Decimal>, MathError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let value = Decimal::from_str(trimmed).map_err(|_| MathError::NegativeOrNonFiniteAmount {
            input: input.to_string(),
        })?;
        if value.is_sign_negative() && !value.is_zero() {
            return Err(MathError::NegativeOrNonFiniteAmount {
                input: input.to_string(),
            });
        }
        Ok(Some(value.normalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_scale_round_trip() {
        let raw = FixedPoint::scale_to_raw(dec!(1.5), 18).unwrap();
        assert_eq!(raw, dec!(1500000000000000000));
        assert_eq!(FixedPoint::scale_from_raw(raw, 18).unwrap(), dec!(1.5));

        let usdc = FixedPoint::scale_to_raw(dec!(5), 6).unwrap();
        assert_eq!(usdc, dec!(5000000));
    }

    #[test]
    fn test_scale_to_raw_rejects_excess_precision() {
        let err = FixedPoint::scale_to_raw(dec!(0.1234567), 6).unwrap_err();
        assert!(matches!(err, MathError::PrecisionExceeded { decimals: 6, .. }));

        // Trailing zeros are not significant
        assert_eq!(
            FixedPoint::scale_to_raw(dec!(1.2300000000), 2).unwrap(),
            dec!(123)
        );
    }

    #[test]
    fn test_scale_from_raw_rejects_fractional_raw() {
        assert!(FixedPoint::scale_from_raw(dec!(10.5), 2).is_err());
    }

    #[test]
    fn test_directional_rounding() {
        let value = dec!(1.2345);
        assert_eq!(
            FixedPoint::round_to_precision(value, 2, Rounding::Up).unwrap(),
            dec!(1.24)
        );
        assert_eq!(
            FixedPoint::round_to_precision(value, 2, Rounding::Down).unwrap(),
            dec!(1.23)
        );
        // Already within precision
        assert_eq!(
            FixedPoint::round_to_precision(dec!(1.2), 4, Rounding::Up).unwrap(),
            dec!(1.2)
        );
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            FixedPoint::div(dec!(1), Decimal::ZERO),
            Err(MathError::DivisionByZero)
        );
    }

    #[test]
    fn test_overflow_is_reported() {
        let err = FixedPoint::mul(Decimal::MAX, dec!(2)).unwrap_err();
        assert_eq!(err, MathError::Overflow { operation: "mul" });
    }

    #[test]
    fn test_unsupported_decimals() {
        assert!(matches!(
            FixedPoint::pow10(29),
            Err(MathError::UnsupportedDecimals { decimals: 29, .. })
        ));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(FixedPoint::parse_amount("").unwrap(), None);
        assert_eq!(FixedPoint::parse_amount("  ").unwrap(), None);
        assert_eq!(FixedPoint::parse_amount("12.50").unwrap(), Some(dec!(12.5)));
        assert!(FixedPoint::parse_amount("-1").is_err());
        assert!(FixedPoint::parse_amount("NaN").is_err());
        assert!(FixedPoint::parse_amount("abc").is_err());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_rounding_brackets_value(
                mantissa in 0i64..i64::MAX,
                scale in 0u32..=18,
                decimals in 0u32..=18,
            ) {
                let value = Decimal::new(mantissa, scale);
                let down = FixedPoint::round_to_precision(value, decimals, Rounding::Down).unwrap();
                let up = FixedPoint::round_to_precision(value, decimals, Rounding::Up).unwrap();
                let unit = Decimal::new(1, decimals);

                prop_assert!(down <= value && value <= up);
                prop_assert!(up - down <= unit);
                prop_assert!(down.scale() <= decimals && up.scale() <= decimals);
            }
        }
    }
}
