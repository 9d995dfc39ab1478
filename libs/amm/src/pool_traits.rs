//! Curve trait definitions for a unified exit interface

use crate::errors::ExitError;
use crate::stable_math::StablePoolState;
use crate::weighted_math::WeightedPoolState;
use exit_types::{Decimal, FixedPoint, PoolKind, PoolSnapshot, SnapshotError};

/// Bonding-curve operations needed to price an exit
///
/// Balances and amounts are in the tokens the user receives; share amounts
/// are in share-token units. Implementations return unrounded values, the
/// engine applies token precision.
pub trait ExitCurve {
    /// Tokens of `token_index` received for burning exactly `share_in`
    fn token_out_given_exact_share_in(
        &self,
        share_in: Decimal,
        token_index: usize,
    ) -> Result<Decimal, ExitError>;

    /// Share token that must be burned to receive exactly `amounts_out`
    fn share_in_given_exact_tokens_out(&self, amounts_out: &[Decimal])
        -> Result<Decimal, ExitError>;

    /// Share token per unit of `token_index` at the current spot price
    fn spot_share_per_token(&self, token_index: usize) -> Result<Decimal, ExitError>;

    /// Current reserves
    fn balances(&self) -> &[Decimal];
}

/// Build the curve matching a snapshot's pool kind
pub fn curve_for(snapshot: &PoolSnapshot) -> Result<Box<dyn ExitCurve>, ExitError> {
    let balances = snapshot.effective_balances()?;
    match snapshot.kind {
        PoolKind::Weighted => {
            let weights = snapshot.weights().ok_or_else(|| {
                let index = snapshot
                    .tokens
                    .iter()
                    .position(|t| t.weight.is_none())
                    .unwrap_or_default();
                SnapshotError::MissingWeight { index }
            })?;
            Ok(Box::new(WeightedPoolState {
                balances,
                weights,
                total_supply: snapshot.total_supply,
                swap_fee: snapshot.swap_fee,
            }))
        }
        PoolKind::Stable | PoolKind::StablePhantom => {
            let amplification = snapshot
                .amplification
                .ok_or(SnapshotError::MissingAmplification)?;
            Ok(Box::new(StablePoolState {
                balances,
                amplification,
                total_supply: snapshot.total_supply,
                swap_fee: snapshot.swap_fee,
            }))
        }
    }
}

/// Gross up an exact output for the swap fee charged on its taxable part
///
/// An exit that departs from the pool's current proportions is a proportional
/// exit plus an implicit swap. Only the part beyond the proportional share,
/// `amount - balance * (1 - invariant_ratio_without_fees)`, pays the fee.
pub(crate) fn amount_out_with_fee(
    balance: Decimal,
    amount_out: Decimal,
    balance_ratio_without_fee: Decimal,
    invariant_ratio_without_fees: Decimal,
    swap_fee: Decimal,
) -> Result<Decimal, ExitError> {
    if invariant_ratio_without_fees <= balance_ratio_without_fee {
        return Ok(amount_out);
    }
    let non_taxable = FixedPoint::mul(
        balance,
        FixedPoint::sub(Decimal::ONE, invariant_ratio_without_fees)?,
    )?;
    let taxable = FixedPoint::sub(amount_out, non_taxable)?;
    let taxable_with_fee = FixedPoint::div(taxable, FixedPoint::sub(Decimal::ONE, swap_fee)?)?;
    Ok(FixedPoint::add(non_taxable, taxable_with_fee)?)
}

/// Remove the swap fee from the taxable part of a gross single-token output
pub(crate) fn amount_out_after_fee(
    amount_without_fee: Decimal,
    current_weight: Decimal,
    swap_fee: Decimal,
) -> Result<Decimal, ExitError> {
    let taxable_percentage = FixedPoint::sub(Decimal::ONE, current_weight)?;
    let taxable = FixedPoint::mul(amount_without_fee, taxable_percentage)?;
    let non_taxable = FixedPoint::sub(amount_without_fee, taxable)?;
    let taxable_after_fee = FixedPoint::mul(taxable, FixedPoint::sub(Decimal::ONE, swap_fee)?)?;
    Ok(FixedPoint::add(non_taxable, taxable_after_fee)?)
}

/// Invert [`amount_out_after_fee`]: the fee-free output behind a net amount
pub(crate) fn amount_out_before_fee(
    amount_out: Decimal,
    current_weight: Decimal,
    swap_fee: Decimal,
) -> Result<Decimal, ExitError> {
    let taxable_percentage = FixedPoint::sub(Decimal::ONE, current_weight)?;
    let kept = FixedPoint::add(
        current_weight,
        FixedPoint::mul(taxable_percentage, FixedPoint::sub(Decimal::ONE, swap_fee)?)?,
    )?;
    Ok(FixedPoint::div(amount_out, kept)?)
}

/// Index of the only nonzero amount, if exactly one token is requested
pub(crate) fn single_amount_out(amounts_out: &[Decimal]) -> Option<usize> {
    let mut nonzero = amounts_out
        .iter()
        .enumerate()
        .filter(|(_, amount)| !amount.is_zero());
    match (nonzero.next(), nonzero.next()) {
        (Some((index, _)), None) => Some(index),
        _ => None,
    }
}

/// Reject share amounts the pool cannot redeem
pub(crate) fn check_share_in(share_in: Decimal, total_supply: Decimal) -> Result<(), ExitError> {
    FixedPoint::ensure_non_negative(share_in)?;
    if share_in > total_supply {
        return Err(ExitError::ShareAmountExceedsSupply {
            amount: share_in,
            supply: total_supply,
        });
    }
    Ok(())
}

/// Check every requested amount against the reserve it draws from
pub(crate) fn check_amounts_out(
    balances: &[Decimal],
    amounts_out: &[Decimal],
) -> Result<(), ExitError> {
    if amounts_out.len() != balances.len() {
        return Err(ExitError::AmountCountMismatch {
            expected: balances.len(),
            found: amounts_out.len(),
        });
    }
    for (index, (amount, balance)) in amounts_out.iter().zip(balances).enumerate() {
        FixedPoint::ensure_non_negative(*amount)?;
        if amount > balance {
            return Err(ExitError::PoolReserveExceeded {
                index,
                requested: *amount,
                reserve: *balance,
            });
        }
    }
    Ok(())
}

pub(crate) fn check_index(token_index: usize, count: usize) -> Result<(), ExitError> {
    if token_index >= count {
        return Err(ExitError::InvalidTokenIndex {
            index: token_index,
            count,
        });
    }
    Ok(())
}
