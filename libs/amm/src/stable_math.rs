//! Stable-swap exit math
//!
//! The invariant `D` satisfies
//!
//! `Ann * Σx + D = Ann * D + D^(n+1) / (n^n * Πx)`, with `Ann = A * n`,
//!
//! and is solved numerically by Newton iteration, as is the balance of a
//! single token given the invariant and every other balance. Composed
//! (phantom) pools use the same curve over reserves already converted to
//! their main tokens.

use crate::errors::ExitError;
use crate::pool_traits::{
    amount_out_after_fee, amount_out_before_fee, amount_out_with_fee, check_amounts_out,
    check_index, check_share_in, single_amount_out, ExitCurve,
};
use exit_types::{Decimal, FixedPoint};
use rust_decimal_macros::dec;

/// Max number of Newton rounds for invariant and balance computation
pub const MAX_ITERATIONS: usize = 255;

/// Relative change below which an iteration is considered converged
const CONVERGENCE_TOLERANCE: Decimal = dec!(0.00000000000000000001);

/// Reserves, amplification, and fee of a stable pool
#[derive(Debug, Clone)]
pub struct StablePoolState {
    pub balances: Vec<Decimal>,
    pub amplification: Decimal,
    pub total_supply: Decimal,
    pub swap_fee: Decimal,
}

/// Stable-swap math functions
pub struct StableMath;

impl StableMath {
    /// Compute the invariant `D` for the given balances
    pub fn invariant(amplification: Decimal, balances: &[Decimal]) -> Result<Decimal, ExitError> {
        let mut sum = Decimal::ZERO;
        for balance in balances {
            sum = FixedPoint::add(sum, *balance)?;
        }
        if sum.is_zero() {
            return Ok(Decimal::ZERO);
        }

        let n = Decimal::from(balances.len());
        let ann = FixedPoint::mul(amplification, n)?;
        let ann_sum = FixedPoint::mul(ann, sum)?;

        let mut d = sum;
        for _ in 0..MAX_ITERATIONS {
            let d_p = Self::d_product(d, balances)?;
            let previous = d;

            // D = (Ann*S + D_P*n) * D / ((Ann - 1) * D + (n + 1) * D_P)
            let numerator = FixedPoint::mul(
                FixedPoint::add(ann_sum, FixedPoint::mul(d_p, n)?)?,
                d,
            )?;
            let denominator = FixedPoint::add(
                FixedPoint::mul(FixedPoint::sub(ann, Decimal::ONE)?, d)?,
                FixedPoint::mul(FixedPoint::add(n, Decimal::ONE)?, d_p)?,
            )?;
            d = FixedPoint::div(numerator, denominator)?;

            if Self::converged(d, previous)? {
                return Ok(d);
            }
        }

        Err(ExitError::NoConvergence {
            iterations: MAX_ITERATIONS,
        })
    }

    /// Balance of `token_index` that keeps `invariant` with all other balances fixed
    pub fn balance_given_invariant(
        amplification: Decimal,
        balances: &[Decimal],
        invariant: Decimal,
        token_index: usize,
    ) -> Result<Decimal, ExitError> {
        check_index(token_index, balances.len())?;
        if invariant.is_zero() {
            return Ok(Decimal::ZERO);
        }

        let n = Decimal::from(balances.len());
        let ann = FixedPoint::mul(amplification, n)?;

        // c = D^(n+1) / (n^n * Π_{j≠i} x_j * Ann), b = Σ_{j≠i} x_j + D / Ann
        let mut c = invariant;
        let mut other_sum = Decimal::ZERO;
        for (index, balance) in balances.iter().enumerate() {
            if index == token_index {
                continue;
            }
            other_sum = FixedPoint::add(other_sum, *balance)?;
            c = FixedPoint::div(FixedPoint::mul(c, invariant)?, FixedPoint::mul(*balance, n)?)?;
        }
        c = FixedPoint::div(FixedPoint::mul(c, invariant)?, FixedPoint::mul(ann, n)?)?;
        let b = FixedPoint::add(other_sum, FixedPoint::div(invariant, ann)?)?;

        let mut y = invariant;
        for _ in 0..MAX_ITERATIONS {
            let previous = y;
            // y = (y^2 + c) / (2y + b - D)
            let numerator = FixedPoint::add(FixedPoint::mul(y, y)?, c)?;
            let denominator = FixedPoint::sub(
                FixedPoint::add(FixedPoint::mul(y, dec!(2))?, b)?,
                invariant,
            )?;
            y = FixedPoint::div(numerator, denominator)?;

            if Self::converged(y, previous)? {
                return Ok(y);
            }
        }

        Err(ExitError::NoConvergence {
            iterations: MAX_ITERATIONS,
        })
    }

    /// Token out for an exact share-token burn
    pub fn token_out_given_exact_share_in(
        amplification: Decimal,
        balances: &[Decimal],
        token_index: usize,
        total_supply: Decimal,
        share_in: Decimal,
        swap_fee: Decimal,
    ) -> Result<Decimal, ExitError> {
        check_index(token_index, balances.len())?;
        check_share_in(share_in, total_supply)?;
        if share_in.is_zero() {
            return Ok(Decimal::ZERO);
        }

        let current_invariant = Self::invariant(amplification, balances)?;
        let remaining = FixedPoint::sub(total_supply, share_in)?;
        let new_invariant = FixedPoint::div(
            FixedPoint::mul(current_invariant, remaining)?,
            total_supply,
        )?;

        let balance = balances[token_index];
        let new_balance =
            Self::balance_given_invariant(amplification, balances, new_invariant, token_index)?;
        let amount_without_fee = FixedPoint::sub(balance, new_balance)?.max(Decimal::ZERO);

        let current_weight = FixedPoint::div(balance, Self::sum(balances)?)?;
        amount_out_after_fee(amount_without_fee, current_weight, swap_fee)
    }

    /// Share-token burn required for exact amounts out of every token
    ///
    /// Single-token requests undo the fee split of
    /// [`Self::token_out_given_exact_share_in`], weighting by the token's
    /// share of the summed reserves.
    pub fn share_in_given_exact_tokens_out(
        amplification: Decimal,
        balances: &[Decimal],
        amounts_out: &[Decimal],
        total_supply: Decimal,
        swap_fee: Decimal,
    ) -> Result<Decimal, ExitError> {
        check_amounts_out(balances, amounts_out)?;
        if amounts_out.iter().all(|a| a.is_zero()) {
            return Ok(Decimal::ZERO);
        }

        let sum = Self::sum(balances)?;
        if let Some(index) = single_amount_out(amounts_out) {
            let current_weight = FixedPoint::div(balances[index], sum)?;
            let amount_without_fee =
                amount_out_before_fee(amounts_out[index], current_weight, swap_fee)?;
            if amount_without_fee > balances[index] {
                return Err(ExitError::PoolReserveExceeded {
                    index,
                    requested: amount_without_fee,
                    reserve: balances[index],
                });
            }
            if amount_without_fee == balances[index] {
                // An emptied reserve collapses the invariant to zero
                return Ok(total_supply);
            }
            let mut new_balances = balances.to_vec();
            new_balances[index] = FixedPoint::sub(balances[index], amount_without_fee)?;
            return Self::share_in_for_new_balances(
                amplification,
                balances,
                &new_balances,
                total_supply,
            );
        }

        let mut balance_ratios = Vec::with_capacity(balances.len());
        let mut invariant_ratio_without_fees = Decimal::ZERO;
        for (balance, amount) in balances.iter().zip(amounts_out) {
            let current_weight = FixedPoint::div(*balance, sum)?;
            let ratio = FixedPoint::div(FixedPoint::sub(*balance, *amount)?, *balance)?;
            invariant_ratio_without_fees = FixedPoint::add(
                invariant_ratio_without_fees,
                FixedPoint::mul(ratio, current_weight)?,
            )?;
            balance_ratios.push(ratio);
        }

        let mut new_balances = Vec::with_capacity(balances.len());
        for (index, (balance, amount)) in balances.iter().zip(amounts_out).enumerate() {
            let with_fee = amount_out_with_fee(
                *balance,
                *amount,
                balance_ratios[index],
                invariant_ratio_without_fees,
                swap_fee,
            )?;
            if with_fee > *balance {
                return Err(ExitError::PoolReserveExceeded {
                    index,
                    requested: with_fee,
                    reserve: *balance,
                });
            }
            new_balances.push(FixedPoint::sub(*balance, with_fee)?);
        }

        Self::share_in_for_new_balances(amplification, balances, &new_balances, total_supply)
    }

    /// `supply * (1 - D(new_balances) / D(balances))`
    fn share_in_for_new_balances(
        amplification: Decimal,
        balances: &[Decimal],
        new_balances: &[Decimal],
        total_supply: Decimal,
    ) -> Result<Decimal, ExitError> {
        let current_invariant = Self::invariant(amplification, balances)?;
        let new_invariant = Self::invariant(amplification, new_balances)?;
        let invariant_ratio = FixedPoint::div(new_invariant, current_invariant)?;
        Ok(FixedPoint::mul(
            total_supply,
            FixedPoint::sub(Decimal::ONE, invariant_ratio)?,
        )?)
    }

    /// Share token per unit of a token at spot: `supply * (∂D/∂x_i) / D`
    pub fn spot_share_per_token(
        amplification: Decimal,
        balances: &[Decimal],
        token_index: usize,
        total_supply: Decimal,
    ) -> Result<Decimal, ExitError> {
        check_index(token_index, balances.len())?;
        let d = Self::invariant(amplification, balances)?;
        let n = Decimal::from(balances.len());
        let ann = FixedPoint::mul(amplification, n)?;
        let d_p = Self::d_product(d, balances)?;

        // ∂D/∂x_i = (Ann + D_P / x_i) / (Ann - 1 + (n + 1) * D_P / D)
        let numerator = FixedPoint::add(ann, FixedPoint::div(d_p, balances[token_index])?)?;
        let denominator = FixedPoint::add(
            FixedPoint::sub(ann, Decimal::ONE)?,
            FixedPoint::div(FixedPoint::mul(FixedPoint::add(n, Decimal::ONE)?, d_p)?, d)?,
        )?;
        let derivative = FixedPoint::div(numerator, denominator)?;
        Ok(FixedPoint::div(FixedPoint::mul(total_supply, derivative)?, d)?)
    }

    /// `D^(n+1) / (n^n * Πx)`
    fn d_product(d: Decimal, balances: &[Decimal]) -> Result<Decimal, ExitError> {
        let n = Decimal::from(balances.len());
        let mut d_p = d;
        for balance in balances {
            d_p = FixedPoint::div(FixedPoint::mul(d_p, d)?, FixedPoint::mul(*balance, n)?)?;
        }
        Ok(d_p)
    }

    fn converged(current: Decimal, previous: Decimal) -> Result<bool, ExitError> {
        let change = FixedPoint::sub(current, previous)?.abs();
        Ok(change <= FixedPoint::mul(current.abs(), CONVERGENCE_TOLERANCE)?)
    }

    fn sum(balances: &[Decimal]) -> Result<Decimal, ExitError> {
        let mut sum = Decimal::ZERO;
        for balance in balances {
            sum = FixedPoint::add(sum, *balance)?;
        }
        Ok(sum)
    }
}

impl ExitCurve for StablePoolState {
    fn token_out_given_exact_share_in(
        &self,
        share_in: Decimal,
        token_index: usize,
    ) -> Result<Decimal, ExitError> {
        StableMath::token_out_given_exact_share_in(
            self.amplification,
            &self.balances,
            token_index,
            self.total_supply,
            share_in,
            self.swap_fee,
        )
    }

    fn share_in_given_exact_tokens_out(
        &self,
        amounts_out: &[Decimal],
    ) -> Result<Decimal, ExitError> {
        StableMath::share_in_given_exact_tokens_out(
            self.amplification,
            &self.balances,
            amounts_out,
            self.total_supply,
            self.swap_fee,
        )
    }

    fn spot_share_per_token(&self, token_index: usize) -> Result<Decimal, ExitError> {
        StableMath::spot_share_per_token(
            self.amplification,
            &self.balances,
            token_index,
            self.total_supply,
        )
    }

    fn balances(&self) -> &[Decimal] {
        &self.balances
    }
}
