//! Weighted pool exit math with exact decimal calculations
//!
//! Generalizes the constant product (x * y = k) to any number of tokens with
//! arbitrary normalized weights: the invariant is `Π balance_i ^ weight_i`.
//! Fractional powers go through `checked_powd`, everything else through
//! checked fixed-point operations.

use crate::errors::ExitError;
use crate::pool_traits::{
    amount_out_after_fee, amount_out_before_fee, amount_out_with_fee, check_amounts_out,
    check_index, check_share_in, single_amount_out, ExitCurve,
};
use exit_types::{Decimal, FixedPoint, MathError};
use rust_decimal::MathematicalOps;

/// Reserves, weights, and fee of a weighted pool
#[derive(Debug, Clone)]
pub struct WeightedPoolState {
    pub balances: Vec<Decimal>,
    pub weights: Vec<Decimal>,
    pub total_supply: Decimal,
    pub swap_fee: Decimal,
}

/// Weighted math functions
pub struct WeightedMath;

impl WeightedMath {
    /// Token out for an exact share-token burn
    ///
    /// `out = balance * (1 - ((supply - share_in) / supply) ^ (1 / weight))`,
    /// with the swap fee charged on the `(1 - weight)` share that is
    /// effectively swapped out of the other tokens.
    pub fn token_out_given_exact_share_in(
        balance: Decimal,
        weight: Decimal,
        total_supply: Decimal,
        share_in: Decimal,
        swap_fee: Decimal,
    ) -> Result<Decimal, ExitError> {
        check_share_in(share_in, total_supply)?;
        if share_in.is_zero() {
            return Ok(Decimal::ZERO);
        }

        let invariant_ratio = FixedPoint::div(
            FixedPoint::sub(total_supply, share_in)?,
            total_supply,
        )?;
        let exponent = FixedPoint::div(Decimal::ONE, weight)?;
        let balance_ratio = Self::pow(invariant_ratio, exponent)?;

        let amount_without_fee =
            FixedPoint::mul(balance, FixedPoint::sub(Decimal::ONE, balance_ratio)?)?;
        amount_out_after_fee(amount_without_fee, weight, swap_fee)
    }

    /// Share-token burn required for exact amounts out of every token
    ///
    /// A request for a single token undoes the fee split of
    /// [`Self::token_out_given_exact_share_in`] exactly; mixed requests
    /// charge the fee on the part beyond the proportional share.
    pub fn share_in_given_exact_tokens_out(
        balances: &[Decimal],
        weights: &[Decimal],
        amounts_out: &[Decimal],
        total_supply: Decimal,
        swap_fee: Decimal,
    ) -> Result<Decimal, ExitError> {
        check_amounts_out(balances, amounts_out)?;
        if amounts_out.iter().all(|a| a.is_zero()) {
            return Ok(Decimal::ZERO);
        }
        if let Some(index) = single_amount_out(amounts_out) {
            return Self::share_in_given_exact_token_out(
                index,
                balances[index],
                weights[index],
                amounts_out[index],
                total_supply,
                swap_fee,
            );
        }

        let mut balance_ratios = Vec::with_capacity(balances.len());
        let mut invariant_ratio_without_fees = Decimal::ZERO;
        for ((balance, weight), amount) in balances.iter().zip(weights).zip(amounts_out) {
            let ratio = FixedPoint::div(FixedPoint::sub(*balance, *amount)?, *balance)?;
            invariant_ratio_without_fees =
                FixedPoint::add(invariant_ratio_without_fees, FixedPoint::mul(ratio, *weight)?)?;
            balance_ratios.push(ratio);
        }

        let mut invariant_ratio = Decimal::ONE;
        for (index, amount) in amounts_out.iter().enumerate() {
            if amount.is_zero() {
                continue;
            }
            let balance = balances[index];
            let with_fee = amount_out_with_fee(
                balance,
                *amount,
                balance_ratios[index],
                invariant_ratio_without_fees,
                swap_fee,
            )?;
            if with_fee > balance {
                return Err(ExitError::PoolReserveExceeded {
                    index,
                    requested: with_fee,
                    reserve: balance,
                });
            }
            let balance_ratio = FixedPoint::div(FixedPoint::sub(balance, with_fee)?, balance)?;
            let factor = Self::pow(balance_ratio, weights[index])?;
            invariant_ratio = FixedPoint::mul(invariant_ratio, factor)?;
        }

        Ok(FixedPoint::mul(
            total_supply,
            FixedPoint::sub(Decimal::ONE, invariant_ratio)?,
        )?)
    }

    /// `share = supply * (1 - ((balance - out0) / balance) ^ weight)`, with
    /// `out0` the output before the fee on its `(1 - weight)` share
    fn share_in_given_exact_token_out(
        index: usize,
        balance: Decimal,
        weight: Decimal,
        amount_out: Decimal,
        total_supply: Decimal,
        swap_fee: Decimal,
    ) -> Result<Decimal, ExitError> {
        let amount_without_fee = amount_out_before_fee(amount_out, weight, swap_fee)?;
        if amount_without_fee > balance {
            return Err(ExitError::PoolReserveExceeded {
                index,
                requested: amount_without_fee,
                reserve: balance,
            });
        }

        let balance_ratio = FixedPoint::div(
            FixedPoint::sub(balance, amount_without_fee)?,
            balance,
        )?;
        let invariant_ratio = Self::pow(balance_ratio, weight)?;
        Ok(FixedPoint::mul(
            total_supply,
            FixedPoint::sub(Decimal::ONE, invariant_ratio)?,
        )?)
    }

    /// Share token per unit of a token at spot: `supply * weight / balance`
    pub fn spot_share_per_token(
        balance: Decimal,
        weight: Decimal,
        total_supply: Decimal,
    ) -> Result<Decimal, ExitError> {
        let nominal = FixedPoint::div(weight, balance)?;
        Ok(FixedPoint::mul(nominal, total_supply)?)
    }

    fn pow(base: Decimal, exponent: Decimal) -> Result<Decimal, ExitError> {
        if base.is_zero() {
            return Ok(Decimal::ZERO);
        }
        base.checked_powd(exponent)
            .ok_or(ExitError::Math(MathError::Overflow { operation: "pow" }))
    }
}

impl ExitCurve for WeightedPoolState {
    fn token_out_given_exact_share_in(
        &self,
        share_in: Decimal,
        token_index: usize,
    ) -> Result<Decimal, ExitError> {
        check_index(token_index, self.balances.len())?;
        WeightedMath::token_out_given_exact_share_in(
            self.balances[token_index],
            self.weights[token_index],
            self.total_supply,
            share_in,
            self.swap_fee,
        )
    }

    fn share_in_given_exact_tokens_out(
        &self,
        amounts_out: &[Decimal],
    ) -> Result<Decimal, ExitError> {
        WeightedMath::share_in_given_exact_tokens_out(
            &self.balances,
            &self.weights,
            amounts_out,
            self.total_supply,
            self.swap_fee,
        )
    }

    fn spot_share_per_token(&self, token_index: usize) -> Result<Decimal, ExitError> {
        check_index(token_index, self.balances.len())?;
        WeightedMath::spot_share_per_token(
            self.balances[token_index],
            self.weights[token_index],
            self.total_supply,
        )
    }

    fn balances(&self) -> &[Decimal] {
        &self.balances
    }
}
