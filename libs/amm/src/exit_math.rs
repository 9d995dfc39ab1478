//! Pool exit calculations over a pool snapshot
//!
//! Every operation is a pure function of a [`PoolSnapshot`] and its
//! arguments. Outputs are rounded conservatively: token amounts a user
//! receives are rounded down to the token's decimals, share-token amounts a
//! user must burn are rounded up to the share token's decimals.
//!
//! Amount arguments and results are in the tokens the user holds. For a
//! composed pool these are the main tokens of the inner linear pools, not the
//! inner share tokens the outer pool actually stores.

use crate::errors::ExitError;
use crate::pool_traits::{check_index, curve_for};
use exit_types::{Decimal, FixedPoint, PoolSnapshot, Rounding};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Amounts of a proportional exit at both levels of a composed pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProportionalAmounts {
    /// Amounts of the pool's direct constituents
    pub pool_token_amounts: Vec<Decimal>,
    /// Amounts of the tokens the user receives (main tokens when composed)
    pub amounts: Vec<Decimal>,
}

/// Inputs for a price impact estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceImpactOptions {
    /// Amounts are an exact request; the share burn is solved from them
    pub exact_out: bool,
    /// Token the single-asset exit draws from
    pub token_index: usize,
    /// Share burn already known for a non-exact (max) exit
    pub share_amount_in: Option<Decimal>,
}

/// Pool exit math engine
pub struct ExitMath;

impl ExitMath {
    /// Token amounts for burning `share_amount_in` proportionally
    ///
    /// Equivalent to [`ExitMath::proportional_amounts`] without the inner
    /// pool-token level.
    pub fn proportional_exit(
        snapshot: &PoolSnapshot,
        share_amount_in: Decimal,
    ) -> Result<Vec<Decimal>, ExitError> {
        Ok(Self::proportional_amounts(snapshot, share_amount_in)?.amounts)
    }

    /// Proportional exit at both levels: `share_in / supply * reserve_i`,
    /// then `* price_rate_i` for composed pools
    pub fn proportional_amounts(
        snapshot: &PoolSnapshot,
        share_amount_in: Decimal,
    ) -> Result<ProportionalAmounts, ExitError> {
        FixedPoint::ensure_non_negative(share_amount_in)?;
        let count = snapshot.token_count();
        if share_amount_in.is_zero() {
            return Ok(ProportionalAmounts {
                pool_token_amounts: vec![Decimal::ZERO; count],
                amounts: vec![Decimal::ZERO; count],
            });
        }
        if share_amount_in > snapshot.total_supply {
            return Err(ExitError::ShareAmountExceedsSupply {
                amount: share_amount_in,
                supply: snapshot.total_supply,
            });
        }

        let ratio = FixedPoint::div(share_amount_in, snapshot.total_supply)?;
        let mut pool_token_amounts = Vec::with_capacity(count);
        for token in &snapshot.tokens {
            let amount = FixedPoint::mul(token.balance, ratio)?;
            pool_token_amounts.push(FixedPoint::round_to_precision(
                amount,
                token.decimals,
                Rounding::Down,
            )?);
        }

        let amounts = match snapshot.price_rates() {
            None => pool_token_amounts.clone(),
            Some(rates) => {
                let outputs = snapshot.output_tokens();
                let mut main_amounts = Vec::with_capacity(count);
                for ((amount, rate), token) in pool_token_amounts.iter().zip(rates).zip(&outputs) {
                    let main = FixedPoint::mul(*amount, rate)?;
                    main_amounts.push(FixedPoint::round_to_precision(
                        main,
                        token.decimals,
                        Rounding::Down,
                    )?);
                }
                main_amounts
            }
        };

        Ok(ProportionalAmounts {
            pool_token_amounts,
            amounts,
        })
    }

    /// Maximum of one token obtainable by burning exactly `share_amount_in`
    pub fn exact_bpt_in_for_token_out(
        snapshot: &PoolSnapshot,
        share_amount_in: Decimal,
        token_index: usize,
    ) -> Result<Decimal, ExitError> {
        check_index(token_index, snapshot.token_count())?;
        if share_amount_in.is_zero() {
            return Ok(Decimal::ZERO);
        }

        let curve = curve_for(snapshot)?;
        let amount = curve.token_out_given_exact_share_in(share_amount_in, token_index)?;
        let decimals = snapshot.output_tokens()[token_index].decimals;
        let rounded = FixedPoint::round_to_precision(amount.max(Decimal::ZERO), decimals, Rounding::Down)?;
        trace!(
            pool = %snapshot.id,
            token_index,
            %share_amount_in,
            amount_out = %rounded,
            "single asset max computed"
        );
        Ok(rounded)
    }

    /// Share token that must be burned to receive exactly `exact_token_amount_out`
    pub fn bpt_in_for_exact_token_out(
        snapshot: &PoolSnapshot,
        exact_token_amount_out: Decimal,
        token_index: usize,
    ) -> Result<Decimal, ExitError> {
        let count = snapshot.token_count();
        check_index(token_index, count)?;
        let mut amounts = vec![Decimal::ZERO; count];
        amounts[token_index] = exact_token_amount_out;
        Self::bpt_in_for_exact_tokens_out(snapshot, &amounts)
    }

    /// Share token that must be burned to receive exactly `amounts_out`
    pub fn bpt_in_for_exact_tokens_out(
        snapshot: &PoolSnapshot,
        amounts_out: &[Decimal],
    ) -> Result<Decimal, ExitError> {
        if amounts_out.iter().all(|a| a.is_zero()) {
            if amounts_out.len() != snapshot.token_count() {
                return Err(ExitError::AmountCountMismatch {
                    expected: snapshot.token_count(),
                    found: amounts_out.len(),
                });
            }
            return Ok(Decimal::ZERO);
        }
        let curve = curve_for(snapshot)?;
        let share_in = curve.share_in_given_exact_tokens_out(amounts_out)?;
        Ok(FixedPoint::round_to_precision(
            share_in.max(Decimal::ZERO),
            snapshot.decimals,
            Rounding::Up,
        )?)
    }

    /// Value lost versus a proportional exit at spot prices, in `[0, 1]`
    ///
    /// Returns exactly one when any requested amount exceeds the reserve it
    /// draws from; the curve is undefined past full depletion.
    pub fn price_impact(
        snapshot: &PoolSnapshot,
        full_amounts: &[Decimal],
        options: PriceImpactOptions,
    ) -> Result<Decimal, ExitError> {
        let count = snapshot.token_count();
        check_index(options.token_index, count)?;
        if full_amounts.len() != count {
            return Err(ExitError::AmountCountMismatch {
                expected: count,
                found: full_amounts.len(),
            });
        }
        for amount in full_amounts {
            FixedPoint::ensure_non_negative(*amount)?;
        }

        let curve = curve_for(snapshot)?;
        if Self::exceeds_reserves(curve.balances(), full_amounts) {
            return Ok(Decimal::ONE);
        }

        let mut zero_impact_share = Decimal::ZERO;
        for (index, amount) in full_amounts.iter().enumerate() {
            if amount.is_zero() {
                continue;
            }
            let spot = curve.spot_share_per_token(index)?;
            zero_impact_share = FixedPoint::add(zero_impact_share, FixedPoint::mul(*amount, spot)?)?;
        }
        if zero_impact_share.is_zero() {
            return Ok(Decimal::ZERO);
        }

        let share_in = match options.share_amount_in {
            Some(share) if !options.exact_out => share,
            _ => curve.share_in_given_exact_tokens_out(full_amounts)?,
        };

        let impact = FixedPoint::sub(FixedPoint::div(share_in, zero_impact_share)?, Decimal::ONE)?;
        Ok(impact.clamp(Decimal::ZERO, Decimal::ONE))
    }

    /// Whether any requested amount is beyond the reserve it draws from
    pub fn amounts_exceed_reserves(
        snapshot: &PoolSnapshot,
        full_amounts: &[Decimal],
    ) -> Result<bool, ExitError> {
        let balances = snapshot.effective_balances()?;
        Ok(Self::exceeds_reserves(&balances, full_amounts))
    }

    fn exceeds_reserves(balances: &[Decimal], amounts: &[Decimal]) -> bool {
        amounts.iter().zip(balances).any(|(amount, balance)| amount > balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exit_types::{Composition, LinearPool, PoolKind, PoolToken, TokenInfo};
    use rust_decimal_macros::dec;

    fn token(address: &str, balance: Decimal, weight: Option<Decimal>) -> PoolToken {
        PoolToken {
            address: address.to_string(),
            decimals: 18,
            balance,
            weight,
        }
    }

    fn weighted_pool(fee: Decimal) -> PoolSnapshot {
        PoolSnapshot {
            id: "weighted".to_string(),
            address: "0xbpt".to_string(),
            kind: PoolKind::Weighted,
            tokens: vec![
                token("0xa", dec!(1000), Some(dec!(0.5))),
                token("0xb", dec!(500), Some(dec!(0.5))),
            ],
            total_supply: dec!(1000),
            swap_fee: fee,
            decimals: 18,
            amplification: None,
            block_number: 1,
            composition: Composition::Plain,
        }
    }

    fn phantom_pool() -> PoolSnapshot {
        PoolSnapshot {
            id: "phantom".to_string(),
            address: "0xbb-a-usd".to_string(),
            kind: PoolKind::StablePhantom,
            tokens: vec![
                token("0xbb-a-dai", dec!(1000), None),
                token("0xbb-a-usdc", dec!(1000), None),
            ],
            total_supply: dec!(2000),
            swap_fee: dec!(0.0001),
            decimals: 18,
            amplification: Some(dec!(1472)),
            block_number: 1,
            composition: Composition::Composed {
                linear_pools: vec![
                    LinearPool {
                        main_token: TokenInfo {
                            address: "0xdai".to_string(),
                            decimals: 18,
                        },
                        price_rate: dec!(1.01),
                    },
                    LinearPool {
                        main_token: TokenInfo {
                            address: "0xusdc".to_string(),
                            decimals: 6,
                        },
                        price_rate: dec!(1.0000005),
                    },
                ],
            },
        }
    }

    #[test]
    fn test_proportional_exit_weighted() {
        let amounts = ExitMath::proportional_exit(&weighted_pool(dec!(0)), dec!(100)).unwrap();
        assert_eq!(amounts, vec![dec!(100), dec!(50)]);
    }

    #[test]
    fn test_proportional_exit_zero_share() {
        let amounts = ExitMath::proportional_exit(&weighted_pool(dec!(0)), Decimal::ZERO).unwrap();
        assert_eq!(amounts, vec![Decimal::ZERO, Decimal::ZERO]);
    }

    #[test]
    fn test_proportional_exit_unwraps_composed_pool() {
        let result = ExitMath::proportional_amounts(&phantom_pool(), dec!(100)).unwrap();
        assert_eq!(result.pool_token_amounts, vec![dec!(50), dec!(50)]);
        // 50 * 1.0000005 = 50.000025, rounded down to 6 decimals
        assert_eq!(result.amounts, vec![dec!(50.5), dec!(50.000025)]);
    }

    #[test]
    fn test_single_asset_exact_out_costs_more_than_spot() {
        let pool = weighted_pool(dec!(0));
        let share_in = ExitMath::bpt_in_for_exact_token_out(&pool, dec!(50), 0).unwrap();
        // Spot value of 50 of token 0 is 50 * 0.5 * 1000 / 1000 = 25 shares
        assert!(share_in > dec!(25));
        // A proportional exit yielding 50 of token 0 burns 50 shares
        assert!(share_in < dec!(50));
    }

    #[test]
    fn test_invalid_token_index() {
        let pool = weighted_pool(dec!(0));
        assert_eq!(
            ExitMath::exact_bpt_in_for_token_out(&pool, dec!(1), 2),
            Err(ExitError::InvalidTokenIndex { index: 2, count: 2 })
        );
        assert!(matches!(
            ExitMath::bpt_in_for_exact_token_out(&pool, dec!(1), 5),
            Err(ExitError::InvalidTokenIndex { index: 5, .. })
        ));
    }

    #[test]
    fn test_zero_amounts_yield_zero() {
        let pool = weighted_pool(dec!(0.003));
        assert_eq!(
            ExitMath::exact_bpt_in_for_token_out(&pool, Decimal::ZERO, 1).unwrap(),
            Decimal::ZERO
        );
        assert_eq!(
            ExitMath::bpt_in_for_exact_token_out(&pool, Decimal::ZERO, 1).unwrap(),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_token_out_rounds_down_to_token_decimals() {
        let out = ExitMath::exact_bpt_in_for_token_out(&phantom_pool(), dec!(10), 1).unwrap();
        assert!(out.scale() <= 6);
        assert!(out > dec!(9.9) && out < dec!(10.1));
    }

    #[test]
    fn test_price_impact_clamps_when_reserve_exceeded() {
        let pool = weighted_pool(dec!(0));
        let impact = ExitMath::price_impact(
            &pool,
            &[Decimal::ZERO, dec!(500.000000000000000001)],
            PriceImpactOptions {
                exact_out: true,
                token_index: 1,
                share_amount_in: None,
            },
        )
        .unwrap();
        assert_eq!(impact, Decimal::ONE);
    }

    #[test]
    fn test_price_impact_of_single_asset_exit() {
        let pool = weighted_pool(dec!(0));
        let impact = ExitMath::price_impact(
            &pool,
            &[dec!(50), Decimal::ZERO],
            PriceImpactOptions {
                exact_out: true,
                token_index: 0,
                share_amount_in: None,
            },
        )
        .unwrap();
        // 25.3206 / 25 - 1
        assert!(impact > dec!(0.0128) && impact < dec!(0.0129));
    }

    #[test]
    fn test_price_impact_uses_known_share_for_max_exit() {
        let pool = weighted_pool(dec!(0));
        let max = ExitMath::exact_bpt_in_for_token_out(&pool, dec!(100), 0).unwrap();
        let impact = ExitMath::price_impact(
            &pool,
            &[max, Decimal::ZERO],
            PriceImpactOptions {
                exact_out: false,
                token_index: 0,
                share_amount_in: Some(dec!(100)),
            },
        )
        .unwrap();
        // 190 tokens are worth 95 shares at spot, 100 were burned
        assert!(impact > dec!(0.0526) && impact < dec!(0.0527));
    }

    #[test]
    fn test_share_amount_beyond_supply() {
        let pool = weighted_pool(dec!(0));
        assert!(matches!(
            ExitMath::exact_bpt_in_for_token_out(&pool, dec!(1001), 0),
            Err(ExitError::ShareAmountExceedsSupply { .. })
        ));
    }
}
