//! Pool state snapshots consumed by the exit math
//!
//! A [`PoolSnapshot`] is an immutable view of one pool at one block. It is
//! constructed fresh on every data refresh and replaced wholesale, never
//! patched in place. Token order is stable: every index-based input or output
//! elsewhere in the workspace refers to positions in [`PoolSnapshot::tokens`].

use crate::common::errors::{MathError, SnapshotError};
use crate::common::fixed_point::{FixedPoint, MAX_DECIMALS};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Share tokens are 18-decimal ERC-20s
pub const DEFAULT_SHARE_DECIMALS: u32 = 18;

/// Tolerance when checking that normalized weights sum to one
const WEIGHT_SUM_TOLERANCE: Decimal = dec!(0.000000001);

/// Bonding curve family of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PoolKind {
    Weighted,
    Stable,
    /// Stable pool whose constituents are linear-pool share tokens
    StablePhantom,
}

impl PoolKind {
    /// Whether the pool follows the stable-swap invariant
    pub fn is_stable(self) -> bool {
        matches!(self, PoolKind::Stable | PoolKind::StablePhantom)
    }
}

/// Address and decimals of a token a caller can hold
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: String,
    pub decimals: u32,
}

/// One constituent of a pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolToken {
    pub address: String,
    pub decimals: u32,
    /// Reserve in token units
    pub balance: Decimal,
    /// Normalized weight, weighted pools only
    #[serde(default)]
    pub weight: Option<Decimal>,
}

impl PoolToken {
    pub fn info(&self) -> TokenInfo {
        TokenInfo {
            address: self.address.clone(),
            decimals: self.decimals,
        }
    }
}

/// Inner linear pool wrapping one constituent of a composed pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearPool {
    /// Underlying asset a withdrawing user receives
    pub main_token: TokenInfo,
    /// Main tokens per inner share token
    pub price_rate: Decimal,
}

/// Whether the pool's constituents are real assets or inner pool shares
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Composition {
    #[default]
    Plain,
    Composed {
        #[serde(rename = "linearPools")]
        linear_pools: Vec<LinearPool>,
    },
}

/// Immutable view of a pool at one block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSnapshot {
    pub id: String,
    /// Address of the pool's own share token
    pub address: String,
    pub kind: PoolKind,
    pub tokens: Vec<PoolToken>,
    /// Total supply of the share token, in token units
    pub total_supply: Decimal,
    /// Swap fee as a fraction (0.003 = 0.3%)
    pub swap_fee: Decimal,
    #[serde(default = "default_share_decimals")]
    pub decimals: u32,
    /// Amplification parameter, stable kinds only
    #[serde(default)]
    pub amplification: Option<Decimal>,
    #[serde(default)]
    pub block_number: u64,
    #[serde(default)]
    pub composition: Composition,
}

fn default_share_decimals() -> u32 {
    DEFAULT_SHARE_DECIMALS
}

impl PoolSnapshot {
    /// Check the structural invariants the exit math relies on
    pub fn validate(&self) -> Result<(), SnapshotError> {
        let count = self.tokens.len();
        if count < 2 {
            return Err(SnapshotError::TooFewTokens { count });
        }
        if self.total_supply.is_sign_negative() && !self.total_supply.is_zero() {
            return Err(SnapshotError::InvalidTotalSupply {
                supply: self.total_supply,
            });
        }
        if self.swap_fee.is_sign_negative() || self.swap_fee >= Decimal::ONE {
            return Err(SnapshotError::InvalidSwapFee { fee: self.swap_fee });
        }
        if self.decimals > MAX_DECIMALS {
            return Err(MathError::UnsupportedDecimals {
                decimals: self.decimals,
                max: MAX_DECIMALS,
            }
            .into());
        }

        for (index, token) in self.tokens.iter().enumerate() {
            if token.balance.is_sign_negative() && !token.balance.is_zero() {
                return Err(SnapshotError::NegativeBalance {
                    index,
                    balance: token.balance,
                });
            }
            if token.decimals > MAX_DECIMALS {
                return Err(SnapshotError::UnsupportedDecimals {
                    index,
                    decimals: token.decimals,
                });
            }
        }

        match self.kind {
            PoolKind::Weighted => {
                let mut sum = Decimal::ZERO;
                for (index, token) in self.tokens.iter().enumerate() {
                    let weight = token
                        .weight
                        .filter(|w| *w > Decimal::ZERO)
                        .ok_or(SnapshotError::MissingWeight { index })?;
                    sum = FixedPoint::add(sum, weight)?;
                }
                if (sum - Decimal::ONE).abs() > WEIGHT_SUM_TOLERANCE {
                    return Err(SnapshotError::InvalidWeights { sum });
                }
            }
            PoolKind::Stable | PoolKind::StablePhantom => {
                if !self.amplification.is_some_and(|amp| amp > Decimal::ZERO) {
                    return Err(SnapshotError::MissingAmplification);
                }
            }
        }

        match &self.composition {
            Composition::Plain if self.kind == PoolKind::StablePhantom => {
                Err(SnapshotError::CompositionMismatch {
                    expected: count,
                    found: 0,
                })
            }
            Composition::Plain => Ok(()),
            Composition::Composed { linear_pools } => {
                if linear_pools.len() != count {
                    return Err(SnapshotError::CompositionMismatch {
                        expected: count,
                        found: linear_pools.len(),
                    });
                }
                for (index, linear) in linear_pools.iter().enumerate() {
                    if linear.price_rate <= Decimal::ZERO {
                        return Err(SnapshotError::InvalidPriceRate {
                            index,
                            rate: linear.price_rate,
                        });
                    }
                }
                Ok(())
            }
        }
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_composed(&self) -> bool {
        matches!(self.composition, Composition::Composed { .. })
    }

    /// Inner price rates of a composed pool, `None` for plain pools
    pub fn price_rates(&self) -> Option<Vec<Decimal>> {
        match &self.composition {
            Composition::Plain => None,
            Composition::Composed { linear_pools } => {
                Some(linear_pools.iter().map(|l| l.price_rate).collect())
            }
        }
    }

    /// Tokens a withdrawing user actually receives, in pool order
    pub fn output_tokens(&self) -> Vec<TokenInfo> {
        match &self.composition {
            Composition::Plain => self.tokens.iter().map(PoolToken::info).collect(),
            Composition::Composed { linear_pools } => {
                linear_pools.iter().map(|l| l.main_token.clone()).collect()
            }
        }
    }

    /// Reserves expressed in the tokens a user receives
    pub fn effective_balances(&self) -> Result<Vec<Decimal>, MathError> {
        match self.price_rates() {
            None => Ok(self.tokens.iter().map(|t| t.balance).collect()),
            Some(rates) => self
                .tokens
                .iter()
                .zip(rates)
                .map(|(token, rate)| FixedPoint::mul(token.balance, rate))
                .collect(),
        }
    }

    /// Normalized weights of a weighted pool, in token order
    pub fn weights(&self) -> Option<Vec<Decimal>> {
        self.tokens.iter().map(|t| t.weight).collect()
    }
}
