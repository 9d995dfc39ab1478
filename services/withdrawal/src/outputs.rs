//! Caller inputs and the derived outputs of a withdrawal session

use exit_types::Decimal;
use serde::{Deserialize, Serialize};

/// Withdrawal mode chosen by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WithdrawalMode {
    #[default]
    Proportional,
    SingleAsset,
}

/// Effective exit mode after comparing the typed amount with the current max
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExitMode {
    Proportional,
    SingleAssetMax,
    SingleAssetExact,
}

/// Mutable inputs owned by a session
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalInput {
    pub mode: WithdrawalMode,
    /// Output token for single-asset exits
    pub token_out_index: usize,
    /// Typed single-asset amount; `None` means "withdraw the max"
    pub amount: Option<Decimal>,
    /// Share token burned by a proportional exit
    pub proportional_share_amount: Decimal,
}

/// Everything derived from one (snapshot, input, tolerance) triple
///
/// Amounts are in the tokens the user receives, in pool order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedOutputs {
    pub mode: ExitMode,
    /// Amounts the exit is expected to pay out
    pub full_amounts: Vec<Decimal>,
    /// Minimum-output guards submitted with the exit
    pub amounts_out: Vec<Decimal>,
    /// Share token to burn; `None` when the request exceeds the pool reserve
    pub bpt_in: Option<Decimal>,
    pub share_balance: Decimal,
    pub price_impact: Decimal,
    pub high_price_impact: bool,
    pub is_exact_output_mode: bool,
    pub is_max_single_asset_withdrawal: bool,
    pub proportional_pool_token_amounts: Vec<Decimal>,
    pub proportional_amounts: Vec<Decimal>,
    /// Max single-asset output per token for the full share balance
    pub single_asset_maxes: Vec<Decimal>,
    pub token_out_pool_balance: Decimal,
    pub amount_exceeds_pool_balance: bool,
    pub has_amounts: bool,
    pub has_bpt: bool,
    /// Exact request burns more share token than the caller holds
    pub bpt_exceeds_balance: bool,
}

/// Fiat display aggregation of the full amounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiatSummary {
    /// Per-token value; `None` where no price is known
    pub amounts: Vec<Option<Decimal>>,
    /// Sum of the priced amounts
    pub total: Decimal,
}
