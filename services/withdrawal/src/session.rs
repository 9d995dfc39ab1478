//! Withdrawal session: inputs in, consistent derived outputs out
//!
//! Every mutator builds the next state, recomputes the complete
//! [`DerivedOutputs`] from it, and commits both only when the recompute
//! succeeds. A failed mutation leaves inputs and outputs untouched, so
//! callers never observe outputs that belong to a different input.

use crate::errors::SessionError;
use crate::outputs::{DerivedOutputs, ExitMode, FiatSummary, WithdrawalInput, WithdrawalMode};
use crate::sources::FiatPricer;
use exit_amm::{ExitError, ExitMath, PriceImpactOptions, SlippageEngine, SlippageTolerance};
use exit_types::{Decimal, FixedPoint, PoolSnapshot};
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::{debug, info};

/// Price impact at or above which a withdrawal is flagged
pub const DEFAULT_HIGH_PRICE_IMPACT: Decimal = dec!(0.01);

/// Caller preferences that feed the recompute
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    pub slippage_tolerance: SlippageTolerance,
    pub high_price_impact_threshold: Decimal,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            slippage_tolerance: SlippageTolerance::default(),
            high_price_impact_threshold: DEFAULT_HIGH_PRICE_IMPACT,
        }
    }
}

#[derive(Debug, Clone)]
struct SessionState {
    snapshot: Arc<PoolSnapshot>,
    input: WithdrawalInput,
    share_balance: Decimal,
    settings: SessionSettings,
}

/// One withdrawal flow over one pool
#[derive(Debug)]
pub struct WithdrawalSession {
    state: SessionState,
    derived: DerivedOutputs,
}

impl WithdrawalSession {
    /// Session in proportional mode with nothing to withdraw yet
    ///
    /// Call [`WithdrawalSession::initialize`] once the caller's share
    /// balance is known.
    pub fn new(snapshot: Arc<PoolSnapshot>, settings: SessionSettings) -> Result<Self, SessionError> {
        snapshot.validate()?;
        let state = SessionState {
            snapshot,
            input: WithdrawalInput::default(),
            share_balance: Decimal::ZERO,
            settings,
        };
        let derived = derive(&state)?;
        Ok(Self { state, derived })
    }

    pub fn derived_outputs(&self) -> &DerivedOutputs {
        &self.derived
    }

    pub fn input(&self) -> &WithdrawalInput {
        &self.state.input
    }

    pub fn snapshot(&self) -> &Arc<PoolSnapshot> {
        &self.state.snapshot
    }

    pub fn share_balance(&self) -> Decimal {
        self.state.share_balance
    }

    pub fn settings(&self) -> SessionSettings {
        self.state.settings
    }

    /// Switch mode; clears any typed amount
    pub fn set_mode(&mut self, mode: WithdrawalMode) -> Result<&DerivedOutputs, SessionError> {
        self.update(|state| {
            state.input.mode = mode;
            state.input.amount = None;
            Ok(())
        })
    }

    /// Select the single-asset output token; clears any typed amount
    pub fn set_token_out(&mut self, token_index: usize) -> Result<&DerivedOutputs, SessionError> {
        self.update(|state| {
            let count = state.snapshot.token_count();
            if token_index >= count {
                return Err(ExitError::InvalidTokenIndex {
                    index: token_index,
                    count,
                }
                .into());
            }
            state.input.token_out_index = token_index;
            state.input.amount = None;
            Ok(())
        })
    }

    /// Set the desired single-asset output; `None` withdraws the max
    ///
    /// The amount must fit within the output token's decimals.
    pub fn set_amount(&mut self, amount: Option<Decimal>) -> Result<&DerivedOutputs, SessionError> {
        self.update(|state| {
            if let Some(amount) = amount {
                let tokens = state.snapshot.output_tokens();
                let decimals = tokens[state.input.token_out_index].decimals;
                FixedPoint::scale_to_raw(amount, decimals)?;
            }
            state.input.amount = amount.map(|a| a.normalize());
            Ok(())
        })
    }

    /// Parse and set a typed amount; blank input means "max"
    pub fn set_amount_input(&mut self, typed: &str) -> Result<&DerivedOutputs, SessionError> {
        let amount = FixedPoint::parse_amount(typed)?;
        self.set_amount(amount)
    }

    /// Share token to burn in proportional mode, at most the share balance
    pub fn set_proportional_share_amount(
        &mut self,
        amount: Decimal,
    ) -> Result<&DerivedOutputs, SessionError> {
        self.update(|state| {
            FixedPoint::ensure_non_negative(amount)?;
            if amount > state.share_balance {
                return Err(SessionError::ShareAmountExceedsBalance {
                    amount,
                    balance: state.share_balance,
                });
            }
            state.input.proportional_share_amount = amount;
            Ok(())
        })
    }

    pub fn set_slippage_tolerance(
        &mut self,
        tolerance: SlippageTolerance,
    ) -> Result<&DerivedOutputs, SessionError> {
        self.update(|state| {
            state.settings.slippage_tolerance = tolerance;
            Ok(())
        })
    }

    /// Swap in a fresh snapshot of the same pool
    pub fn replace_snapshot(
        &mut self,
        snapshot: Arc<PoolSnapshot>,
    ) -> Result<&DerivedOutputs, SessionError> {
        snapshot.validate()?;
        info!(
            pool = %snapshot.id,
            block = snapshot.block_number,
            "Replacing pool snapshot"
        );
        self.update(|state| {
            state.snapshot = snapshot;
            Ok(())
        })
    }

    /// Seed the proportional share amount from the current share balance
    ///
    /// Idempotent. A typed single-asset amount survives unless the session
    /// is in proportional mode.
    pub fn initialize(&mut self, share_balance: Decimal) -> Result<&DerivedOutputs, SessionError> {
        FixedPoint::ensure_non_negative(share_balance)?;
        info!(
            pool = %self.state.snapshot.id,
            %share_balance,
            "Initializing withdrawal session"
        );
        self.update(|state| {
            state.share_balance = share_balance;
            state.input.proportional_share_amount = share_balance;
            if state.input.mode == WithdrawalMode::Proportional {
                state.input.amount = None;
            }
            Ok(())
        })
    }

    /// [`WithdrawalSession::initialize`] and clear any typed amount
    pub fn reset(&mut self, share_balance: Decimal) -> Result<&DerivedOutputs, SessionError> {
        FixedPoint::ensure_non_negative(share_balance)?;
        info!(
            pool = %self.state.snapshot.id,
            %share_balance,
            "Resetting withdrawal session"
        );
        self.update(|state| {
            state.share_balance = share_balance;
            state.input.proportional_share_amount = share_balance;
            state.input.amount = None;
            Ok(())
        })
    }

    /// Fiat value of the full amounts, for display only
    pub fn fiat_summary(&self, pricer: &impl FiatPricer) -> FiatSummary {
        let tokens = self.state.snapshot.output_tokens();
        let amounts: Vec<Option<Decimal>> = self
            .derived
            .full_amounts
            .iter()
            .zip(&tokens)
            .map(|(amount, token)| pricer.to_fiat(*amount, &token.address))
            .collect();
        let total = amounts.iter().flatten().sum();
        FiatSummary { amounts, total }
    }

    fn update<F>(&mut self, mutate: F) -> Result<&DerivedOutputs, SessionError>
    where
        F: FnOnce(&mut SessionState) -> Result<(), SessionError>,
    {
        let mut next = self.state.clone();
        mutate(&mut next)?;
        let derived = derive(&next)?;
        debug!(
            pool = %next.snapshot.id,
            mode = ?derived.mode,
            bpt_in = ?derived.bpt_in,
            price_impact = %derived.price_impact,
            "Withdrawal outputs recomputed"
        );
        self.state = next;
        self.derived = derived;
        Ok(&self.derived)
    }
}

/// Pure projection of a session state onto its outputs
fn derive(state: &SessionState) -> Result<DerivedOutputs, SessionError> {
    let snapshot = state.snapshot.as_ref();
    let input = &state.input;
    let tolerance = state.settings.slippage_tolerance;
    let count = snapshot.token_count();
    let index = input.token_out_index;
    if index >= count {
        return Err(ExitError::InvalidTokenIndex { index, count }.into());
    }
    let tokens = snapshot.output_tokens();

    let proportional = ExitMath::proportional_amounts(snapshot, input.proportional_share_amount)?;
    let single_asset_maxes = (0..count)
        .map(|i| ExitMath::exact_bpt_in_for_token_out(snapshot, state.share_balance, i))
        .collect::<Result<Vec<_>, _>>()?;

    let mode = match input.mode {
        WithdrawalMode::Proportional => ExitMode::Proportional,
        WithdrawalMode::SingleAsset => match input.amount {
            Some(amount) if amount != single_asset_maxes[index] => ExitMode::SingleAssetExact,
            _ => ExitMode::SingleAssetMax,
        },
    };
    let exact_out = mode == ExitMode::SingleAssetExact;

    let full_amounts = match mode {
        ExitMode::Proportional => proportional.amounts.clone(),
        ExitMode::SingleAssetMax | ExitMode::SingleAssetExact => {
            let mut amounts = vec![Decimal::ZERO; count];
            amounts[index] = input.amount.unwrap_or(single_asset_maxes[index]);
            amounts
        }
    };

    let token_out_pool_balance = snapshot.effective_balances()?[index];
    let mut amount_exceeds_pool_balance =
        mode != ExitMode::Proportional && full_amounts[index] > token_out_pool_balance;

    // The typed amount of an exact request is itself the guard
    let amounts_out = full_amounts
        .iter()
        .zip(&tokens)
        .map(|(amount, token)| {
            if amount.is_zero() || exact_out {
                Ok(*amount)
            } else {
                SlippageEngine::reduce_by_slippage(*amount, token.decimals, tolerance)
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let bpt_in = match mode {
        ExitMode::Proportional => Some(input.proportional_share_amount),
        ExitMode::SingleAssetMax => Some(state.share_balance),
        ExitMode::SingleAssetExact if amount_exceeds_pool_balance => None,
        ExitMode::SingleAssetExact => {
            match ExitMath::bpt_in_for_exact_token_out(snapshot, full_amounts[index], index) {
                Ok(share) => Some(SlippageEngine::increase_by_slippage(
                    share,
                    snapshot.decimals,
                    tolerance,
                )?),
                // The fee gross-up can push a request at or below the reserve past it
                Err(ExitError::PoolReserveExceeded { .. }) => {
                    amount_exceeds_pool_balance = true;
                    None
                }
                Err(e) => return Err(e.into()),
            }
        }
    };

    let has_amounts = full_amounts.iter().any(|a| *a > Decimal::ZERO);

    let price_impact = if amount_exceeds_pool_balance {
        Decimal::ONE
    } else if !has_amounts || mode == ExitMode::Proportional {
        Decimal::ZERO
    } else {
        let options = PriceImpactOptions {
            exact_out,
            token_index: index,
            share_amount_in: (!exact_out).then_some(state.share_balance),
        };
        match ExitMath::price_impact(snapshot, &full_amounts, options) {
            Ok(impact) => impact,
            Err(ExitError::PoolReserveExceeded { .. }) => {
                amount_exceeds_pool_balance = true;
                Decimal::ONE
            }
            Err(e) => return Err(e.into()),
        }
    };

    Ok(DerivedOutputs {
        mode,
        full_amounts,
        amounts_out,
        bpt_exceeds_balance: bpt_in.is_some_and(|b| b > state.share_balance),
        bpt_in,
        share_balance: state.share_balance,
        high_price_impact: price_impact >= state.settings.high_price_impact_threshold,
        price_impact,
        is_exact_output_mode: exact_out,
        is_max_single_asset_withdrawal: mode == ExitMode::SingleAssetMax,
        proportional_pool_token_amounts: proportional.pool_token_amounts,
        proportional_amounts: proportional.amounts,
        single_asset_maxes,
        token_out_pool_balance,
        amount_exceeds_pool_balance,
        has_amounts,
        has_bpt: state.share_balance > Decimal::ZERO,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use exit_types::{Composition, PoolKind, PoolToken};
    use std::collections::HashMap;

    fn weighted_pool(block_number: u64) -> Arc<PoolSnapshot> {
        Arc::new(PoolSnapshot {
            id: "0xpool".to_string(),
            address: "0xbpt".to_string(),
            kind: PoolKind::Weighted,
            tokens: vec![
                PoolToken {
                    address: "0xa".to_string(),
                    decimals: 18,
                    balance: dec!(1000),
                    weight: Some(dec!(0.5)),
                },
                PoolToken {
                    address: "0xb".to_string(),
                    decimals: 18,
                    balance: dec!(500),
                    weight: Some(dec!(0.5)),
                },
            ],
            total_supply: dec!(1000),
            swap_fee: Decimal::ZERO,
            decimals: 18,
            amplification: None,
            block_number,
            composition: Composition::Plain,
        })
    }

    fn session() -> WithdrawalSession {
        let mut session = WithdrawalSession::new(weighted_pool(1), SessionSettings::default()).unwrap();
        session.initialize(dec!(100)).unwrap();
        session
    }

    struct Prices(HashMap<&'static str, Decimal>);

    impl FiatPricer for Prices {
        fn to_fiat(&self, amount: Decimal, token: &str) -> Option<Decimal> {
            self.0.get(token).map(|price| amount * price)
        }
    }

    #[test]
    fn test_proportional_scenario() {
        let session = session();
        let outputs = session.derived_outputs();

        assert_eq!(outputs.mode, ExitMode::Proportional);
        assert_eq!(outputs.full_amounts, vec![dec!(100), dec!(50)]);
        // 50 bps off each amount
        assert_eq!(outputs.amounts_out, vec![dec!(99.5), dec!(49.75)]);
        assert_eq!(outputs.bpt_in, Some(dec!(100)));
        assert_eq!(outputs.price_impact, Decimal::ZERO);
        assert!(outputs.has_amounts);
        assert!(outputs.has_bpt);
        assert!(!outputs.is_exact_output_mode);
        assert!(!outputs.is_max_single_asset_withdrawal);
    }

    #[test]
    fn test_partial_proportional_share_amount() {
        let mut session = session();
        let outputs = session.set_proportional_share_amount(dec!(10)).unwrap();
        assert_eq!(outputs.full_amounts, vec![dec!(10), dec!(5)]);
        assert_eq!(outputs.bpt_in, Some(dec!(10)));
    }

    #[test]
    fn test_share_amount_above_balance_rejected() {
        let mut session = session();
        let before = session.derived_outputs().clone();

        let err = session.set_proportional_share_amount(dec!(100.1)).unwrap_err();
        assert!(matches!(err, SessionError::ShareAmountExceedsBalance { .. }));
        assert_eq!(session.derived_outputs(), &before);
    }

    #[test]
    fn test_typing_the_max_selects_max_mode() {
        let mut session = session();
        session.set_mode(WithdrawalMode::SingleAsset).unwrap();
        // 1000 * (1 - 0.9^2)
        let max = session.derived_outputs().single_asset_maxes[0];
        assert_eq!(max, dec!(190));

        let outputs = session.set_amount(Some(max)).unwrap();
        assert_eq!(outputs.mode, ExitMode::SingleAssetMax);
        assert!(outputs.is_max_single_asset_withdrawal);

        let one_unit_less = max - dec!(0.000000000000000001);
        let outputs = session.set_amount(Some(one_unit_less)).unwrap();
        assert_eq!(outputs.mode, ExitMode::SingleAssetExact);
        assert!(outputs.is_exact_output_mode);
    }

    #[test]
    fn test_max_mode_burns_full_balance_and_guards_output() {
        let mut session = session();
        let outputs = session.set_mode(WithdrawalMode::SingleAsset).unwrap();

        assert_eq!(outputs.mode, ExitMode::SingleAssetMax);
        assert_eq!(outputs.full_amounts, vec![dec!(190), Decimal::ZERO]);
        assert_eq!(outputs.amounts_out, vec![dec!(189.05), Decimal::ZERO]);
        assert_eq!(outputs.bpt_in, Some(dec!(100)));
        assert!(outputs.price_impact > Decimal::ZERO);
    }

    #[test]
    fn test_exact_mode_pads_share_burn() {
        let mut session = session();
        session.set_mode(WithdrawalMode::SingleAsset).unwrap();
        let outputs = session.set_amount_input("50").unwrap();

        assert_eq!(outputs.mode, ExitMode::SingleAssetExact);
        assert_eq!(outputs.amounts_out, outputs.full_amounts);
        let bpt_in = outputs.bpt_in.unwrap();
        // 1000 * (1 - sqrt(0.95)) ~= 25.3206 before slippage
        assert!(bpt_in > dec!(25.3206));
        assert!(bpt_in < dec!(25.5));
        assert!(!outputs.bpt_exceeds_balance);
        assert!(outputs.price_impact > Decimal::ZERO);
    }

    #[test]
    fn test_exact_request_beyond_balance_is_flagged() {
        let mut session = session();
        session.set_mode(WithdrawalMode::SingleAsset).unwrap();
        let outputs = session.set_amount(Some(dec!(500))).unwrap();

        assert_eq!(outputs.mode, ExitMode::SingleAssetExact);
        assert!(outputs.bpt_exceeds_balance);
        assert!(!outputs.amount_exceeds_pool_balance);
    }

    #[test]
    fn test_request_beyond_reserve_clamps_price_impact() {
        let mut session = session();
        session.set_mode(WithdrawalMode::SingleAsset).unwrap();
        session.set_token_out(1).unwrap();
        let outputs = session.set_amount(Some(dec!(600))).unwrap();

        assert!(outputs.amount_exceeds_pool_balance);
        assert_eq!(outputs.token_out_pool_balance, dec!(500));
        assert_eq!(outputs.price_impact, Decimal::ONE);
        assert!(outputs.high_price_impact);
        assert_eq!(outputs.bpt_in, None);
    }

    #[test]
    fn test_fee_gross_up_beyond_reserve_is_flagged() {
        let mut snapshot = (*weighted_pool(1)).clone();
        snapshot.swap_fee = dec!(0.01);
        let mut session = WithdrawalSession::new(Arc::new(snapshot), SessionSettings::default()).unwrap();
        session.initialize(dec!(100)).unwrap();
        session.set_mode(WithdrawalMode::SingleAsset).unwrap();
        session.set_token_out(1).unwrap();

        // 499.9 fits the 500 reserve, but not once grossed up for the fee
        let outputs = session.set_amount(Some(dec!(499.9))).unwrap();
        assert_eq!(outputs.mode, ExitMode::SingleAssetExact);
        assert!(outputs.amount_exceeds_pool_balance);
        assert_eq!(outputs.bpt_in, None);
        assert_eq!(outputs.price_impact, Decimal::ONE);
        assert!(outputs.high_price_impact);
    }

    #[test]
    fn test_large_reserves_quote_with_slippage() {
        let mut snapshot = (*weighted_pool(1)).clone();
        snapshot.tokens[0].balance = dec!(20000000000);
        snapshot.tokens[1].balance = dec!(10000000000);
        snapshot.total_supply = dec!(10000);
        let mut session = WithdrawalSession::new(Arc::new(snapshot), SessionSettings::default()).unwrap();

        let outputs = session.initialize(dec!(1000)).unwrap();
        assert_eq!(
            outputs.full_amounts,
            vec![dec!(2000000000), dec!(1000000000)]
        );
        // Default 50 bps guard
        assert_eq!(
            outputs.amounts_out,
            vec![dec!(1990000000), dec!(995000000)]
        );
    }

    #[test]
    fn test_switching_token_clears_typed_amount() {
        let mut session = session();
        session.set_mode(WithdrawalMode::SingleAsset).unwrap();
        session.set_amount(Some(dec!(10))).unwrap();

        let outputs = session.set_token_out(1).unwrap();
        assert_eq!(outputs.mode, ExitMode::SingleAssetMax);
        assert_eq!(session.input().amount, None);
    }

    #[test]
    fn test_invalid_token_index_keeps_previous_outputs() {
        let mut session = session();
        let before = session.derived_outputs().clone();

        let err = session.set_token_out(2).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Exit(ExitError::InvalidTokenIndex { index: 2, count: 2 })
        ));
        assert_eq!(session.derived_outputs(), &before);
        assert_eq!(session.input().token_out_index, 0);
    }

    #[test]
    fn test_typed_amount_validation() {
        let mut session = session();
        session.set_mode(WithdrawalMode::SingleAsset).unwrap();

        assert!(session.set_amount_input("-1").is_err());
        assert!(session.set_amount_input("abc").is_err());
        assert!(session.set_amount_input("0.0000000000000000001").is_err());

        let outputs = session.set_amount_input("").unwrap();
        assert_eq!(outputs.mode, ExitMode::SingleAssetMax);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut session = session();
        session.set_mode(WithdrawalMode::SingleAsset).unwrap();
        session.set_amount(Some(dec!(20))).unwrap();

        let once = session.reset(dec!(100)).unwrap().clone();
        let twice = session.reset(dec!(100)).unwrap().clone();
        assert_eq!(once, twice);
        assert_eq!(session.input().amount, None);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_reset_logs_reinitialization() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let mut session = session();
        tracing::subscriber::with_default(subscriber, || {
            session.reset(dec!(60)).unwrap();
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("INFO"));
        assert!(output.contains("Resetting withdrawal session"));
        assert!(output.contains("share_balance=60"));
    }

    #[test]
    fn test_initialize_keeps_single_asset_amount() {
        let mut session = session();
        session.set_mode(WithdrawalMode::SingleAsset).unwrap();
        session.set_amount(Some(dec!(20))).unwrap();

        session.initialize(dec!(80)).unwrap();
        assert_eq!(session.input().amount, Some(dec!(20)));
        assert_eq!(session.input().proportional_share_amount, dec!(80));
        assert_eq!(session.derived_outputs().share_balance, dec!(80));
    }

    #[test]
    fn test_slippage_tolerance_change_recomputes() {
        let mut session = session();
        let outputs = session
            .set_slippage_tolerance(SlippageTolerance::from_bps(100).unwrap())
            .unwrap();
        assert_eq!(outputs.amounts_out, vec![dec!(99), dec!(49.5)]);
    }

    #[test]
    fn test_replace_snapshot() {
        let mut session = session();
        let mut bigger = (*weighted_pool(2)).clone();
        bigger.tokens[0].balance = dec!(2000);

        let outputs = session.replace_snapshot(Arc::new(bigger)).unwrap();
        assert_eq!(outputs.full_amounts, vec![dec!(200), dec!(50)]);
        assert_eq!(session.snapshot().block_number, 2);

        let mut broken = (*weighted_pool(3)).clone();
        broken.tokens[1].weight = None;
        assert!(session.replace_snapshot(Arc::new(broken)).is_err());
        assert_eq!(session.snapshot().block_number, 2);
    }

    #[test]
    fn test_fiat_summary() {
        let session = session();
        let prices = Prices(HashMap::from([("0xa", dec!(2))]));

        let summary = session.fiat_summary(&prices);
        assert_eq!(summary.amounts, vec![Some(dec!(200)), None]);
        assert_eq!(summary.total, dec!(200));
    }
}
