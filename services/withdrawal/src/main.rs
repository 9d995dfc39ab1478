//! Withdrawal Quote CLI
//!
//! Quotes a pool exit from a JSON fixture: loads configuration, drives a
//! withdrawal flow over the fixture, applies the requested inputs, and
//! prints the derived outputs as JSON.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::info;

use exit_config::load_config;
use exit_types::Decimal;
use withdrawal::{
    DerivedOutputs, FiatSummary, JsonFileSource, SessionSettings, WithdrawalFlow, WithdrawalMode,
};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "withdraw_quote")]
#[command(about = "Quote a liquidity pool withdrawal")]
struct Args {
    /// Pool fixture (JSON) with pools, balances, and prices
    #[arg(short, long)]
    pool: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pool id within the fixture; defaults to the first pool
    #[arg(long)]
    pool_id: Option<String>,

    /// Account whose share balance is withdrawn; defaults to the fixture's
    #[arg(long)]
    account: Option<String>,

    #[arg(short, long, value_enum, default_value_t = ModeArg::Proportional)]
    mode: ModeArg,

    /// Output token for single-asset withdrawals; defaults to the first
    #[arg(short, long)]
    token_index: Option<usize>,

    /// Desired single-asset output; omitted means the max
    #[arg(short, long)]
    amount: Option<String>,

    /// Share token to burn in proportional mode; defaults to the full balance
    #[arg(short, long)]
    share_amount: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Proportional,
    Single,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Quote<'a> {
    pool_id: &'a str,
    account: &'a str,
    block_number: u64,
    outputs: &'a DerivedOutputs,
    fiat: FiatSummary,
}

impl Args {
    /// Reject flags the selected mode would not apply
    fn check_mode_flags(&self) -> Result<()> {
        match self.mode {
            ModeArg::Proportional => {
                if self.amount.is_some() {
                    bail!("--amount requires --mode single");
                }
                if self.token_index.is_some() {
                    bail!("--token-index requires --mode single");
                }
            }
            ModeArg::Single => {
                if self.share_amount.is_some() {
                    bail!("--share-amount applies only to --mode proportional");
                }
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    args.check_mode_flags()?;

    let (config, slippage_tolerance) = load_config(args.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("withdraw_quote={}", config.logging.level).parse()?)
                .add_directive(format!("withdrawal={}", config.logging.level).parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Config file: {:?}", args.config);
    info!("Pool fixture: {:?}", args.pool);

    let source = JsonFileSource::load(&args.pool)
        .await
        .context("Failed to load pool fixture")?;
    let pool_id = args
        .pool_id
        .clone()
        .or_else(|| source.default_pool_id().map(str::to_string))
        .context("Fixture contains no pools")?;
    let account = args
        .account
        .clone()
        .or_else(|| source.default_account().map(str::to_string))
        .context("No account given and fixture names none")?;

    let settings = SessionSettings {
        slippage_tolerance,
        high_price_impact_threshold: config.price_impact.high_threshold,
    };

    // Fixture data is local, so the flow is ready immediately
    let (ready_tx, ready_rx) = watch::channel(false);
    ready_tx.send(true).context("Readiness channel closed")?;

    let mut flow = WithdrawalFlow::start(
        source.clone(),
        source.clone(),
        ready_rx,
        pool_id.as_str(),
        account.as_str(),
        settings,
    )
    .await
    .context("Failed to start withdrawal flow")?;

    let session = flow.session_mut();
    match args.mode {
        ModeArg::Proportional => {
            if let Some(share_amount) = args.share_amount {
                session.set_proportional_share_amount(share_amount)?;
            }
        }
        ModeArg::Single => {
            session.set_mode(WithdrawalMode::SingleAsset)?;
            session.set_token_out(args.token_index.unwrap_or_default())?;
            if let Some(amount) = &args.amount {
                session.set_amount_input(amount)?;
            }
        }
    }

    let session = flow.session();
    let quote = Quote {
        pool_id: &pool_id,
        account: flow.account(),
        block_number: session.snapshot().block_number,
        outputs: session.derived_outputs(),
        fiat: session.fiat_summary(&source),
    };
    println!("{}", serde_json::to_string_pretty(&quote)?);

    Ok(())
}
