//! Exit Configuration Module
//!
//! Provides configuration loading for pool exit quoting.
//! Supports loading from an optional TOML file with environment overrides.

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use exit_amm::{SlippageError, SlippageTolerance};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Prefix for environment overrides, e.g. `POOLEXIT__SLIPPAGE__TOLERANCE_BPS=100`
pub const ENV_PREFIX: &str = "POOLEXIT";

/// Separator between prefix and nested keys in environment overrides
pub const ENV_SEPARATOR: &str = "__";

/// Main exit configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ExitConfig {
    /// Slippage applied to minimum outputs and maximum inputs
    pub slippage: SlippageSettings,

    /// Price impact warning threshold
    pub price_impact: PriceImpactSettings,

    /// Logging settings for binaries
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SlippageSettings {
    pub tolerance_bps: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PriceImpactSettings {
    /// Price impact at or above this fraction is flagged as high
    pub high_threshold: Decimal,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for SlippageSettings {
    fn default() -> Self {
        Self {
            tolerance_bps: SlippageTolerance::default().bps(),
        }
    }
}

impl Default for PriceImpactSettings {
    fn default() -> Self {
        Self {
            high_threshold: dec!(0.01),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ExitConfig {
    /// Load configuration from an optional file with environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            info!("Loading exit config: {:?}", path);
            builder = builder.add_source(File::from(path).required(true));
        }

        // Override with environment variables (POOLEXIT__ prefix)
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let loaded: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        debug!(?loaded, "Exit configuration loaded");
        Ok(loaded)
    }

    /// Validated slippage tolerance
    pub fn slippage_tolerance(&self) -> Result<SlippageTolerance, SlippageError> {
        SlippageTolerance::from_bps(self.slippage.tolerance_bps)
    }

    /// Check every section, returning the validated slippage tolerance
    pub fn validate(&self) -> Result<SlippageTolerance> {
        let tolerance = self
            .slippage_tolerance()
            .context("Invalid [slippage] section")?;

        let threshold = self.price_impact.high_threshold;
        if threshold < Decimal::ZERO || threshold > Decimal::ONE {
            bail!("[price_impact] high_threshold must be within [0, 1], got {threshold}");
        }

        Ok(tolerance)
    }
}

/// Convenience function to load and validate configuration
pub fn load_config(path: Option<&Path>) -> Result<(ExitConfig, SlippageTolerance)> {
    let config = ExitConfig::load(path)?;
    let tolerance = config.validate()?;
    Ok((config, tolerance))
}
