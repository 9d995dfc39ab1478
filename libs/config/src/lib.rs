//! # Pool Exit Configuration
//!
//! Layered configuration for withdrawal quoting: defaults, then an optional
//! TOML file, then `POOLEXIT__`-prefixed environment variables.
//!
//! ## Sections
//!
//! - **`[slippage]`**: `tolerance_bps`, validated to `0..=10000`
//! - **`[price_impact]`**: `high_threshold`, fraction flagging high impact
//! - **`[logging]`**: `level`, default filter for binaries
//!
//! ## Usage
//!
//! ```rust
//! use exit_config::ExitConfig;
//!
//! let config = ExitConfig::default();
//! let tolerance = config.validate().unwrap();
//! assert_eq!(tolerance.bps(), 50);
//! ```

pub mod exit_config;

// Re-export commonly used types
pub use exit_config::{
    load_config, ExitConfig, LoggingSettings, PriceImpactSettings, SlippageSettings, ENV_PREFIX,
    ENV_SEPARATOR,
};
