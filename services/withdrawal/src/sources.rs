//! Contracts for the external collaborators a withdrawal depends on
//!
//! Pool state and wallet balances arrive asynchronously; fiat conversion is
//! a synchronous lookup used for display only.

use crate::errors::SourceError;
use async_trait::async_trait;
use exit_types::{Decimal, FixedPoint, PoolSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Supplier of pool snapshots
#[async_trait]
pub trait PoolSource: Send + Sync {
    /// Current state of `pool_id`
    async fn fetch_pool(&self, pool_id: &str) -> Result<PoolSnapshot, SourceError>;
}

/// Supplier of wallet balances
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Holding of `token` by `account`, in token units
    async fn balance(&self, token: &str, account: &str) -> Result<Decimal, SourceError>;
}

/// Currency conversion for display aggregation
pub trait FiatPricer {
    /// Fiat value of `amount` of `token`, `None` when no price is known
    fn to_fiat(&self, amount: Decimal, token: &str) -> Option<Decimal>;
}

/// On-disk fixture layout read by [`JsonFileSource`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Fixture {
    /// Account quoted when none is given
    pub account: Option<String>,
    pub pools: Vec<PoolSnapshot>,
    /// account -> token -> balance
    pub balances: HashMap<String, HashMap<String, Decimal>>,
    /// token -> fiat price per unit
    pub prices: HashMap<String, Decimal>,
}

/// Pool, balance, and price source backed by a JSON fixture file
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    fixture: Fixture,
}

impl JsonFileSource {
    pub fn new(fixture: Fixture) -> Self {
        Self { fixture }
    }

    /// Read and parse a fixture file
    pub async fn load(path: &Path) -> Result<Self, SourceError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SourceError::Unavailable(format!("{}: {e}", path.display())))?;
        let fixture: Fixture = serde_json::from_str(&content)
            .map_err(|e| SourceError::Unavailable(format!("{}: {e}", path.display())))?;
        debug!(pools = fixture.pools.len(), "Loaded fixture {:?}", path);
        Ok(Self::new(fixture))
    }

    pub fn default_account(&self) -> Option<&str> {
        self.fixture.account.as_deref()
    }

    pub fn default_pool_id(&self) -> Option<&str> {
        self.fixture.pools.first().map(|p| p.id.as_str())
    }
}

#[async_trait]
impl PoolSource for JsonFileSource {
    async fn fetch_pool(&self, pool_id: &str) -> Result<PoolSnapshot, SourceError> {
        self.fixture
            .pools
            .iter()
            .find(|p| p.id == pool_id)
            .cloned()
            .ok_or_else(|| SourceError::PoolNotFound {
                pool_id: pool_id.to_string(),
            })
    }
}

#[async_trait]
impl BalanceSource for JsonFileSource {
    async fn balance(&self, token: &str, account: &str) -> Result<Decimal, SourceError> {
        // Missing entries are empty wallets
        Ok(self
            .fixture
            .balances
            .get(account)
            .and_then(|tokens| tokens.get(token))
            .copied()
            .unwrap_or(Decimal::ZERO))
    }
}

impl FiatPricer for JsonFileSource {
    fn to_fiat(&self, amount: Decimal, token: &str) -> Option<Decimal> {
        let price = self.fixture.prices.get(token)?;
        FixedPoint::mul(amount, *price).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const FIXTURE: &str = r#"{
        "account": "0xlp",
        "pools": [{
            "id": "0xpool",
            "address": "0xbpt",
            "kind": "weighted",
            "tokens": [
                { "address": "0xa", "decimals": 18, "balance": "1000", "weight": "0.5" },
                { "address": "0xb", "decimals": 6, "balance": "500", "weight": "0.5" }
            ],
            "totalSupply": "1000",
            "swapFee": "0.003",
            "blockNumber": 7
        }],
        "balances": { "0xlp": { "0xbpt": "100" } },
        "prices": { "0xa": "2" }
    }"#;

    fn source() -> JsonFileSource {
        JsonFileSource::new(serde_json::from_str(FIXTURE).unwrap())
    }

    #[tokio::test]
    async fn test_fetch_known_and_unknown_pool() {
        let source = source();
        let pool = source.fetch_pool("0xpool").await.unwrap();
        assert_eq!(pool.block_number, 7);
        assert_eq!(pool.tokens[1].decimals, 6);

        let err = source.fetch_pool("0xmissing").await.unwrap_err();
        assert!(matches!(err, SourceError::PoolNotFound { .. }));
    }

    #[tokio::test]
    async fn test_balances_default_to_zero() {
        let source = source();
        assert_eq!(source.balance("0xbpt", "0xlp").await.unwrap(), dec!(100));
        assert_eq!(source.balance("0xbpt", "0xother").await.unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_fiat_conversion() {
        let source = source();
        assert_eq!(source.to_fiat(dec!(3), "0xa"), Some(dec!(6)));
        assert_eq!(source.to_fiat(dec!(3), "0xb"), None);
        assert_eq!(source.default_account(), Some("0xlp"));
        assert_eq!(source.default_pool_id(), Some("0xpool"));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.json");
        std::fs::write(&path, FIXTURE).unwrap();

        let source = JsonFileSource::load(&path).await.unwrap();
        assert!(source.fetch_pool("0xpool").await.is_ok());

        let missing = JsonFileSource::load(&dir.path().join("absent.json")).await;
        assert!(matches!(missing, Err(SourceError::Unavailable(_))));
    }
}
