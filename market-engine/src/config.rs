//! Configuration for the market engine

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Market engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Wallet ledger data directory
    pub ledger_data_dir: PathBuf,

    /// Market store data directory
    pub market_data_dir: PathBuf,

    /// Platform fee rate deducted from the pool at settlement
    /// (0.05 = 5%). Must satisfy `0 <= fee_rate < 1`.
    pub fee_rate: Decimal,

    /// Query configuration
    pub query: QueryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "market-engine".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            ledger_data_dir: PathBuf::from("./data/wallet-ledger"),
            market_data_dir: PathBuf::from("./data/market-engine"),
            fee_rate: Decimal::new(5, 2), // 5%
            query: QueryConfig::default(),
        }
    }
}

/// Listing query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Default page size
    pub default_limit: usize,

    /// Hard cap on page size
    pub max_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: 50,
            max_limit: 500,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(dir) = std::env::var("MARKET_ENGINE_DATA_DIR") {
            config.market_data_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("WALLET_LEDGER_DATA_DIR") {
            config.ledger_data_dir = PathBuf::from(dir);
        }

        if let Ok(rate) = std::env::var("MARKET_ENGINE_FEE_RATE") {
            config.fee_rate = rate
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid fee rate: {}", e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants
    pub fn validate(&self) -> crate::Result<()> {
        if self.fee_rate < Decimal::ZERO || self.fee_rate >= Decimal::ONE {
            return Err(crate::Error::Config(format!(
                "fee_rate must be in [0, 1), got {}",
                self.fee_rate
            )));
        }

        if self.query.default_limit == 0 || self.query.default_limit > self.query.max_limit {
            return Err(crate::Error::Config(
                "query.default_limit must be positive and <= query.max_limit".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.fee_rate, Decimal::new(5, 2));
    }

    #[test]
    fn test_fee_rate_bounds() {
        let mut config = Config::default();
        config.fee_rate = Decimal::ONE;
        assert!(config.validate().is_err());

        config.fee_rate = Decimal::new(-1, 2);
        assert!(config.validate().is_err());

        config.fee_rate = Decimal::ZERO;
        config.validate().unwrap();
    }
}
