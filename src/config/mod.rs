//! Deployment parameters for the token.
//!
//! Amounts are written in whole tokens (`"20000"`, `"0.5"`) and scaled by
//! `decimals` when the config is resolved.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    ledger::Amount,
    units::{parse_units, UnitsError, MAX_DECIMALS},
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid {field}: {source}")]
    Amount {
        field: &'static str,
        #[source]
        source: UnitsError,
    },
    #[error("decimals must be at most 38, got {0}")]
    Decimals(u8),
    #[error("total supply must be positive")]
    ZeroSupply,
    #[error("tax fee must be between 0 and 100, got {0}")]
    TaxFee(u8),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TokenConfig {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: String,
    pub tax_fee_percent: u8,
    pub max_tx_amount: String,
    pub max_wallet_amount: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            name: "MyToken".to_string(),
            symbol: "MTK".to_string(),
            decimals: 18,
            total_supply: "1000000".to_string(),
            tax_fee_percent: 5,
            max_tx_amount: "20000".to_string(),
            max_wallet_amount: "20000".to_string(),
        }
    }
}

/// Validated parameters with every amount in base units.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenParams {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: Amount,
    pub tax_fee_percent: u8,
    pub max_tx_amount: Amount,
    pub max_wallet_amount: Amount,
}

impl TokenConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn resolve(&self) -> Result<TokenParams, ConfigError> {
        if self.decimals > MAX_DECIMALS {
            return Err(ConfigError::Decimals(self.decimals));
        }
        if self.tax_fee_percent > 100 {
            return Err(ConfigError::TaxFee(self.tax_fee_percent));
        }
        let amount = |field: &'static str, text: &str| {
            parse_units(text, self.decimals).map_err(|source| ConfigError::Amount { field, source })
        };
        let total_supply = amount("total_supply", &self.total_supply)?;
        if total_supply == 0 {
            return Err(ConfigError::ZeroSupply);
        }
        Ok(TokenParams {
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            decimals: self.decimals,
            total_supply,
            tax_fee_percent: self.tax_fee_percent,
            max_tx_amount: amount("max_tx_amount", &self.max_tx_amount)?,
            max_wallet_amount: amount("max_wallet_amount", &self.max_wallet_amount)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const ETHER: Amount = 1_000_000_000_000_000_000;

    #[test]
    fn default_config_resolves() {
        let params = TokenConfig::default().resolve().unwrap();
        assert_eq!(params.total_supply, 1_000_000 * ETHER);
        assert_eq!(params.tax_fee_percent, 5);
        assert_eq!(params.max_tx_amount, 20_000 * ETHER);
        assert_eq!(params.max_wallet_amount, 20_000 * ETHER);
        assert_eq!(params.decimals, 18);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "symbol": "TAX", "tax_fee_percent": 10, "max_tx_amount": "500.5" }}"#)
            .unwrap();
        let config = TokenConfig::load(file.path()).unwrap();
        assert_eq!(config.symbol, "TAX");
        assert_eq!(config.name, "MyToken");
        let params = config.resolve().unwrap();
        assert_eq!(params.tax_fee_percent, 10);
        assert_eq!(params.max_tx_amount, 500 * ETHER + ETHER / 2);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = serde_json::from_str::<TokenConfig>(r#"{ "taxFee": 3 }"#).unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn invalid_values_are_reported() {
        let config = TokenConfig {
            tax_fee_percent: 101,
            ..TokenConfig::default()
        };
        assert!(matches!(config.resolve(), Err(ConfigError::TaxFee(101))));

        let config = TokenConfig {
            total_supply: "0".into(),
            ..TokenConfig::default()
        };
        assert!(matches!(config.resolve(), Err(ConfigError::ZeroSupply)));

        let config = TokenConfig {
            max_wallet_amount: "lots".into(),
            ..TokenConfig::default()
        };
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::Amount { field: "max_wallet_amount", .. })
        ));

        let config = TokenConfig {
            decimals: 40,
            ..TokenConfig::default()
        };
        assert!(matches!(config.resolve(), Err(ConfigError::Decimals(40))));
    }
}
