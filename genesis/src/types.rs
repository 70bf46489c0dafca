use gridmart_exchange::DEFAULT_POINTS_DIVISOR;
use gridmart_primitives::{Address, Amount, Rate};
use serde::{Deserialize, Serialize};

/// An account credited with produced energy at genesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccount {
    pub address: Address,
    /// Liquid energy produced into the account.
    pub energy: Amount,
}

/// Market-wide parameters set at genesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketParams {
    /// Administrator of every component; also the production authority.
    pub owner: Address,
    /// Identity of the exchange component.
    pub exchange: Address,
    /// Base commission rate in whole percent (1 = 1%).
    pub commission_rate: Rate,
    /// Energy units per loyalty point awarded to sellers.
    #[serde(default = "default_points_divisor")]
    pub points_divisor: u64,
}

fn default_points_divisor() -> u64 {
    DEFAULT_POINTS_DIVISOR
}

impl MarketParams {
    pub fn new(owner: Address, exchange: Address) -> Self {
        Self {
            owner,
            exchange,
            commission_rate: 1,
            points_divisor: DEFAULT_POINTS_DIVISOR,
        }
    }
}

/// Genesis configuration error.
#[derive(Debug, thiserror::Error)]
pub enum GenesisError {
    #[error("market id must not be empty")]
    EmptyMarketId,

    #[error("{0} address must not be zero")]
    ZeroAddress(&'static str),

    #[error("exchange address must differ from the owner")]
    ExchangeIsOwner,

    #[error("commission rate {0} outside 1..=100")]
    InvalidCommissionRate(Rate),

    #[error("points divisor must be > 0")]
    ZeroPointsDivisor,

    #[error("tier at index {index} has discount > 100")]
    InvalidDiscount { index: usize },

    #[error("authorized caller at index {index} is the zero address")]
    ZeroAuthorizedCaller { index: usize },

    #[error("duplicate account at index {0}")]
    DuplicateAccount(usize),

    #[error("account at index {index} has zero energy")]
    ZeroEnergy { index: usize },

    #[error("account at index {index} has the zero address")]
    ZeroAccount { index: usize },

    #[error("total genesis energy overflows")]
    EnergyOverflow,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_divisor_defaults_when_missing() {
        let json = format!(
            r#"{{"owner":"{}","exchange":"{}","commission_rate":2}}"#,
            "aa".repeat(32),
            "ee".repeat(32)
        );
        let params: MarketParams = serde_json::from_str(&json).unwrap();
        assert_eq!(params.points_divisor, DEFAULT_POINTS_DIVISOR);
        assert_eq!(params.commission_rate, 2);
    }

    #[test]
    fn test_genesis_account_serde_roundtrip() {
        let acct = GenesisAccount {
            address: Address::new([7u8; 32]),
            energy: 500_000,
        };
        let json = serde_json::to_string(&acct).unwrap();
        let acct2: GenesisAccount = serde_json::from_str(&json).unwrap();
        assert_eq!(acct, acct2);
    }
}
