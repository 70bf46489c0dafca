use chrono::{DateTime, Utc};
use gridmart_loyalty::DiscountTier;
use gridmart_primitives::{Address, Amount, DiscountPercent, Points, Rate};

use crate::config::GenesisConfig;
use crate::types::*;

/// Builder for constructing a `GenesisConfig` step by step.
pub struct GenesisBuilder {
    market_id: String,
    genesis_time: DateTime<Utc>,
    params: MarketParams,
    tiers: Vec<DiscountTier>,
    authorized_callers: Vec<Address>,
    accounts: Vec<GenesisAccount>,
}

impl GenesisBuilder {
    /// Start building a genesis config for the given market.
    pub fn new(market_id: impl Into<String>, owner: Address, exchange: Address) -> Self {
        Self {
            market_id: market_id.into(),
            genesis_time: Utc::now(),
            params: MarketParams::new(owner, exchange),
            tiers: Vec::new(),
            authorized_callers: Vec::new(),
            accounts: Vec::new(),
        }
    }

    pub fn with_genesis_time(mut self, time: DateTime<Utc>) -> Self {
        self.genesis_time = time;
        self
    }

    pub fn with_commission_rate(mut self, rate: Rate) -> Self {
        self.params.commission_rate = rate;
        self
    }

    pub fn with_points_divisor(mut self, divisor: u64) -> Self {
        self.params.points_divisor = divisor;
        self
    }

    /// Append a discount tier; order of calls is storage order.
    pub fn with_tier(mut self, threshold: Points, discount: DiscountPercent) -> Self {
        self.tiers.push(DiscountTier { threshold, discount });
        self
    }

    pub fn with_authorized_caller(mut self, identity: Address) -> Self {
        self.authorized_callers.push(identity);
        self
    }

    /// Add an account with produced energy.
    pub fn with_account(mut self, address: Address, energy: Amount) -> Self {
        self.accounts.push(GenesisAccount { address, energy });
        self
    }

    /// Build the final genesis configuration.
    /// Validates all invariants before returning.
    pub fn build(self) -> Result<GenesisConfig, GenesisError> {
        let mut config = GenesisConfig {
            market_id: self.market_id,
            genesis_time: self.genesis_time,
            params: self.params,
            tiers: self.tiers,
            authorized_callers: self.authorized_callers,
            accounts: self.accounts,
            genesis_hash: [0u8; 32],
        };

        config.validate()?;
        config.genesis_hash = config.compute_genesis_hash();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Address {
        Address::new([0xaa; 32])
    }

    fn exchange() -> Address {
        Address::new([0xee; 32])
    }

    #[test]
    fn build_valid_config() {
        let config = GenesisBuilder::new("gridmart-test", owner(), exchange())
            .with_commission_rate(2)
            .with_tier(1000, 5)
            .with_tier(5000, 8)
            .with_authorized_caller(Address::new([0x0c; 32]))
            .with_account(Address::new([1u8; 32]), 10_000)
            .build()
            .unwrap();
        assert_eq!(config.params.commission_rate, 2);
        assert_eq!(config.tiers.len(), 2);
        assert_eq!(config.authorized_callers.len(), 1);
        assert_ne!(config.genesis_hash, [0u8; 32]);
    }

    #[test]
    fn build_rejects_invalid_config() {
        let result = GenesisBuilder::new("gridmart-test", owner(), exchange())
            .with_tier(1000, 101)
            .build();
        assert!(matches!(result, Err(GenesisError::InvalidDiscount { index: 0 })));

        let result = GenesisBuilder::new("", owner(), exchange()).build();
        assert!(matches!(result, Err(GenesisError::EmptyMarketId)));
    }
}
