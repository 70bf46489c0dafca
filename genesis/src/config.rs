use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use gridmart_exchange::{MAX_COMMISSION_RATE, MIN_COMMISSION_RATE};
use gridmart_loyalty::{DiscountTier, TierTable};
use gridmart_primitives::{Address, Amount, MAX_DISCOUNT};
use sha2::{Digest, Sha256};

use crate::types::*;

/// The full genesis configuration for a Gridmart market.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GenesisConfig {
    /// Human-readable market identifier.
    pub market_id: String,
    /// Timestamp when the market opens.
    pub genesis_time: DateTime<Utc>,
    pub params: MarketParams,
    /// Discount tiers in storage order.
    #[serde(default)]
    pub tiers: Vec<DiscountTier>,
    /// Identities allowed to credit loyalty points besides the exchange.
    #[serde(default)]
    pub authorized_callers: Vec<Address>,
    /// Initial energy production.
    #[serde(default)]
    pub accounts: Vec<GenesisAccount>,
    /// Hash of the canonical genesis (computed, not trusted from file).
    #[serde(with = "hex_bytes", default)]
    pub genesis_hash: [u8; 32],
}

impl GenesisConfig {
    /// Load a genesis config from a JSON file, or TOML when the path ends in `.toml`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, GenesisError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config: GenesisConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&contents)?,
            _ => serde_json::from_str(&contents)?,
        };
        config.genesis_hash = config.compute_genesis_hash();
        Ok(config)
    }

    /// Parse a TOML document with the same schema as the JSON file.
    pub fn from_toml_str(contents: &str) -> Result<Self, GenesisError> {
        let mut config: GenesisConfig = toml::from_str(contents)?;
        config.genesis_hash = config.compute_genesis_hash();
        Ok(config)
    }

    /// Save the genesis config as JSON, or TOML when the path ends in `.toml`.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), GenesisError> {
        let path = path.as_ref();
        let contents = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::to_string_pretty(self)?,
            _ => serde_json::to_string_pretty(self)?,
        };
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Validate all invariants of the genesis configuration.
    pub fn validate(&self) -> Result<(), GenesisError> {
        if self.market_id.is_empty() {
            return Err(GenesisError::EmptyMarketId);
        }

        let params = &self.params;
        if params.owner.is_zero() {
            return Err(GenesisError::ZeroAddress("owner"));
        }
        if params.exchange.is_zero() {
            return Err(GenesisError::ZeroAddress("exchange"));
        }
        if params.exchange == params.owner {
            return Err(GenesisError::ExchangeIsOwner);
        }
        if !(MIN_COMMISSION_RATE..=MAX_COMMISSION_RATE).contains(&params.commission_rate) {
            return Err(GenesisError::InvalidCommissionRate(params.commission_rate));
        }
        if params.points_divisor == 0 {
            return Err(GenesisError::ZeroPointsDivisor);
        }

        for (index, tier) in self.tiers.iter().enumerate() {
            if tier.discount > MAX_DISCOUNT {
                return Err(GenesisError::InvalidDiscount { index });
            }
        }
        if !self.tier_table().is_ascending() {
            tracing::warn!(
                market_id = %self.market_id,
                "discount tiers are not ascending; higher points may yield a smaller discount"
            );
        }

        for (index, caller) in self.authorized_callers.iter().enumerate() {
            if caller.is_zero() {
                return Err(GenesisError::ZeroAuthorizedCaller { index });
            }
        }

        let mut seen = HashSet::new();
        for (i, acct) in self.accounts.iter().enumerate() {
            if acct.address.is_zero() {
                return Err(GenesisError::ZeroAccount { index: i });
            }
            if !seen.insert(acct.address) {
                return Err(GenesisError::DuplicateAccount(i));
            }
            if acct.energy == 0 {
                return Err(GenesisError::ZeroEnergy { index: i });
            }
        }
        self.total_energy().ok_or(GenesisError::EnergyOverflow)?;

        Ok(())
    }

    /// Tier list as a lookup table.
    pub fn tier_table(&self) -> TierTable {
        let mut table = TierTable::new();
        for tier in &self.tiers {
            table.push(*tier);
        }
        table
    }

    /// Total energy produced at genesis, `None` on overflow.
    pub fn total_energy(&self) -> Option<Amount> {
        self.accounts
            .iter()
            .try_fold(0u64, |acc, a| acc.checked_add(a.energy))
    }

    /// Compute a SHA-256 hash of the canonical JSON representation.
    pub fn compute_genesis_hash(&self) -> [u8; 32] {
        let canonical = CanonicalGenesis {
            market_id: &self.market_id,
            genesis_time: &self.genesis_time,
            params: &self.params,
            tiers: &self.tiers,
            authorized_callers: &self.authorized_callers,
            accounts: &self.accounts,
        };
        let json = serde_json::to_string(&canonical).expect("genesis serialization should not fail");
        let digest = Sha256::digest(json.as_bytes());
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&digest);
        hash
    }

    /// A development market: fixed owner/exchange identities, the standard
    /// three discount tiers, and four funded producers.
    pub fn default_devnet() -> Self {
        let accounts: Vec<GenesisAccount> = (1..=4)
            .map(|i| {
                let mut bytes = [0u8; 32];
                bytes[0] = i;
                GenesisAccount {
                    address: Address::new(bytes),
                    energy: 1_000_000,
                }
            })
            .collect();

        let mut config = GenesisConfig {
            market_id: "gridmart-devnet-1".to_string(),
            genesis_time: Utc::now(),
            params: MarketParams::new(Address::new([0xaa; 32]), Address::new([0xee; 32])),
            tiers: vec![
                DiscountTier { threshold: 1_000, discount: 5 },
                DiscountTier { threshold: 5_000, discount: 8 },
                DiscountTier { threshold: 10_000, discount: 10 },
            ],
            authorized_callers: Vec::new(),
            accounts,
            genesis_hash: [0u8; 32],
        };
        config.genesis_hash = config.compute_genesis_hash();
        config
    }
}

/// Internal type for canonical hashing (excludes genesis_hash field).
#[derive(serde::Serialize)]
struct CanonicalGenesis<'a> {
    market_id: &'a str,
    genesis_time: &'a DateTime<Utc>,
    params: &'a MarketParams,
    tiers: &'a [DiscountTier],
    authorized_callers: &'a [Address],
    accounts: &'a [GenesisAccount],
}

/// Serializes the genesis hash as a hex string.
mod hex_bytes {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        if bytes.len() != 32 {
            return Err(serde::de::Error::custom(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(arr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn fixed_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn default_devnet_is_valid() {
        let config = GenesisConfig::default_devnet();
        config.validate().unwrap();
        assert_eq!(config.accounts.len(), 4);
        assert_eq!(config.tiers.len(), 3);
        assert_eq!(config.total_energy(), Some(4_000_000));
        assert!(config.tier_table().is_ascending());
    }

    #[test]
    fn genesis_hash_is_deterministic() {
        let mut c1 = GenesisConfig::default_devnet();
        let mut c2 = c1.clone();
        c1.genesis_time = fixed_time();
        c2.genesis_time = fixed_time();
        assert_eq!(c1.compute_genesis_hash(), c2.compute_genesis_hash());
        assert_ne!(c1.compute_genesis_hash(), [0u8; 32]);
    }

    #[test]
    fn genesis_hash_changes_with_tiers() {
        let mut c1 = GenesisConfig::default_devnet();
        c1.genesis_time = fixed_time();
        let h1 = c1.compute_genesis_hash();

        let mut c2 = c1.clone();
        c2.tiers.pop();
        assert_ne!(h1, c2.compute_genesis_hash());
    }

    #[test]
    fn validate_zero_owner_fails() {
        let mut config = GenesisConfig::default_devnet();
        config.params.owner = Address::ZERO;
        assert!(matches!(
            config.validate(),
            Err(GenesisError::ZeroAddress("owner"))
        ));
    }

    #[test]
    fn validate_exchange_is_owner_fails() {
        let mut config = GenesisConfig::default_devnet();
        config.params.exchange = config.params.owner;
        assert!(matches!(config.validate(), Err(GenesisError::ExchangeIsOwner)));
    }

    #[test]
    fn validate_commission_bounds() {
        let mut config = GenesisConfig::default_devnet();
        config.params.commission_rate = 0;
        assert!(matches!(
            config.validate(),
            Err(GenesisError::InvalidCommissionRate(0))
        ));
        config.params.commission_rate = 101;
        assert!(matches!(
            config.validate(),
            Err(GenesisError::InvalidCommissionRate(101))
        ));
    }

    #[test]
    fn validate_bad_discount_fails() {
        let mut config = GenesisConfig::default_devnet();
        config.tiers[2].discount = 120;
        assert!(matches!(
            config.validate(),
            Err(GenesisError::InvalidDiscount { index: 2 })
        ));
    }

    #[test]
    fn validate_unsorted_tiers_is_allowed() {
        let mut config = GenesisConfig::default_devnet();
        config.tiers.reverse();
        config.validate().unwrap();
    }

    #[test]
    fn validate_duplicate_accounts_fails() {
        let mut config = GenesisConfig::default_devnet();
        config.accounts[1].address = config.accounts[0].address;
        assert!(matches!(
            config.validate(),
            Err(GenesisError::DuplicateAccount(1))
        ));
    }

    #[test]
    fn validate_zero_energy_fails() {
        let mut config = GenesisConfig::default_devnet();
        config.accounts[3].energy = 0;
        assert!(matches!(
            config.validate(),
            Err(GenesisError::ZeroEnergy { index: 3 })
        ));
    }

    #[test]
    fn validate_energy_overflow_fails() {
        let mut config = GenesisConfig::default_devnet();
        config.accounts[0].energy = u64::MAX;
        assert!(matches!(config.validate(), Err(GenesisError::EnergyOverflow)));
    }

    #[test]
    fn serde_roundtrip_keeps_hash() {
        let config = GenesisConfig::default_devnet();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let config2: GenesisConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.genesis_hash, config2.genesis_hash);
        assert_eq!(config.params, config2.params);
    }

    #[test]
    fn toml_document_parses() {
        let doc = format!(
            r#"
market_id = "gridmart-toml"
genesis_time = "2025-01-01T00:00:00Z"

[params]
owner = "{owner}"
exchange = "{exchange}"
commission_rate = 2

[[tiers]]
threshold = 1000
discount = 5

[[accounts]]
address = "{producer}"
energy = 5000
"#,
            owner = "aa".repeat(32),
            exchange = "ee".repeat(32),
            producer = "01".repeat(32),
        );
        let config = GenesisConfig::from_toml_str(&doc).unwrap();
        config.validate().unwrap();
        assert_eq!(config.params.commission_rate, 2);
        assert_eq!(config.params.points_divisor, 10);
        assert_eq!(config.tiers, vec![DiscountTier { threshold: 1000, discount: 5 }]);
        assert_eq!(config.accounts[0].energy, 5000);
        assert_ne!(config.genesis_hash, [0u8; 32]);
    }

    #[test]
    fn file_roundtrip() {
        let config = GenesisConfig::default_devnet();
        let dir = env::temp_dir().join(format!("gridmart_genesis_test_{}", std::process::id()));
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("genesis.json");

        config.to_file(&path).unwrap();
        let loaded = GenesisConfig::from_file(&path).unwrap();

        assert_eq!(config.market_id, loaded.market_id);
        assert_eq!(config.accounts, loaded.accounts);
        assert_eq!(config.compute_genesis_hash(), loaded.compute_genesis_hash());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn toml_file_roundtrip() {
        let config = GenesisConfig::default_devnet();
        let dir = env::temp_dir().join(format!("gridmart_genesis_toml_{}", std::process::id()));
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("genesis.toml");

        config.to_file(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("market_id = "));

        let loaded = GenesisConfig::from_file(&path).unwrap();
        assert_eq!(config.market_id, loaded.market_id);
        assert_eq!(config.params, loaded.params);
        assert_eq!(config.tiers, loaded.tiers);
        assert_eq!(config.accounts, loaded.accounts);
        assert_eq!(config.genesis_time, loaded.genesis_time);
        assert_eq!(config.genesis_hash, loaded.genesis_hash);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
