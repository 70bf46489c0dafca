use gridmart_energy::LedgerError;
use gridmart_exchange::ExchangeError;
use gridmart_genesis::GenesisError;
use gridmart_loyalty::LoyaltyError;
use gridmart_primitives::{Address, Amount};
use serde::{Deserialize, Serialize};

use crate::operation::Outcome;

/// Errors surfaced by the market coordinator.
///
/// Component failures are wrapped unchanged so callers can match on the
/// specific kind (e.g. `MarketError::Exchange(ExchangeError::ListingInactive(_))`).
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("loyalty: {0}")]
    Loyalty(#[from] LoyaltyError),

    #[error("exchange: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("genesis: {0}")]
    Genesis(#[from] GenesisError),

    #[error("caller {0} is not authorized for this operation")]
    Unauthorized(Address),
}

/// Result of applying one operation through [`crate::Marketplace::apply`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    /// Position of the operation in the market's history, counting failures.
    pub index: u64,
    pub operation: String,
    pub success: bool,
    pub outcome: Option<Outcome>,
    pub error: Option<String>,
    /// Sequence numbers of the notifications this operation published.
    pub notifications: Vec<u64>,
}

/// Where every unit of produced energy currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplySummary {
    pub produced: Amount,
    pub liquid: u128,
    pub bound: u128,
}

impl SupplySummary {
    /// Σ liquid + Σ bound == Σ produced.
    pub fn is_conserved(&self) -> bool {
        self.liquid + self.bound == self.produced as u128
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supply_summary_conservation() {
        let ok = SupplySummary {
            produced: 1_000,
            liquid: 600,
            bound: 400,
        };
        assert!(ok.is_conserved());
        let broken = SupplySummary { liquid: 601, ..ok };
        assert!(!broken.is_conserved());
    }

    #[test]
    fn test_wrapped_error_message() {
        let err: MarketError = ExchangeError::ListingInactive(3).into();
        assert_eq!(err.to_string(), "exchange: listing for certificate 3 is inactive");
    }
}
