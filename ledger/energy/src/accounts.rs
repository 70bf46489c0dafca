use gridmart_primitives::Amount;
use serde::{Deserialize, Serialize};

use crate::types::LedgerError;

/// Per-account liquid energy.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountState {
    pub balance: Amount,
}

impl AccountState {
    pub fn new(balance: Amount) -> Self {
        Self { balance }
    }

    /// Subtract `amount` from balance. Fails if insufficient.
    pub fn debit(&mut self, amount: Amount) -> Result<(), LedgerError> {
        if self.balance < amount {
            return Err(LedgerError::InsufficientBalance {
                needed: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        Ok(())
    }

    /// Add `amount` to balance. Fails on overflow.
    pub fn credit(&mut self, amount: Amount) -> Result<(), LedgerError> {
        self.balance = self.balance.checked_add(amount).ok_or(LedgerError::Overflow)?;
        Ok(())
    }
}
