use std::collections::HashMap;

use gridmart_primitives::{Address, Amount};
use serde::{Deserialize, Serialize};

use crate::types::ExchangeError;

/// Payment value handled by the exchange.
///
/// Every unit received is either forwarded (`payouts`) or retained as
/// platform revenue: `total_received == Σ payouts + retained`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treasury {
    retained: Amount,
    total_fees: Amount,
    total_excess: Amount,
    total_received: Amount,
    payouts: HashMap<Address, Amount>,
}

impl Treasury {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that a sale paying `payment` can be recorded without overflow.
    pub fn can_settle(&self, seller: &Address, payment: Amount, proceeds: Amount) -> Result<(), ExchangeError> {
        self.total_received
            .checked_add(payment)
            .ok_or(ExchangeError::Overflow)?;
        self.retained
            .checked_add(payment - proceeds)
            .ok_or(ExchangeError::Overflow)?;
        self.payouts_of(seller)
            .checked_add(proceeds)
            .ok_or(ExchangeError::Overflow)?;
        Ok(())
    }

    /// Record a sale: keep `fee + excess`, forward `proceeds` to `seller`.
    pub fn settle(
        &mut self,
        seller: Address,
        proceeds: Amount,
        fee: Amount,
        excess: Amount,
    ) -> Result<(), ExchangeError> {
        let payment = proceeds
            .checked_add(fee)
            .and_then(|v| v.checked_add(excess))
            .ok_or(ExchangeError::Overflow)?;
        self.can_settle(&seller, payment, proceeds)?;

        self.total_received += payment;
        self.retained += fee + excess;
        self.total_fees = self.total_fees.saturating_add(fee);
        self.total_excess = self.total_excess.saturating_add(excess);
        *self.payouts.entry(seller).or_insert(0) += proceeds;
        Ok(())
    }

    /// Move retained revenue out to `to`.
    pub fn withdraw(&mut self, to: Address, amount: Amount) -> Result<(), ExchangeError> {
        if amount > self.retained {
            return Err(ExchangeError::InsufficientFees {
                requested: amount,
                available: self.retained,
            });
        }
        let paid = self
            .payouts_of(&to)
            .checked_add(amount)
            .ok_or(ExchangeError::Overflow)?;
        self.retained -= amount;
        self.payouts.insert(to, paid);
        Ok(())
    }

    pub fn retained(&self) -> Amount {
        self.retained
    }

    pub fn total_fees(&self) -> Amount {
        self.total_fees
    }

    pub fn total_excess(&self) -> Amount {
        self.total_excess
    }

    pub fn total_received(&self) -> Amount {
        self.total_received
    }

    pub fn payouts_of(&self, account: &Address) -> Amount {
        self.payouts.get(account).copied().unwrap_or(0)
    }

    pub fn payouts(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.payouts.iter()
    }

    pub fn total_payouts(&self) -> u128 {
        self.payouts.values().map(|v| *v as u128).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seller() -> Address {
        Address::new([5u8; 32])
    }

    fn admin() -> Address {
        Address::new([0xaa; 32])
    }

    #[test]
    fn test_settle_conserves_value() {
        let mut treasury = Treasury::new();
        treasury.settle(seller(), 990, 10, 5).unwrap();
        assert_eq!(treasury.retained(), 15);
        assert_eq!(treasury.payouts_of(&seller()), 990);
        assert_eq!(treasury.total_received(), 1_005);
        assert_eq!(
            treasury.total_payouts() + treasury.retained() as u128,
            treasury.total_received() as u128
        );
    }

    #[test]
    fn test_withdraw_bounded_by_retained() {
        let mut treasury = Treasury::new();
        treasury.settle(seller(), 990, 10, 0).unwrap();
        assert_eq!(
            treasury.withdraw(admin(), 11),
            Err(ExchangeError::InsufficientFees {
                requested: 11,
                available: 10
            })
        );
        treasury.withdraw(admin(), 10).unwrap();
        assert_eq!(treasury.retained(), 0);
        assert_eq!(treasury.payouts_of(&admin()), 10);
        assert_eq!(treasury.total_fees(), 10);
    }

    #[test]
    fn test_settle_overflow_leaves_state() {
        let mut treasury = Treasury::new();
        treasury.settle(seller(), u64::MAX - 1, 1, 0).unwrap();
        let before = treasury.clone();
        assert_eq!(treasury.settle(seller(), 1, 0, 0), Err(ExchangeError::Overflow));
        assert_eq!(treasury, before);
    }
}
