use std::sync::Arc;

use parking_lot::RwLock;

use crate::marketplace::Marketplace;
use crate::operation::Operation;
use crate::types::Receipt;

/// Cloneable handle for submitting operations from many threads.
///
/// Writers are serialized by the lock, so two buyers racing for the same
/// listing are applied one after the other and the second one sees the
/// listing already inactive.
#[derive(Debug, Clone)]
pub struct MarketHandle {
    inner: Arc<RwLock<Marketplace>>,
}

impl MarketHandle {
    pub fn new(market: Marketplace) -> Self {
        Self {
            inner: Arc::new(RwLock::new(market)),
        }
    }

    pub fn apply(&self, op: Operation) -> Receipt {
        self.inner.write().apply(op)
    }

    /// Run `f` with exclusive access; nothing else is applied meanwhile.
    pub fn write<T>(&self, f: impl FnOnce(&mut Marketplace) -> T) -> T {
        f(&mut self.inner.write())
    }

    pub fn read<T>(&self, f: impl FnOnce(&Marketplace) -> T) -> T {
        f(&self.inner.read())
    }

    /// Copy of the current market state.
    pub fn snapshot(&self) -> Marketplace {
        self.inner.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridmart_primitives::Address;

    #[test]
    fn test_clones_share_state() {
        let owner = Address::new([0xaa; 32]);
        let market = Marketplace::new(owner, Address::new([0xee; 32]), 1).unwrap();
        let a = MarketHandle::new(market);
        let b = a.clone();

        let receipt = a.apply(Operation::ProduceEnergy {
            admin: owner,
            account: Address::new([1u8; 32]),
            amount: 50,
        });
        assert!(receipt.success);
        assert_eq!(b.read(|m| m.balance_of(&Address::new([1u8; 32]))), 50);
        assert_eq!(b.snapshot().state_root(), a.read(|m| m.state_root()));
    }
}
