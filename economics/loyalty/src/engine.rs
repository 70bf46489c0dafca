use std::collections::{HashMap, HashSet};

use gridmart_primitives::{
    Address, Component, DiscountPercent, Event, EventOutbox, Points, Rate, TierChange,
};
use tracing::{debug, info};

use crate::tiers::{DiscountTier, TierTable};
use crate::types::LoyaltyError;

/// Loyalty points per account and the discount-tier table that prices
/// commissions from them.
#[derive(Debug, Clone)]
pub struct LoyaltyEngine {
    /// Full administrative rights; implicitly authorized to credit points.
    owner: Address,
    authorized: HashSet<Address>,
    points: HashMap<Address, Points>,
    tiers: TierTable,
    events: EventOutbox,
}

impl LoyaltyEngine {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            authorized: HashSet::new(),
            points: HashMap::new(),
            tiers: TierTable::new(),
            events: EventOutbox::new(),
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    fn ensure_owner(&self, caller: Address) -> Result<(), LoyaltyError> {
        if caller != self.owner {
            return Err(LoyaltyError::Unauthorized(caller));
        }
        Ok(())
    }

    pub fn is_authorized(&self, identity: &Address) -> bool {
        *identity == self.owner || self.authorized.contains(identity)
    }

    pub fn points_of(&self, account: &Address) -> Points {
        self.points.get(account).copied().unwrap_or(0)
    }

    pub fn discount_for(&self, points: Points) -> DiscountPercent {
        self.tiers.discount_for(points)
    }

    /// Effective commission rate (scaled by `PRECISION`) for a holder of `points`.
    pub fn commission_rate(&self, points: Points, base_rate: Rate) -> Rate {
        self.tiers.commission_rate(points, base_rate)
    }

    /// Credit points to `account`. Returns the new total.
    pub fn add_points(
        &mut self,
        caller: Address,
        account: Address,
        points: Points,
    ) -> Result<Points, LoyaltyError> {
        if !self.is_authorized(&caller) {
            return Err(LoyaltyError::Unauthorized(caller));
        }
        if account.is_zero() {
            return Err(LoyaltyError::InvalidAddress);
        }
        let new_total = self
            .points_of(&account)
            .checked_add(points)
            .ok_or(LoyaltyError::Overflow)?;
        self.points.insert(account, new_total);

        self.events.emit(Event::PointsCredited { account, new_total });
        debug!(%account, points, new_total, "loyalty points credited");
        Ok(new_total)
    }

    /// Append a tier. Returns its index.
    pub fn add_tier(
        &mut self,
        admin: Address,
        threshold: Points,
        discount: DiscountPercent,
    ) -> Result<usize, LoyaltyError> {
        self.ensure_owner(admin)?;
        let index = self.tiers.push(DiscountTier::new(threshold, discount)?);
        self.emit_tier(index, threshold, discount, TierChange::Added);
        Ok(index)
    }

    pub fn update_tier(
        &mut self,
        admin: Address,
        index: usize,
        threshold: Points,
        discount: DiscountPercent,
    ) -> Result<(), LoyaltyError> {
        self.ensure_owner(admin)?;
        self.tiers
            .replace(index, DiscountTier::new(threshold, discount)?)?;
        self.emit_tier(index, threshold, discount, TierChange::Updated);
        Ok(())
    }

    /// Remove a tier; later tiers shift left, keeping their relative order.
    pub fn remove_tier(&mut self, admin: Address, index: usize) -> Result<DiscountTier, LoyaltyError> {
        self.ensure_owner(admin)?;
        let removed = self.tiers.remove(index)?;
        self.emit_tier(index, removed.threshold, removed.discount, TierChange::Removed);
        Ok(removed)
    }

    fn emit_tier(&mut self, index: usize, threshold: Points, discount: DiscountPercent, change: TierChange) {
        self.events.emit(Event::TierChanged {
            index,
            threshold,
            discount,
            change,
        });
        info!(index, threshold, discount, ?change, "discount tier changed");
    }

    /// Grant or revoke point-crediting rights.
    pub fn set_authorized_caller(
        &mut self,
        admin: Address,
        identity: Address,
        allowed: bool,
    ) -> Result<(), LoyaltyError> {
        self.ensure_owner(admin)?;
        if identity.is_zero() {
            return Err(LoyaltyError::InvalidAddress);
        }
        if allowed {
            self.authorized.insert(identity);
        } else {
            self.authorized.remove(&identity);
        }
        self.events
            .emit(Event::AuthorizationChanged { identity, allowed });
        info!(%identity, allowed, "authorized caller changed");
        Ok(())
    }

    pub fn transfer_ownership(&mut self, admin: Address, new_owner: Address) -> Result<(), LoyaltyError> {
        self.ensure_owner(admin)?;
        if new_owner.is_zero() {
            return Err(LoyaltyError::InvalidAddress);
        }
        let previous = std::mem::replace(&mut self.owner, new_owner);
        self.events.emit(Event::OwnershipTransferred {
            component: Component::Loyalty,
            previous,
            new_owner,
        });
        Ok(())
    }

    pub fn tiers(&self) -> &TierTable {
        &self.tiers
    }

    pub fn tier(&self, index: usize) -> Option<&DiscountTier> {
        self.tiers.get(index)
    }

    /// Explicitly authorized identities (the owner is implicit and not listed).
    pub fn authorized_callers(&self) -> impl Iterator<Item = &Address> {
        self.authorized.iter()
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &Points)> {
        self.points.iter()
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain()
    }

    pub fn pending_events(&self) -> &[Event] {
        self.events.pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Address {
        Address::new([0xaa; 32])
    }

    fn exchange() -> Address {
        Address::new([0xee; 32])
    }

    fn alice() -> Address {
        Address::new([1u8; 32])
    }

    fn engine_with_tiers() -> LoyaltyEngine {
        let mut engine = LoyaltyEngine::new(admin());
        engine.add_tier(admin(), 1000, 5).unwrap();
        engine.add_tier(admin(), 5000, 8).unwrap();
        engine.add_tier(admin(), 10000, 10).unwrap();
        engine.drain_events();
        engine
    }

    #[test]
    fn test_points_default_zero() {
        let engine = LoyaltyEngine::new(admin());
        assert_eq!(engine.points_of(&alice()), 0);
    }

    #[test]
    fn test_owner_is_implicitly_authorized() {
        let mut engine = LoyaltyEngine::new(admin());
        assert!(engine.is_authorized(&admin()));
        assert_eq!(engine.add_points(admin(), alice(), 40), Ok(40));
    }

    #[test]
    fn test_add_points_requires_authorization() {
        let mut engine = LoyaltyEngine::new(admin());
        assert_eq!(
            engine.add_points(exchange(), alice(), 10),
            Err(LoyaltyError::Unauthorized(exchange()))
        );

        engine.set_authorized_caller(admin(), exchange(), true).unwrap();
        assert_eq!(engine.add_points(exchange(), alice(), 10), Ok(10));
        assert_eq!(engine.add_points(exchange(), alice(), 15), Ok(25));

        engine.set_authorized_caller(admin(), exchange(), false).unwrap();
        assert!(engine.add_points(exchange(), alice(), 1).is_err());
        assert_eq!(engine.points_of(&alice()), 25);
    }

    #[test]
    fn test_add_points_overflow() {
        let mut engine = LoyaltyEngine::new(admin());
        engine.add_points(admin(), alice(), u64::MAX).unwrap();
        assert_eq!(
            engine.add_points(admin(), alice(), 1),
            Err(LoyaltyError::Overflow)
        );
        assert_eq!(engine.points_of(&alice()), u64::MAX);
    }

    #[test]
    fn test_add_points_zero_address() {
        let mut engine = LoyaltyEngine::new(admin());
        assert_eq!(
            engine.add_points(admin(), Address::ZERO, 1),
            Err(LoyaltyError::InvalidAddress)
        );
    }

    #[test]
    fn test_commission_rate_examples() {
        let engine = engine_with_tiers();
        assert_eq!(engine.commission_rate(0, 1), 100);
        assert_eq!(engine.commission_rate(1000, 1), 95);
        assert_eq!(engine.commission_rate(12_000, 1), 90);
    }

    #[test]
    fn test_tier_admin_is_owner_only() {
        let mut engine = engine_with_tiers();
        assert!(engine.add_tier(alice(), 1, 1).is_err());
        assert!(engine.update_tier(alice(), 0, 1, 1).is_err());
        assert!(engine.remove_tier(alice(), 0).is_err());
        assert!(engine.set_authorized_caller(alice(), alice(), true).is_err());
        assert_eq!(engine.tiers().len(), 3);
        assert!(engine.pending_events().is_empty());
    }

    #[test]
    fn test_update_tier_validates() {
        let mut engine = engine_with_tiers();
        assert_eq!(
            engine.update_tier(admin(), 0, 1000, 101),
            Err(LoyaltyError::InvalidDiscount(101))
        );
        assert_eq!(
            engine.update_tier(admin(), 7, 1000, 5),
            Err(LoyaltyError::InvalidIndex { index: 7, len: 3 })
        );
        engine.update_tier(admin(), 0, 2000, 6).unwrap();
        assert_eq!(engine.tier(0), Some(&DiscountTier { threshold: 2000, discount: 6 }));
    }

    #[test]
    fn test_remove_tier_shifts_left() {
        let mut engine = engine_with_tiers();
        engine.remove_tier(admin(), 1).unwrap();
        let thresholds: Vec<_> = engine.tiers().as_slice().iter().map(|t| t.threshold).collect();
        assert_eq!(thresholds, vec![1000, 10000]);
        assert_eq!(
            engine.drain_events(),
            vec![Event::TierChanged {
                index: 1,
                threshold: 5000,
                discount: 8,
                change: TierChange::Removed,
            }]
        );
    }

    #[test]
    fn test_authorize_zero_address_rejected() {
        let mut engine = LoyaltyEngine::new(admin());
        assert_eq!(
            engine.set_authorized_caller(admin(), Address::ZERO, true),
            Err(LoyaltyError::InvalidAddress)
        );
    }

    #[test]
    fn test_transfer_ownership_moves_implicit_authorization() {
        let mut engine = LoyaltyEngine::new(admin());
        engine.transfer_ownership(admin(), alice()).unwrap();
        assert!(!engine.is_authorized(&admin()));
        assert!(engine.is_authorized(&alice()));
        assert!(engine.add_tier(alice(), 10, 1).is_ok());
    }
}
