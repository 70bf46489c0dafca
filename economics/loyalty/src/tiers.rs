use gridmart_primitives::{DiscountPercent, Points, Rate, MAX_DISCOUNT, PERCENT, PRECISION};
use serde::{Deserialize, Serialize};

use crate::types::LoyaltyError;

/// A loyalty-points threshold and the commission discount it unlocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountTier {
    /// Minimum points (inclusive) to qualify.
    pub threshold: Points,
    /// Percentage taken off the base commission rate, `0..=100`.
    pub discount: DiscountPercent,
}

impl DiscountTier {
    /// Build a tier, rejecting discounts above 100%.
    pub fn new(threshold: Points, discount: DiscountPercent) -> Result<Self, LoyaltyError> {
        if discount > MAX_DISCOUNT {
            return Err(LoyaltyError::InvalidDiscount(discount));
        }
        Ok(Self {
            threshold,
            discount,
        })
    }
}

/// Discount tiers in storage order.
///
/// Lookup scans in storage order and keeps the last tier whose threshold
/// is met, so "more points never means a worse rate" only holds while the
/// table is kept ascending by threshold. The table never re-sorts itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierTable {
    tiers: Vec<DiscountTier>,
}

impl TierTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(threshold, discount)` pairs, validating each.
    pub fn from_pairs(pairs: &[(Points, DiscountPercent)]) -> Result<Self, LoyaltyError> {
        let tiers = pairs
            .iter()
            .map(|&(threshold, discount)| DiscountTier::new(threshold, discount))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { tiers })
    }

    /// Discount of the last tier (in storage order) with `threshold <= points`,
    /// or 0 when none qualifies.
    pub fn discount_for(&self, points: Points) -> DiscountPercent {
        let mut discount = 0;
        for tier in &self.tiers {
            if points >= tier.threshold {
                discount = tier.discount;
            }
        }
        discount
    }

    /// Effective commission rate at [`PRECISION`]:
    /// `base_rate * PRECISION * (100 - discount) / 100`, truncating.
    ///
    /// Saturates at `Rate::MAX` for base rates above `Rate::MAX / PRECISION`.
    /// The exchange caps its base rate at 100, far below that bound.
    pub fn commission_rate(&self, points: Points, base_rate: Rate) -> Rate {
        let discount = self.discount_for(points) as u128;
        let rate = base_rate as u128 * PRECISION as u128 * (PERCENT as u128 - discount)
            / PERCENT as u128;
        rate.min(Rate::MAX as u128) as Rate
    }

    pub fn push(&mut self, tier: DiscountTier) -> usize {
        self.tiers.push(tier);
        self.tiers.len() - 1
    }

    pub fn replace(&mut self, index: usize, tier: DiscountTier) -> Result<DiscountTier, LoyaltyError> {
        let len = self.tiers.len();
        let slot = self
            .tiers
            .get_mut(index)
            .ok_or(LoyaltyError::InvalidIndex { index, len })?;
        Ok(std::mem::replace(slot, tier))
    }

    /// Remove a tier, shifting later tiers left so relative order survives.
    pub fn remove(&mut self, index: usize) -> Result<DiscountTier, LoyaltyError> {
        let len = self.tiers.len();
        if index >= len {
            return Err(LoyaltyError::InvalidIndex { index, len });
        }
        Ok(self.tiers.remove(index))
    }

    pub fn get(&self, index: usize) -> Option<&DiscountTier> {
        self.tiers.get(index)
    }

    pub fn as_slice(&self) -> &[DiscountTier] {
        &self.tiers
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Whether thresholds are non-decreasing in storage order.
    pub fn is_ascending(&self) -> bool {
        self.tiers.windows(2).all(|w| w[0].threshold <= w[1].threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard_table() -> TierTable {
        TierTable::from_pairs(&[(1000, 5), (5000, 8), (10000, 10)]).unwrap()
    }

    #[test]
    fn test_no_tiers_no_discount() {
        let table = TierTable::new();
        assert_eq!(table.discount_for(1_000_000), 0);
        assert_eq!(table.commission_rate(1_000_000, 1), 100);
    }

    #[test]
    fn test_discount_boundaries() {
        let table = standard_table();
        assert_eq!(table.discount_for(0), 0);
        assert_eq!(table.discount_for(999), 0);
        assert_eq!(table.discount_for(1000), 5);
        assert_eq!(table.discount_for(4999), 5);
        assert_eq!(table.discount_for(5000), 8);
        assert_eq!(table.discount_for(10_000), 10);
        assert_eq!(table.discount_for(u64::MAX), 10);
    }

    #[test]
    fn test_commission_rate_truncates() {
        let table = standard_table();
        // 1 * 100 * 95 / 100
        assert_eq!(table.commission_rate(1000, 1), 95);
        // 3 * 100 * 92 / 100
        assert_eq!(table.commission_rate(5000, 3), 276);
        assert_eq!(table.commission_rate(0, 2), 200);
    }

    #[test]
    fn test_commission_rate_saturates_for_huge_base() {
        let table = standard_table();
        assert_eq!(table.commission_rate(0, Rate::MAX), Rate::MAX);
        // 95% of the saturated product still exceeds Rate::MAX.
        assert_eq!(table.commission_rate(1000, Rate::MAX), Rate::MAX);
        assert_eq!(table.commission_rate(0, Rate::MAX / PRECISION), Rate::MAX / PRECISION * PRECISION);
    }

    #[test]
    fn test_full_discount_is_free() {
        let table = TierTable::from_pairs(&[(10, 100)]).unwrap();
        assert_eq!(table.commission_rate(10, 5), 0);
    }

    #[test]
    fn test_unsorted_table_uses_last_match_in_storage_order() {
        let table = TierTable::from_pairs(&[(5000, 8), (1000, 5)]).unwrap();
        assert!(!table.is_ascending());
        // Both match; the later entry wins even though it is the smaller discount.
        assert_eq!(table.discount_for(6000), 5);
    }

    #[test]
    fn test_invalid_discount_rejected() {
        assert_eq!(
            DiscountTier::new(0, 101),
            Err(LoyaltyError::InvalidDiscount(101))
        );
        assert!(TierTable::from_pairs(&[(0, 5), (10, 150)]).is_err());
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut table = standard_table();
        let removed = table.remove(1).unwrap();
        assert_eq!(removed, DiscountTier { threshold: 5000, discount: 8 });
        assert_eq!(
            table,
            TierTable::from_pairs(&[(1000, 5), (10000, 10)]).unwrap()
        );
        assert!(table.is_ascending());
    }

    #[test]
    fn test_remove_out_of_range() {
        let mut table = standard_table();
        assert_eq!(
            table.remove(3),
            Err(LoyaltyError::InvalidIndex { index: 3, len: 3 })
        );
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_replace() {
        let mut table = standard_table();
        let old = table
            .replace(0, DiscountTier::new(500, 3).unwrap())
            .unwrap();
        assert_eq!(old.threshold, 1000);
        assert_eq!(table.get(0).unwrap().threshold, 500);
        assert!(table.replace(9, old).is_err());
    }

    #[test]
    fn test_serializes_as_plain_list() {
        let table = TierTable::from_pairs(&[(1000, 5)]).unwrap();
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, r#"[{"threshold":1000,"discount":5}]"#);
    }
}
