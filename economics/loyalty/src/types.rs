use gridmart_primitives::{Address, DiscountPercent};

/// Errors that can occur during loyalty operations.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum LoyaltyError {
    #[error("caller {0} is not authorized for this operation")]
    Unauthorized(Address),

    #[error("zero address is not a valid identity")]
    InvalidAddress,

    #[error("tier index {index} out of range (table has {len} tiers)")]
    InvalidIndex { index: usize, len: usize },

    #[error("discount {0}% exceeds 100%")]
    InvalidDiscount(DiscountPercent),

    #[error("arithmetic overflow")]
    Overflow,
}
