pub mod engine;
pub mod tiers;
pub mod types;

pub use engine::LoyaltyEngine;
pub use tiers::{DiscountTier, TierTable};
pub use types::*;
