use gridmart_primitives::{Amount, Points, Rate, PERCENT, PRECISION};
use serde::{Deserialize, Serialize};

/// Energy units per loyalty point awarded to a seller.
pub const DEFAULT_POINTS_DIVISOR: u64 = 10;

/// Fee charged on `price` at an effective `rate` (scaled by `PRECISION`):
/// `price * rate / (100 * PRECISION)`, truncating.
pub fn fee_for(price: Amount, rate: Rate) -> Amount {
    let fee = price as u128 * rate as u128 / (PERCENT as u128 * PRECISION as u128);
    fee.min(Amount::MAX as u128) as Amount
}

/// Loyalty points earned for selling `energy`, truncating.
pub fn points_for(energy: Amount, divisor: u64) -> Points {
    energy / divisor
}

/// Fee breakdown for a prospective sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeQuote {
    pub price: Amount,
    /// Effective rate at `PRECISION` after the seller's discount.
    pub rate: Rate,
    pub fee: Amount,
    pub proceeds: Amount,
}

impl FeeQuote {
    pub fn new(price: Amount, rate: Rate) -> Self {
        let fee = fee_for(price, rate);
        Self {
            price,
            rate,
            fee,
            proceeds: price.saturating_sub(fee),
        }
    }
}
