/// Energy and payment value in the smallest unit.
pub type Amount = u64;

/// Loyalty points.
pub type Points = u64;

/// Monotonically increasing certificate identifier, starting at 1.
pub type CertificateId = u64;

/// Commission rate. Base rates are whole percent; effective rates carry
/// two extra decimal digits (scaled by [`PRECISION`]).
pub type Rate = u64;

/// Discount percentage in `0..=100`.
pub type DiscountPercent = u8;

/// Fixed-point scale applied to commission rates (two decimal digits).
pub const PRECISION: u64 = 100;

/// Denominator for whole-percent quantities.
pub const PERCENT: u64 = 100;

/// Upper bound on a discount percentage.
pub const MAX_DISCOUNT: DiscountPercent = 100;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_carries_two_digits() {
        // 1% expressed at full precision is 100 hundredths of a percent.
        assert_eq!(PRECISION, 100);
        assert_eq!(PERCENT * PRECISION, 10_000);
    }
}
