use gridmart_energy::LedgerError;
use gridmart_loyalty::LoyaltyError;
use gridmart_primitives::{Address, Amount, CertificateId, Points, Rate};
use serde::{Deserialize, Serialize};

/// Lowest accepted base commission rate, in whole percent.
pub const MIN_COMMISSION_RATE: Rate = 1;

/// Highest accepted base commission rate. Keeps every fee within its price.
pub const MAX_COMMISSION_RATE: Rate = 100;

/// An offer to sell a certificate, keyed by certificate id.
///
/// `active` starts true and flips to false exactly once, on sale or
/// cancellation. An inactive listing is never reactivated; only a fresh
/// `list` call can replace it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub certificate_id: CertificateId,
    pub seller: Address,
    pub price: Amount,
    /// Bound energy copied from the certificate when listed.
    pub energy: Amount,
    pub active: bool,
}

/// Outcome of a completed purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub certificate_id: CertificateId,
    pub seller: Address,
    pub buyer: Address,
    pub price: Amount,
    pub fee: Amount,
    pub proceeds: Amount,
    /// Payment above the price, kept by the platform.
    pub excess: Amount,
    pub energy: Amount,
    pub points_awarded: Points,
}

/// Errors that can occur during exchange operations.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("loyalty: {0}")]
    Loyalty(#[from] LoyaltyError),

    #[error("caller {0} is not authorized for this operation")]
    Unauthorized(Address),

    #[error("zero address is not a valid identity")]
    InvalidAddress,

    #[error("amount must be greater than zero")]
    InvalidAmount,

    #[error("insufficient payment: price {price}, paid {paid}")]
    InsufficientPayment { price: Amount, paid: Amount },

    #[error("caller is not the seller of listing {0}")]
    NotOwner(CertificateId),

    #[error("no listing for certificate {0}")]
    ListingNotFound(CertificateId),

    #[error("listing for certificate {0} is inactive")]
    ListingInactive(CertificateId),

    #[error("certificate {0} already has an active listing")]
    ListingAlreadyActive(CertificateId),

    #[error("commission rate {0} outside 1..=100")]
    InvalidCommissionRate(Rate),

    #[error("points divisor must be greater than zero")]
    InvalidPointsDivisor,

    #[error("insufficient retained fees: requested {requested}, available {available}")]
    InsufficientFees { requested: Amount, available: Amount },

    #[error("arithmetic overflow")]
    Overflow,
}
