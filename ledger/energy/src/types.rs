use gridmart_primitives::{Address, CertificateId};
use thiserror::Error;

/// Errors that can occur during energy ledger operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("caller {0} is not authorized for this operation")]
    Unauthorized(Address),

    #[error("zero address is not a valid identity")]
    InvalidAddress,

    #[error("amount must be greater than zero")]
    InvalidAmount,

    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: u64, available: u64 },

    #[error("certificate {0} does not exist")]
    CertificateNotFound(CertificateId),

    #[error("certificate {0} is not owned by the expected account")]
    NotOwner(CertificateId),

    #[error("certificate {0} has no bound energy left")]
    NoBoundEnergy(CertificateId),

    #[error("arithmetic overflow")]
    Overflow,
}
