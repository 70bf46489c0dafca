use gridmart_primitives::{Address, Amount, CertificateId};
use serde::{Deserialize, Serialize};

use crate::types::LedgerError;

/// A transferable claim on an amount of bound energy.
///
/// `id` and `metadata_ref` never change. `bound` is set at mint and drops
/// to zero exactly once, when the energy is released to its holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergyCertificate {
    pub id: CertificateId,
    pub owner: Address,
    pub bound: Amount,
    /// Energy bound at mint time, kept after release for auditing.
    pub minted_amount: Amount,
    /// Opaque reference to off-ledger metadata (e.g. a content hash or URI).
    pub metadata_ref: String,
}

impl EnergyCertificate {
    pub fn new(id: CertificateId, owner: Address, amount: Amount, metadata_ref: String) -> Self {
        Self {
            id,
            owner,
            bound: amount,
            minted_amount: amount,
            metadata_ref,
        }
    }

    pub fn is_released(&self) -> bool {
        self.bound == 0
    }

    /// Zero the bound amount and return what was bound.
    pub fn release(&mut self) -> Result<Amount, LedgerError> {
        if self.bound == 0 {
            return Err(LedgerError::NoBoundEnergy(self.id));
        }
        Ok(std::mem::take(&mut self.bound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_only_once() {
        let mut cert = EnergyCertificate::new(1, Address::new([1u8; 32]), 250, "ipfs://a".into());
        assert!(!cert.is_released());
        assert_eq!(cert.release(), Ok(250));
        assert!(cert.is_released());
        assert_eq!(cert.minted_amount, 250);
        assert_eq!(cert.release(), Err(LedgerError::NoBoundEnergy(1)));
    }
}
