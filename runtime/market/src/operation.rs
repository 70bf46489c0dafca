use gridmart_exchange::Sale;
use gridmart_loyalty::DiscountTier;
use gridmart_primitives::{Address, Amount, CertificateId, DiscountPercent, Points, Rate};
use serde::{Deserialize, Serialize};

/// Every operation the market accepts, in a form that can be queued,
/// logged, or loaded from a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    ProduceEnergy {
        admin: Address,
        account: Address,
        amount: Amount,
    },
    Mint {
        owner: Address,
        metadata_ref: String,
        amount: Amount,
    },
    TransferCertificate {
        caller: Address,
        from: Address,
        to: Address,
        id: CertificateId,
    },
    MintAndList {
        seller: Address,
        metadata_ref: String,
        energy: Amount,
        price: Amount,
    },
    List {
        seller: Address,
        id: CertificateId,
        price: Amount,
    },
    Buy {
        buyer: Address,
        id: CertificateId,
        payment: Amount,
    },
    CancelListing {
        caller: Address,
        id: CertificateId,
    },
    UpdatePrice {
        caller: Address,
        id: CertificateId,
        price: Amount,
    },
    UpdateCommissionRate {
        admin: Address,
        rate: Rate,
    },
    WithdrawFees {
        admin: Address,
        amount: Amount,
    },
    AddTier {
        admin: Address,
        threshold: Points,
        discount: DiscountPercent,
    },
    UpdateTier {
        admin: Address,
        index: usize,
        threshold: Points,
        discount: DiscountPercent,
    },
    RemoveTier {
        admin: Address,
        index: usize,
    },
    SetAuthorizedCaller {
        admin: Address,
        identity: Address,
        allowed: bool,
    },
    AddPoints {
        caller: Address,
        account: Address,
        points: Points,
    },
    SetMarketplaceAddress {
        admin: Address,
        marketplace: Address,
    },
    TransferOwnership {
        admin: Address,
        new_owner: Address,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::ProduceEnergy { .. } => "produce_energy",
            Operation::Mint { .. } => "mint",
            Operation::TransferCertificate { .. } => "transfer_certificate",
            Operation::MintAndList { .. } => "mint_and_list",
            Operation::List { .. } => "list",
            Operation::Buy { .. } => "buy",
            Operation::CancelListing { .. } => "cancel_listing",
            Operation::UpdatePrice { .. } => "update_price",
            Operation::UpdateCommissionRate { .. } => "update_commission_rate",
            Operation::WithdrawFees { .. } => "withdraw_fees",
            Operation::AddTier { .. } => "add_tier",
            Operation::UpdateTier { .. } => "update_tier",
            Operation::RemoveTier { .. } => "remove_tier",
            Operation::SetAuthorizedCaller { .. } => "set_authorized_caller",
            Operation::AddPoints { .. } => "add_points",
            Operation::SetMarketplaceAddress { .. } => "set_marketplace_address",
            Operation::TransferOwnership { .. } => "transfer_ownership",
        }
    }
}

/// Value returned by a successful operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Outcome {
    Done,
    Balance(Amount),
    Certificate(CertificateId),
    Sale(Sale),
    Points(Points),
    TierIndex(usize),
    RemovedTier(DiscountTier),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_json_shape() {
        let json = format!(
            r#"{{"op":"buy","buyer":"{}","id":4,"payment":1000}}"#,
            "02".repeat(32)
        );
        let op: Operation = serde_json::from_str(&json).unwrap();
        assert_eq!(
            op,
            Operation::Buy {
                buyer: Address::new([2u8; 32]),
                id: 4,
                payment: 1000,
            }
        );
        assert_eq!(op.name(), "buy");
    }

    #[test]
    fn test_outcome_is_adjacently_tagged() {
        let value = serde_json::to_value(Outcome::Certificate(9)).unwrap();
        assert_eq!(value["type"], "certificate");
        assert_eq!(value["value"], 9);
    }
}
