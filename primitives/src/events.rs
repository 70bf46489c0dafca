use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::types::{Amount, CertificateId, DiscountPercent, Points, Rate};

/// The component that emitted a notification or owns a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Ledger,
    Loyalty,
    Exchange,
}

/// What happened to a discount tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierChange {
    Added,
    Updated,
    Removed,
}

/// Notifications consumed by read-side indexers.
///
/// Published exactly once per successful operation, in the order the
/// operation performed its steps. Failed operations publish nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    BalanceChanged {
        account: Address,
        new_balance: Amount,
    },
    CertificateMinted {
        id: CertificateId,
        owner: Address,
        metadata_ref: String,
        amount: Amount,
    },
    CertificateTransferred {
        id: CertificateId,
        from: Address,
        to: Address,
    },
    EnergyReleased {
        id: CertificateId,
        to: Address,
        amount: Amount,
    },
    Listed {
        id: CertificateId,
        seller: Address,
        price: Amount,
        energy: Amount,
    },
    ListingUpdated {
        id: CertificateId,
        seller: Address,
        price: Amount,
    },
    ListingCancelled {
        id: CertificateId,
        seller: Address,
    },
    SaleCompleted {
        id: CertificateId,
        seller: Address,
        buyer: Address,
        price: Amount,
        fee: Amount,
        /// Payment above the listing price, retained as revenue.
        excess: Amount,
    },
    TierChanged {
        index: usize,
        threshold: Points,
        discount: DiscountPercent,
        change: TierChange,
    },
    PointsCredited {
        account: Address,
        new_total: Points,
    },
    AuthorizationChanged {
        identity: Address,
        allowed: bool,
    },
    CommissionRateUpdated {
        rate: Rate,
    },
    FeesWithdrawn {
        to: Address,
        amount: Amount,
    },
    MarketplaceSet {
        marketplace: Address,
    },
    OwnershipTransferred {
        component: Component,
        previous: Address,
        new_owner: Address,
    },
}

impl Event {
    /// Short machine name, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::BalanceChanged { .. } => "balance_changed",
            Event::CertificateMinted { .. } => "certificate_minted",
            Event::CertificateTransferred { .. } => "certificate_transferred",
            Event::EnergyReleased { .. } => "energy_released",
            Event::Listed { .. } => "listed",
            Event::ListingUpdated { .. } => "listing_updated",
            Event::ListingCancelled { .. } => "listing_cancelled",
            Event::SaleCompleted { .. } => "sale_completed",
            Event::TierChanged { .. } => "tier_changed",
            Event::PointsCredited { .. } => "points_credited",
            Event::AuthorizationChanged { .. } => "authorization_changed",
            Event::CommissionRateUpdated { .. } => "commission_rate_updated",
            Event::FeesWithdrawn { .. } => "fees_withdrawn",
            Event::MarketplaceSet { .. } => "marketplace_set",
            Event::OwnershipTransferred { .. } => "ownership_transferred",
        }
    }
}

/// Pending notifications of a single component.
///
/// Components emit into their outbox while an operation runs; whoever
/// drives the operation drains it once the operation has succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventOutbox {
    pending: Vec<Event>,
}

impl EventOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: Event) {
        self.pending.push(event);
    }

    /// Append events drained from a callee, preserving their order.
    pub fn extend(&mut self, events: impl IntoIterator<Item = Event>) {
        self.pending.extend(events);
    }

    /// Take all pending events, leaving the outbox empty.
    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending(&self) -> &[Event] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbox_drain_preserves_order() {
        let mut outbox = EventOutbox::new();
        outbox.emit(Event::CommissionRateUpdated { rate: 2 });
        outbox.emit(Event::CommissionRateUpdated { rate: 3 });
        assert_eq!(outbox.len(), 2);

        let drained = outbox.drain();
        assert!(outbox.is_empty());
        assert_eq!(
            drained,
            vec![
                Event::CommissionRateUpdated { rate: 2 },
                Event::CommissionRateUpdated { rate: 3 },
            ]
        );
    }

    #[test]
    fn test_extend_appends_after_existing() {
        let mut outbox = EventOutbox::new();
        outbox.emit(Event::MarketplaceSet {
            marketplace: Address::new([9u8; 32]),
        });
        outbox.extend(vec![Event::CommissionRateUpdated { rate: 1 }]);
        assert_eq!(outbox.pending()[0].kind(), "marketplace_set");
        assert_eq!(outbox.pending()[1].kind(), "commission_rate_updated");
    }

    #[test]
    fn test_event_json_is_tagged() {
        let event = Event::PointsCredited {
            account: Address::new([1u8; 32]),
            new_total: 50,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "points_credited");
        assert_eq!(json["new_total"], 50);
    }
}
