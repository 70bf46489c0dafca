use std::collections::{BTreeMap, HashMap};

use gridmart_primitives::{Address, Amount, CertificateId, Component, Event, EventOutbox};
use tracing::{debug, info};

use crate::accounts::AccountState;
use crate::certificate::EnergyCertificate;
use crate::types::LedgerError;

/// Liquid energy balances plus the certificates that hold bound energy.
///
/// Invariant: `total_liquid() + total_bound() == total_produced()` after
/// every operation, successful or not.
#[derive(Debug, Clone)]
pub struct EnergyLedger {
    owner: Address,
    /// The only identity allowed to release bound energy.
    marketplace: Option<Address>,
    accounts: HashMap<Address, AccountState>,
    certificates: BTreeMap<CertificateId, EnergyCertificate>,
    next_id: CertificateId,
    total_produced: Amount,
    events: EventOutbox,
}

impl EnergyLedger {
    /// Create an empty ledger administered by `owner`.
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            marketplace: None,
            accounts: HashMap::new(),
            certificates: BTreeMap::new(),
            next_id: 1,
            total_produced: 0,
            events: EventOutbox::new(),
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn marketplace(&self) -> Option<Address> {
        self.marketplace
    }

    fn ensure_owner(&self, caller: Address) -> Result<(), LedgerError> {
        if caller != self.owner {
            return Err(LedgerError::Unauthorized(caller));
        }
        Ok(())
    }

    /// Designate the exchange that may move certificates and release energy.
    pub fn set_marketplace(&mut self, admin: Address, marketplace: Address) -> Result<(), LedgerError> {
        self.ensure_owner(admin)?;
        if marketplace.is_zero() {
            return Err(LedgerError::InvalidAddress);
        }
        self.marketplace = Some(marketplace);
        self.events.emit(Event::MarketplaceSet { marketplace });
        info!(%marketplace, "ledger marketplace set");
        Ok(())
    }

    pub fn transfer_ownership(&mut self, admin: Address, new_owner: Address) -> Result<(), LedgerError> {
        self.ensure_owner(admin)?;
        if new_owner.is_zero() {
            return Err(LedgerError::InvalidAddress);
        }
        let previous = std::mem::replace(&mut self.owner, new_owner);
        self.events.emit(Event::OwnershipTransferred {
            component: Component::Ledger,
            previous,
            new_owner,
        });
        Ok(())
    }

    /// Credit freshly produced energy to `account`. Owner-only; the owner
    /// acts as the production authority.
    pub fn produce_energy(
        &mut self,
        admin: Address,
        account: Address,
        amount: Amount,
    ) -> Result<Amount, LedgerError> {
        self.ensure_owner(admin)?;
        if account.is_zero() {
            return Err(LedgerError::InvalidAddress);
        }
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let total_produced = self
            .total_produced
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        let acct = self.accounts.entry(account).or_default();
        acct.credit(amount)?;
        let new_balance = acct.balance;
        self.total_produced = total_produced;

        self.events.emit(Event::BalanceChanged {
            account,
            new_balance,
        });
        debug!(%account, amount, new_balance, "energy produced");
        Ok(new_balance)
    }

    /// Bind `amount` of the owner's liquid energy into a new certificate.
    pub fn mint(
        &mut self,
        owner: Address,
        metadata_ref: impl Into<String>,
        amount: Amount,
    ) -> Result<CertificateId, LedgerError> {
        if owner.is_zero() {
            return Err(LedgerError::InvalidAddress);
        }
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let available = self.balance_of(&owner);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        let id = self.next_id;
        let next_id = id.checked_add(1).ok_or(LedgerError::Overflow)?;

        let acct = self.accounts.entry(owner).or_default();
        acct.debit(amount)?;
        let new_balance = acct.balance;

        let metadata_ref = metadata_ref.into();
        self.certificates.insert(
            id,
            EnergyCertificate::new(id, owner, amount, metadata_ref.clone()),
        );
        self.next_id = next_id;

        self.events.emit(Event::BalanceChanged {
            account: owner,
            new_balance,
        });
        self.events.emit(Event::CertificateMinted {
            id,
            owner,
            metadata_ref,
            amount,
        });
        info!(certificate_id = id, %owner, amount, "certificate minted");
        Ok(id)
    }

    /// Move certificate ownership. Allowed for the current holder and for
    /// the designated marketplace.
    pub fn transfer_certificate(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        id: CertificateId,
    ) -> Result<(), LedgerError> {
        let marketplace = self.marketplace;
        let cert = self
            .certificates
            .get_mut(&id)
            .ok_or(LedgerError::CertificateNotFound(id))?;
        if caller != cert.owner && Some(caller) != marketplace {
            return Err(LedgerError::Unauthorized(caller));
        }
        if from != cert.owner {
            return Err(LedgerError::NotOwner(id));
        }
        if to.is_zero() {
            return Err(LedgerError::InvalidAddress);
        }

        cert.owner = to;
        self.events
            .emit(Event::CertificateTransferred { id, from, to });
        debug!(certificate_id = id, %from, %to, "certificate transferred");
        Ok(())
    }

    /// Release a certificate's bound energy into the holder's liquid balance.
    ///
    /// Marketplace-only. Ownership must already have moved to `to`; the
    /// release happens at most once per certificate.
    pub fn transfer_energy(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        id: CertificateId,
    ) -> Result<Amount, LedgerError> {
        if self.marketplace != Some(caller) {
            return Err(LedgerError::Unauthorized(caller));
        }
        let cert = self
            .certificates
            .get(&id)
            .ok_or(LedgerError::CertificateNotFound(id))?;
        if cert.owner != to {
            return Err(LedgerError::NotOwner(id));
        }
        if cert.bound == 0 {
            return Err(LedgerError::NoBoundEnergy(id));
        }
        let new_balance = self
            .balance_of(&to)
            .checked_add(cert.bound)
            .ok_or(LedgerError::Overflow)?;

        let amount = self
            .certificates
            .get_mut(&id)
            .ok_or(LedgerError::CertificateNotFound(id))?
            .release()?;
        self.accounts.entry(to).or_default().balance = new_balance;

        self.events.emit(Event::EnergyReleased { id, to, amount });
        self.events.emit(Event::BalanceChanged {
            account: to,
            new_balance,
        });
        info!(certificate_id = id, %from, %to, amount, "bound energy released");
        Ok(amount)
    }

    /// Current liquid balance; unknown accounts hold zero.
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.accounts.get(account).map(|a| a.balance).unwrap_or(0)
    }

    pub fn certificate(&self, id: CertificateId) -> Option<&EnergyCertificate> {
        self.certificates.get(&id)
    }

    pub fn owner_of(&self, id: CertificateId) -> Option<Address> {
        self.certificates.get(&id).map(|c| c.owner)
    }

    pub fn bound_of(&self, id: CertificateId) -> Option<Amount> {
        self.certificates.get(&id).map(|c| c.bound)
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &AccountState)> {
        self.accounts.iter()
    }

    /// Certificates in id order.
    pub fn certificates(&self) -> impl Iterator<Item = &EnergyCertificate> {
        self.certificates.values()
    }

    pub fn certificate_count(&self) -> usize {
        self.certificates.len()
    }

    pub fn next_certificate_id(&self) -> CertificateId {
        self.next_id
    }

    pub fn total_produced(&self) -> Amount {
        self.total_produced
    }

    /// Sum of all liquid balances, widened so the sum itself cannot overflow.
    pub fn total_liquid(&self) -> u128 {
        self.accounts.values().map(|a| a.balance as u128).sum()
    }

    pub fn total_bound(&self) -> u128 {
        self.certificates.values().map(|c| c.bound as u128).sum()
    }

    /// Take the notifications emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain()
    }

    pub fn pending_events(&self) -> &[Event] {
        self.events.pending()
    }
}
