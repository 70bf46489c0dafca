use std::collections::BTreeMap;

use gridmart_energy::{EnergyLedger, LedgerError};
use gridmart_loyalty::{LoyaltyEngine, LoyaltyError};
use gridmart_primitives::{Address, Amount, CertificateId, Component, Event, EventOutbox, Rate};
use tracing::{debug, info, warn};

use crate::fee::{points_for, FeeQuote, DEFAULT_POINTS_DIVISOR};
use crate::treasury::Treasury;
use crate::types::*;

/// Listings, purchases and commission accounting.
///
/// The exchange holds no energy itself: it drives the ledger (as its
/// designated marketplace) and the loyalty engine (as an authorized
/// caller), which are passed in by whoever coordinates the operation.
#[derive(Debug, Clone)]
pub struct Exchange {
    /// Identity the exchange presents to the ledger and loyalty engine.
    address: Address,
    owner: Address,
    /// Base commission rate in whole percent.
    commission_rate: Rate,
    points_divisor: u64,
    listings: BTreeMap<CertificateId, Listing>,
    treasury: Treasury,
    events: EventOutbox,
}

fn validate_rate(rate: Rate) -> Result<(), ExchangeError> {
    if !(MIN_COMMISSION_RATE..=MAX_COMMISSION_RATE).contains(&rate) {
        return Err(ExchangeError::InvalidCommissionRate(rate));
    }
    Ok(())
}

impl Exchange {
    pub fn new(address: Address, owner: Address, commission_rate: Rate) -> Result<Self, ExchangeError> {
        if address.is_zero() || owner.is_zero() {
            return Err(ExchangeError::InvalidAddress);
        }
        validate_rate(commission_rate)?;
        Ok(Self {
            address,
            owner,
            commission_rate,
            points_divisor: DEFAULT_POINTS_DIVISOR,
            listings: BTreeMap::new(),
            treasury: Treasury::new(),
            events: EventOutbox::new(),
        })
    }

    /// Override how many energy units earn one loyalty point.
    pub fn with_points_divisor(mut self, divisor: u64) -> Result<Self, ExchangeError> {
        if divisor == 0 {
            return Err(ExchangeError::InvalidPointsDivisor);
        }
        self.points_divisor = divisor;
        Ok(self)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn commission_rate(&self) -> Rate {
        self.commission_rate
    }

    pub fn points_divisor(&self) -> u64 {
        self.points_divisor
    }

    fn ensure_owner(&self, caller: Address) -> Result<(), ExchangeError> {
        if caller != self.owner {
            return Err(ExchangeError::Unauthorized(caller));
        }
        Ok(())
    }

    /// Fee and proceeds for selling at `price`, discounted by the seller's
    /// loyalty tier.
    pub fn quote(&self, loyalty: &LoyaltyEngine, price: Amount, seller: &Address) -> FeeQuote {
        let points = loyalty.points_of(seller);
        let rate = loyalty.commission_rate(points, self.commission_rate);
        FeeQuote::new(price, rate)
    }

    pub fn calculate_fee(&self, loyalty: &LoyaltyEngine, price: Amount, seller: &Address) -> Amount {
        self.quote(loyalty, price, seller).fee
    }

    /// Mint a certificate from the seller's liquid energy and list it.
    pub fn mint_and_list(
        &mut self,
        ledger: &mut EnergyLedger,
        seller: Address,
        metadata_ref: impl Into<String>,
        energy: Amount,
        price: Amount,
    ) -> Result<CertificateId, ExchangeError> {
        if price == 0 {
            return Err(ExchangeError::InvalidAmount);
        }
        let id = ledger.mint(seller, metadata_ref, energy)?;
        self.events.extend(ledger.drain_events());
        self.open_listing(id, seller, price, energy);
        Ok(id)
    }

    /// List a certificate the seller already holds.
    pub fn list(
        &mut self,
        ledger: &EnergyLedger,
        seller: Address,
        id: CertificateId,
        price: Amount,
    ) -> Result<(), ExchangeError> {
        if price == 0 {
            return Err(ExchangeError::InvalidAmount);
        }
        let cert = ledger
            .certificate(id)
            .ok_or(LedgerError::CertificateNotFound(id))?;
        if cert.owner != seller {
            return Err(LedgerError::NotOwner(id).into());
        }
        if cert.bound == 0 {
            return Err(LedgerError::NoBoundEnergy(id).into());
        }
        if let Some(stale) = self.listings.get_mut(&id).filter(|l| l.active) {
            if stale.seller == seller {
                return Err(ExchangeError::ListingAlreadyActive(id));
            }
            // The certificate changed hands outside the exchange; the old
            // seller's offer no longer stands.
            stale.active = false;
            let previous = stale.seller;
            self.events.emit(Event::ListingCancelled { id, seller: previous });
            warn!(certificate_id = id, %previous, "stale listing replaced by new holder");
        }
        self.open_listing(id, seller, price, cert.bound);
        Ok(())
    }

    /// Fails while `id` has an active listing. Certificates on offer may
    /// only change hands through [`Exchange::buy`].
    pub fn ensure_unlisted(&self, id: CertificateId) -> Result<(), ExchangeError> {
        if self.listings.get(&id).is_some_and(|l| l.active) {
            return Err(ExchangeError::ListingAlreadyActive(id));
        }
        Ok(())
    }

    fn open_listing(&mut self, id: CertificateId, seller: Address, price: Amount, energy: Amount) {
        self.listings.insert(
            id,
            Listing {
                certificate_id: id,
                seller,
                price,
                energy,
                active: true,
            },
        );
        self.events.emit(Event::Listed {
            id,
            seller,
            price,
            energy,
        });
        info!(certificate_id = id, %seller, price, energy, "certificate listed");
    }

    fn active_listing_of(&mut self, caller: Address, id: CertificateId) -> Result<&mut Listing, ExchangeError> {
        let listing = self
            .listings
            .get_mut(&id)
            .ok_or(ExchangeError::ListingNotFound(id))?;
        if listing.seller != caller {
            return Err(ExchangeError::NotOwner(id));
        }
        if !listing.active {
            return Err(ExchangeError::ListingInactive(id));
        }
        Ok(listing)
    }

    /// Withdraw an active listing. Terminal: it cannot be reactivated.
    pub fn cancel_listing(&mut self, caller: Address, id: CertificateId) -> Result<(), ExchangeError> {
        let listing = self.active_listing_of(caller, id)?;
        listing.active = false;
        let seller = listing.seller;
        self.events.emit(Event::ListingCancelled { id, seller });
        info!(certificate_id = id, %seller, "listing cancelled");
        Ok(())
    }

    /// Reprice an active listing.
    pub fn update_price(&mut self, caller: Address, id: CertificateId, price: Amount) -> Result<(), ExchangeError> {
        if price == 0 {
            return Err(ExchangeError::InvalidAmount);
        }
        let listing = self.active_listing_of(caller, id)?;
        listing.price = price;
        let seller = listing.seller;
        self.events.emit(Event::ListingUpdated { id, seller, price });
        debug!(certificate_id = id, price, "listing repriced");
        Ok(())
    }

    /// Buy a listed certificate.
    ///
    /// Every precondition across the ledger, loyalty engine and treasury is
    /// checked before the first write. The listing is deactivated before
    /// certificate or energy moves, and the seller's proceeds are settled
    /// last, so anything observing the operation mid-flight sees the
    /// listing already sold.
    pub fn buy(
        &mut self,
        ledger: &mut EnergyLedger,
        loyalty: &mut LoyaltyEngine,
        buyer: Address,
        id: CertificateId,
        payment: Amount,
    ) -> Result<Sale, ExchangeError> {
        if buyer.is_zero() {
            return Err(ExchangeError::InvalidAddress);
        }
        let listing = self
            .listings
            .get(&id)
            .ok_or(ExchangeError::ListingNotFound(id))?;
        if !listing.active {
            return Err(ExchangeError::ListingInactive(id));
        }
        if payment < listing.price {
            return Err(ExchangeError::InsufficientPayment {
                price: listing.price,
                paid: payment,
            });
        }
        let seller = listing.seller;
        let price = listing.price;
        let energy = listing.energy;

        let quote = self.quote(loyalty, price, &seller);
        let excess = payment - price;
        let points = points_for(energy, self.points_divisor);

        // Cross-component preconditions.
        let cert = ledger
            .certificate(id)
            .ok_or(LedgerError::CertificateNotFound(id))?;
        if cert.owner != seller {
            return Err(LedgerError::NotOwner(id).into());
        }
        if cert.bound == 0 {
            return Err(LedgerError::NoBoundEnergy(id).into());
        }
        ledger
            .balance_of(&buyer)
            .checked_add(cert.bound)
            .ok_or(LedgerError::Overflow)?;
        if !loyalty.is_authorized(&self.address) {
            return Err(LoyaltyError::Unauthorized(self.address).into());
        }
        loyalty
            .points_of(&seller)
            .checked_add(points)
            .ok_or(LoyaltyError::Overflow)?;
        self.treasury.can_settle(&seller, payment, quote.proceeds)?;

        // Sold before anything moves.
        if let Some(listing) = self.listings.get_mut(&id) {
            listing.active = false;
        }

        ledger.transfer_certificate(self.address, seller, buyer, id)?;
        ledger.transfer_energy(self.address, seller, buyer, id)?;
        self.events.extend(ledger.drain_events());

        loyalty.add_points(self.address, seller, points)?;
        self.events.extend(loyalty.drain_events());

        self.treasury
            .settle(seller, quote.proceeds, quote.fee, excess)?;

        if excess > 0 {
            warn!(certificate_id = id, %buyer, excess, "payment above price retained as revenue");
        }
        self.events.emit(Event::SaleCompleted {
            id,
            seller,
            buyer,
            price,
            fee: quote.fee,
            excess,
        });
        info!(
            certificate_id = id,
            %seller,
            %buyer,
            price,
            fee = quote.fee,
            "certificate sold"
        );

        Ok(Sale {
            certificate_id: id,
            seller,
            buyer,
            price,
            fee: quote.fee,
            proceeds: quote.proceeds,
            excess,
            energy,
            points_awarded: points,
        })
    }

    pub fn update_commission_rate(&mut self, admin: Address, rate: Rate) -> Result<(), ExchangeError> {
        self.ensure_owner(admin)?;
        validate_rate(rate)?;
        self.commission_rate = rate;
        self.events.emit(Event::CommissionRateUpdated { rate });
        info!(rate, "commission rate updated");
        Ok(())
    }

    /// Pay retained revenue out to the owner.
    pub fn withdraw_fees(&mut self, admin: Address, amount: Amount) -> Result<(), ExchangeError> {
        self.ensure_owner(admin)?;
        if amount == 0 {
            return Err(ExchangeError::InvalidAmount);
        }
        self.treasury.withdraw(admin, amount)?;
        self.events.emit(Event::FeesWithdrawn { to: admin, amount });
        info!(%admin, amount, remaining = self.treasury.retained(), "fees withdrawn");
        Ok(())
    }

    pub fn transfer_ownership(&mut self, admin: Address, new_owner: Address) -> Result<(), ExchangeError> {
        self.ensure_owner(admin)?;
        if new_owner.is_zero() {
            return Err(ExchangeError::InvalidAddress);
        }
        let previous = std::mem::replace(&mut self.owner, new_owner);
        self.events.emit(Event::OwnershipTransferred {
            component: Component::Exchange,
            previous,
            new_owner,
        });
        Ok(())
    }

    pub fn listing(&self, id: CertificateId) -> Option<&Listing> {
        self.listings.get(&id)
    }

    pub fn listings(&self) -> impl Iterator<Item = &Listing> {
        self.listings.values()
    }

    pub fn active_listings(&self) -> impl Iterator<Item = &Listing> {
        self.listings.values().filter(|l| l.active)
    }

    pub fn treasury(&self) -> &Treasury {
        &self.treasury
    }

    pub fn retained(&self) -> Amount {
        self.treasury.retained()
    }

    pub fn payouts_of(&self, account: &Address) -> Amount {
        self.treasury.payouts_of(account)
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain()
    }

    pub fn pending_events(&self) -> &[Event] {
        self.events.pending()
    }
}
