use gridmart_energy::{EnergyCertificate, EnergyLedger};
use gridmart_exchange::{Exchange, FeeQuote, Listing, Sale};
use gridmart_genesis::GenesisConfig;
use gridmart_loyalty::{DiscountTier, LoyaltyEngine};
use gridmart_primitives::{
    Address, Amount, CertificateId, DiscountPercent, Event, Points, Rate,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::log::EventLog;
use crate::operation::{Operation, Outcome};
use crate::types::{MarketError, Receipt, SupplySummary};

/// State owned by the three components. Cloned as the rollback snapshot.
#[derive(Debug, Clone)]
struct Components {
    ledger: EnergyLedger,
    loyalty: LoyaltyEngine,
    exchange: Exchange,
}

impl Components {
    /// Drain outboxes in dependency order. Cross-component operations
    /// already forward callee events to their caller's outbox.
    fn drain_events(&mut self) -> Vec<Event> {
        let mut events = self.ledger.drain_events();
        events.extend(self.loyalty.drain_events());
        events.extend(self.exchange.drain_events());
        events
    }
}

/// Coordinator for the energy ledger, loyalty engine and exchange.
///
/// Each operation is all-or-nothing: the component state is snapshotted
/// first and restored if the operation fails, in which case nothing is
/// published. Operations are applied one at a time through `&mut self`;
/// see [`crate::MarketHandle`] for sharing across threads.
#[derive(Debug, Clone)]
pub struct Marketplace {
    state: Components,
    log: EventLog,
    ops_applied: u64,
}

impl Marketplace {
    /// Wire up a fresh market: the ledger accepts `exchange` as its
    /// marketplace and the loyalty engine authorizes it to credit points.
    pub fn new(owner: Address, exchange: Address, commission_rate: Rate) -> Result<Self, MarketError> {
        let mut ledger = EnergyLedger::new(owner);
        ledger.set_marketplace(owner, exchange)?;
        let mut loyalty = LoyaltyEngine::new(owner);
        loyalty.set_authorized_caller(owner, exchange, true)?;
        let exchange = Exchange::new(exchange, owner, commission_rate)?;

        let mut market = Self {
            state: Components {
                ledger,
                loyalty,
                exchange,
            },
            log: EventLog::new(),
            ops_applied: 0,
        };
        market.publish();
        Ok(market)
    }

    /// Build a market from a validated genesis configuration. Genesis
    /// notifications are the first entries of the log.
    pub fn from_genesis(genesis: &GenesisConfig) -> Result<Self, MarketError> {
        genesis.validate()?;
        let params = &genesis.params;
        let owner = params.owner;

        let mut market = Self::new(owner, params.exchange, params.commission_rate)?;
        let state = &mut market.state;
        state.exchange = state
            .exchange
            .clone()
            .with_points_divisor(params.points_divisor)?;
        for tier in &genesis.tiers {
            state.loyalty.add_tier(owner, tier.threshold, tier.discount)?;
        }
        for caller in &genesis.authorized_callers {
            state.loyalty.set_authorized_caller(owner, *caller, true)?;
        }
        for acct in &genesis.accounts {
            state.ledger.produce_energy(owner, acct.address, acct.energy)?;
        }
        market.publish();

        info!(
            market_id = %genesis.market_id,
            accounts = genesis.accounts.len(),
            tiers = genesis.tiers.len(),
            genesis_hash = %hex::encode(genesis.genesis_hash),
            "market initialized from genesis"
        );
        Ok(market)
    }

    fn publish(&mut self) -> Vec<u64> {
        let events = self.state.drain_events();
        self.log.append(events)
    }

    /// Run `f` atomically against the component state.
    ///
    /// The rollback snapshot is a full clone of all three components, so
    /// each operation costs O(total state) on top of its own work. The
    /// components already check every precondition before writing; the
    /// snapshot covers operations that span several of them, such as
    /// `transfer_ownership`.
    fn transact<T>(
        &mut self,
        operation: &'static str,
        f: impl FnOnce(&mut Components) -> Result<T, MarketError>,
    ) -> Result<T, MarketError> {
        let snapshot = self.state.clone();
        self.ops_applied += 1;
        match f(&mut self.state) {
            Ok(value) => {
                let seqs = self.publish();
                debug!(operation, notifications = seqs.len(), "operation committed");
                Ok(value)
            }
            Err(e) => {
                self.state = snapshot;
                debug!(operation, error = %e, "operation rolled back");
                Err(e)
            }
        }
    }

    pub fn produce_energy(&mut self, admin: Address, account: Address, amount: Amount) -> Result<Amount, MarketError> {
        self.transact("produce_energy", |s| {
            Ok(s.ledger.produce_energy(admin, account, amount)?)
        })
    }

    pub fn mint(&mut self, owner: Address, metadata_ref: &str, amount: Amount) -> Result<CertificateId, MarketError> {
        self.transact("mint", |s| Ok(s.ledger.mint(owner, metadata_ref, amount)?))
    }

    /// Direct certificate transfer. Refused while the certificate is
    /// listed; a listed certificate changes hands only through `buy`.
    pub fn transfer_certificate(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        id: CertificateId,
    ) -> Result<(), MarketError> {
        self.transact("transfer_certificate", |s| {
            s.exchange.ensure_unlisted(id)?;
            Ok(s.ledger.transfer_certificate(caller, from, to, id)?)
        })
    }

    pub fn set_marketplace_address(&mut self, admin: Address, marketplace: Address) -> Result<(), MarketError> {
        self.transact("set_marketplace_address", |s| {
            Ok(s.ledger.set_marketplace(admin, marketplace)?)
        })
    }

    pub fn mint_and_list(
        &mut self,
        seller: Address,
        metadata_ref: &str,
        energy: Amount,
        price: Amount,
    ) -> Result<CertificateId, MarketError> {
        self.transact("mint_and_list", |s| {
            Ok(s
                .exchange
                .mint_and_list(&mut s.ledger, seller, metadata_ref, energy, price)?)
        })
    }

    pub fn list(&mut self, seller: Address, id: CertificateId, price: Amount) -> Result<(), MarketError> {
        self.transact("list", |s| Ok(s.exchange.list(&s.ledger, seller, id, price)?))
    }

    pub fn buy(&mut self, buyer: Address, id: CertificateId, payment: Amount) -> Result<Sale, MarketError> {
        self.transact("buy", |s| {
            Ok(s
                .exchange
                .buy(&mut s.ledger, &mut s.loyalty, buyer, id, payment)?)
        })
    }

    pub fn cancel_listing(&mut self, caller: Address, id: CertificateId) -> Result<(), MarketError> {
        self.transact("cancel_listing", |s| Ok(s.exchange.cancel_listing(caller, id)?))
    }

    pub fn update_price(&mut self, caller: Address, id: CertificateId, price: Amount) -> Result<(), MarketError> {
        self.transact("update_price", |s| {
            Ok(s.exchange.update_price(caller, id, price)?)
        })
    }

    pub fn update_commission_rate(&mut self, admin: Address, rate: Rate) -> Result<(), MarketError> {
        self.transact("update_commission_rate", |s| {
            Ok(s.exchange.update_commission_rate(admin, rate)?)
        })
    }

    pub fn withdraw_fees(&mut self, admin: Address, amount: Amount) -> Result<(), MarketError> {
        self.transact("withdraw_fees", |s| Ok(s.exchange.withdraw_fees(admin, amount)?))
    }

    pub fn add_points(&mut self, caller: Address, account: Address, points: Points) -> Result<Points, MarketError> {
        self.transact("add_points", |s| Ok(s.loyalty.add_points(caller, account, points)?))
    }

    pub fn add_tier(&mut self, admin: Address, threshold: Points, discount: DiscountPercent) -> Result<usize, MarketError> {
        self.transact("add_tier", |s| Ok(s.loyalty.add_tier(admin, threshold, discount)?))
    }

    pub fn update_tier(
        &mut self,
        admin: Address,
        index: usize,
        threshold: Points,
        discount: DiscountPercent,
    ) -> Result<(), MarketError> {
        self.transact("update_tier", |s| {
            Ok(s.loyalty.update_tier(admin, index, threshold, discount)?)
        })
    }

    pub fn remove_tier(&mut self, admin: Address, index: usize) -> Result<DiscountTier, MarketError> {
        self.transact("remove_tier", |s| Ok(s.loyalty.remove_tier(admin, index)?))
    }

    pub fn set_authorized_caller(&mut self, admin: Address, identity: Address, allowed: bool) -> Result<(), MarketError> {
        self.transact("set_authorized_caller", |s| {
            Ok(s.loyalty.set_authorized_caller(admin, identity, allowed)?)
        })
    }

    /// Hand every component's admin role to `new_owner` in one operation.
    ///
    /// `admin` must currently own all three components; if any component
    /// refuses, none of them change hands.
    pub fn transfer_ownership(&mut self, admin: Address, new_owner: Address) -> Result<(), MarketError> {
        self.transact("transfer_ownership", |s| {
            s.ledger.transfer_ownership(admin, new_owner)?;
            s.loyalty.transfer_ownership(admin, new_owner)?;
            s.exchange.transfer_ownership(admin, new_owner)?;
            info!(previous = %admin, %new_owner, "market ownership transferred");
            Ok(())
        })
    }

    fn dispatch(&mut self, op: Operation) -> Result<Outcome, MarketError> {
        let outcome = match op {
            Operation::ProduceEnergy {
                admin,
                account,
                amount,
            } => Outcome::Balance(self.produce_energy(admin, account, amount)?),
            Operation::Mint {
                owner,
                metadata_ref,
                amount,
            } => Outcome::Certificate(self.mint(owner, &metadata_ref, amount)?),
            Operation::TransferCertificate {
                caller,
                from,
                to,
                id,
            } => {
                self.transfer_certificate(caller, from, to, id)?;
                Outcome::Done
            }
            Operation::MintAndList {
                seller,
                metadata_ref,
                energy,
                price,
            } => Outcome::Certificate(self.mint_and_list(seller, &metadata_ref, energy, price)?),
            Operation::List { seller, id, price } => {
                self.list(seller, id, price)?;
                Outcome::Done
            }
            Operation::Buy { buyer, id, payment } => Outcome::Sale(self.buy(buyer, id, payment)?),
            Operation::CancelListing { caller, id } => {
                self.cancel_listing(caller, id)?;
                Outcome::Done
            }
            Operation::UpdatePrice { caller, id, price } => {
                self.update_price(caller, id, price)?;
                Outcome::Done
            }
            Operation::UpdateCommissionRate { admin, rate } => {
                self.update_commission_rate(admin, rate)?;
                Outcome::Done
            }
            Operation::WithdrawFees { admin, amount } => {
                self.withdraw_fees(admin, amount)?;
                Outcome::Done
            }
            Operation::AddTier {
                admin,
                threshold,
                discount,
            } => Outcome::TierIndex(self.add_tier(admin, threshold, discount)?),
            Operation::UpdateTier {
                admin,
                index,
                threshold,
                discount,
            } => {
                self.update_tier(admin, index, threshold, discount)?;
                Outcome::Done
            }
            Operation::RemoveTier { admin, index } => Outcome::RemovedTier(self.remove_tier(admin, index)?),
            Operation::SetAuthorizedCaller {
                admin,
                identity,
                allowed,
            } => {
                self.set_authorized_caller(admin, identity, allowed)?;
                Outcome::Done
            }
            Operation::AddPoints {
                caller,
                account,
                points,
            } => Outcome::Points(self.add_points(caller, account, points)?),
            Operation::SetMarketplaceAddress { admin, marketplace } => {
                self.set_marketplace_address(admin, marketplace)?;
                Outcome::Done
            }
            Operation::TransferOwnership { admin, new_owner } => {
                self.transfer_ownership(admin, new_owner)?;
                Outcome::Done
            }
        };
        Ok(outcome)
    }

    /// Apply one operation and describe what happened.
    pub fn apply(&mut self, op: Operation) -> Receipt {
        let operation = op.name();
        let index = self.ops_applied;
        let first_seq = self.log.next_seq();

        match self.dispatch(op) {
            Ok(outcome) => Receipt {
                index,
                operation: operation.to_string(),
                success: true,
                outcome: Some(outcome),
                error: None,
                notifications: (first_seq..self.log.next_seq()).collect(),
            },
            Err(e) => {
                warn!(index, operation, error = %e, "operation failed");
                Receipt {
                    index,
                    operation: operation.to_string(),
                    success: false,
                    outcome: None,
                    error: Some(e.to_string()),
                    notifications: Vec::new(),
                }
            }
        }
    }

    /// Apply operations in order. A failed operation produces a receipt
    /// with `success = false` and does not affect the others.
    pub fn apply_batch(&mut self, ops: Vec<Operation>) -> Vec<Receipt> {
        ops.into_iter().map(|op| self.apply(op)).collect()
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.state.ledger.balance_of(account)
    }

    pub fn points_of(&self, account: &Address) -> Points {
        self.state.loyalty.points_of(account)
    }

    /// Effective commission rate (at `PRECISION`) for a holder of `points`.
    pub fn commission_rate(&self, points: Points) -> Rate {
        self.state
            .loyalty
            .commission_rate(points, self.state.exchange.commission_rate())
    }

    pub fn calculate_fee(&self, price: Amount, seller: &Address) -> Amount {
        self.state
            .exchange
            .calculate_fee(&self.state.loyalty, price, seller)
    }

    pub fn quote(&self, price: Amount, seller: &Address) -> FeeQuote {
        self.state.exchange.quote(&self.state.loyalty, price, seller)
    }

    pub fn listing(&self, id: CertificateId) -> Option<&Listing> {
        self.state.exchange.listing(id)
    }

    pub fn certificate(&self, id: CertificateId) -> Option<&EnergyCertificate> {
        self.state.ledger.certificate(id)
    }

    pub fn ledger(&self) -> &EnergyLedger {
        &self.state.ledger
    }

    pub fn loyalty(&self) -> &LoyaltyEngine {
        &self.state.loyalty
    }

    pub fn exchange(&self) -> &Exchange {
        &self.state.exchange
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Number of operations attempted, including failed ones.
    pub fn ops_applied(&self) -> u64 {
        self.ops_applied
    }

    pub fn supply(&self) -> SupplySummary {
        let ledger = &self.state.ledger;
        SupplySummary {
            produced: ledger.total_produced(),
            liquid: ledger.total_liquid(),
            bound: ledger.total_bound(),
        }
    }

    /// Σ liquid + Σ bound == Σ produced.
    pub fn check_conservation(&self) -> bool {
        self.supply().is_conserved()
    }

    /// Deterministic SHA-256 over the full market state, independent of
    /// map iteration order.
    pub fn state_root(&self) -> [u8; 32] {
        let s = &self.state;

        let mut balances: Vec<_> = s
            .ledger
            .accounts()
            .map(|(addr, acct)| (*addr, acct.balance))
            .collect();
        balances.sort();
        let mut points: Vec<_> = s.loyalty.accounts().map(|(a, p)| (*a, *p)).collect();
        points.sort();
        let mut authorized: Vec<_> = s.loyalty.authorized_callers().copied().collect();
        authorized.sort();
        let mut payouts: Vec<_> = s
            .exchange
            .treasury()
            .payouts()
            .map(|(a, v)| (*a, *v))
            .collect();
        payouts.sort();

        let canonical = CanonicalState {
            owners: [s.ledger.owner(), s.loyalty.owner(), s.exchange.owner()],
            marketplace: s.ledger.marketplace(),
            balances,
            certificates: s.ledger.certificates().collect(),
            next_certificate_id: s.ledger.next_certificate_id(),
            total_produced: s.ledger.total_produced(),
            points,
            tiers: s.loyalty.tiers().as_slice(),
            authorized,
            listings: s.exchange.listings().collect(),
            commission_rate: s.exchange.commission_rate(),
            points_divisor: s.exchange.points_divisor(),
            retained: s.exchange.retained(),
            payouts,
        };

        let encoded =
            serde_json::to_vec(&canonical).expect("market state serialization should never fail");
        let digest = Sha256::digest(&encoded);
        let mut root = [0u8; 32];
        root.copy_from_slice(&digest);
        root
    }
}

#[derive(Serialize)]
struct CanonicalState<'a> {
    owners: [Address; 3],
    marketplace: Option<Address>,
    balances: Vec<(Address, Amount)>,
    certificates: Vec<&'a EnergyCertificate>,
    next_certificate_id: CertificateId,
    total_produced: Amount,
    points: Vec<(Address, Points)>,
    tiers: &'a [DiscountTier],
    authorized: Vec<Address>,
    listings: Vec<&'a Listing>,
    commission_rate: Rate,
    points_divisor: u64,
    retained: Amount,
    payouts: Vec<(Address, Amount)>,
}
