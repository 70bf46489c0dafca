pub mod accounts;
pub mod certificate;
pub mod ledger;
pub mod types;

pub use accounts::AccountState;
pub use certificate::EnergyCertificate;
pub use ledger::EnergyLedger;
pub use types::*;
