pub mod log;
pub mod marketplace;
pub mod operation;
pub mod shared;
pub mod types;

pub use log::{EventLog, Notification};
pub use marketplace::Marketplace;
pub use operation::{Operation, Outcome};
pub use shared::MarketHandle;
pub use types::*;
