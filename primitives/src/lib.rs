pub mod address;
pub mod events;
pub mod types;

pub use address::{Address, AddressParseError};
pub use events::{Component, Event, EventOutbox, TierChange};
pub use types::*;
