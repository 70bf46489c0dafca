pub mod exchange;
pub mod fee;
pub mod treasury;
pub mod types;

pub use exchange::Exchange;
pub use fee::{FeeQuote, DEFAULT_POINTS_DIVISOR};
pub use treasury::Treasury;
pub use types::*;
