pub mod builder;
pub mod config;
pub mod types;

pub use builder::GenesisBuilder;
pub use config::GenesisConfig;
pub use types::*;
