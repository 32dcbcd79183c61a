pub mod aggregator;
pub mod config;
pub mod guard;
pub mod ledger;
pub mod models;
pub mod pricing;
pub mod storage;
pub mod tiers;

pub use aggregator::{EventOutcome, ProgressionTracker, Recorded};
pub use config::Settings;
pub use models::{Event, Profile, ProfileView, ProgressionError, Result, Tier};
pub use pricing::{PriceOracle, PricingEngine};

// Re-export commonly used types
pub use ethers::types::U256;
pub use rust_decimal::Decimal;
