pub mod engine;
pub mod oracle;

pub use engine::{
    CreationQuote, Discount, MintQuote, MintQuotes, PricingEngine, RateOrigin, RateQuote, UsageReading,
};
pub use oracle::{MarketSnapshot, PriceOracle, PriceSheet};
