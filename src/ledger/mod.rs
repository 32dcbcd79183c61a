pub mod cache;
pub mod client;
pub mod mock;
pub mod price_feed;
pub mod resilience;

pub use cache::LastKnown;
pub use client::{LedgerClient, LedgerClientConfig, RateSource};
pub use mock::InMemoryLedger;
pub use price_feed::HttpPriceFeed;
pub use resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitState, ResilientCaller, RetryConfig};
