use async_trait::async_trait;
use ethers::types::U256;
use rust_decimal::Decimal;

use crate::ledger::resilience::{CircuitBreakerConfig, ResilientCaller, RetryConfig};
use crate::models::Result;
use std::time::Duration;

/// Read-only view of the chain-side ledger. The engine never writes through
/// this seam; spends are executed by the Web3 layer and reported back as
/// events.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Name used in logs and circuit breaker ids
    fn name(&self) -> String;

    /// Discount-token balance held on chain by `address`, in base units
    async fn token_balance(&self, address: &str) -> Result<U256>;

    /// Global number of wallet-gated creations, used by creation pricing
    async fn global_usage_counter(&self) -> Result<u64>;
}

/// Live exchange rate between the discount token and the base currency.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RateSource: Send + Sync {
    fn name(&self) -> String;

    /// How many discount tokens one unit of base currency buys
    async fn tokens_per_base(&self) -> Result<Decimal>;
}

/// Timeouts and retry budget for ledger-facing calls.
#[derive(Debug, Clone)]
pub struct LedgerClientConfig {
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub rate_fresh_ttl_seconds: u64,
}

impl LedgerClientConfig {
    /// Breaker, retry budget and per-attempt timeout for one ledger seam.
    pub fn caller(&self, name: String) -> ResilientCaller {
        let retry = RetryConfig {
            max_attempts: self.max_retries.max(1),
            ..Default::default()
        };
        ResilientCaller::new(
            name,
            CircuitBreakerConfig::default(),
            retry,
            Duration::from_secs(self.timeout_seconds.max(1)),
        )
    }
}

impl From<&crate::config::LedgerSettings> for LedgerClientConfig {
    fn from(settings: &crate::config::LedgerSettings) -> Self {
        Self {
            timeout_seconds: settings.timeout_seconds,
            max_retries: settings.max_retries,
            rate_fresh_ttl_seconds: settings.rate_fresh_ttl_seconds,
        }
    }
}
