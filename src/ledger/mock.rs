use async_trait::async_trait;
use ethers::types::U256;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use crate::{
    ledger::{LedgerClient, RateSource},
    models::{ProgressionError, Result},
};

/// In-process ledger used by the CLI demo and tests.
/// Each reading can be switched off to exercise fallback paths.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    balances: RwLock<HashMap<String, U256>>,
    usage_counter: AtomicU64,
    tokens_per_base: RwLock<Option<Decimal>>,
    balance_offline: AtomicBool,
    usage_offline: AtomicBool,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(self, tokens_per_base: Decimal) -> Self {
        self.set_rate(Some(tokens_per_base));
        self
    }

    pub fn with_usage_counter(self, counter: u64) -> Self {
        self.usage_counter.store(counter, Ordering::SeqCst);
        self
    }

    pub fn set_balance(&self, address: &str, balance: U256) {
        if let Ok(mut balances) = self.balances.write() {
            balances.insert(address.to_lowercase(), balance);
        }
    }

    /// `None` makes the rate feed unavailable.
    pub fn set_rate(&self, tokens_per_base: Option<Decimal>) {
        if let Ok(mut rate) = self.tokens_per_base.write() {
            *rate = tokens_per_base;
        }
    }

    pub fn set_usage_counter(&self, counter: u64) {
        self.usage_counter.store(counter, Ordering::SeqCst);
    }

    pub fn set_balance_offline(&self, offline: bool) {
        self.balance_offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_usage_offline(&self, offline: bool) {
        self.usage_offline.store(offline, Ordering::SeqCst);
    }

    fn unavailable(&self, what: &str) -> ProgressionError {
        ProgressionError::LedgerError {
            source_name: "in_memory".to_string(),
            message: format!("{} unavailable", what),
        }
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    fn name(&self) -> String {
        "in_memory".to_string()
    }

    async fn token_balance(&self, address: &str) -> Result<U256> {
        if self.balance_offline.load(Ordering::SeqCst) {
            return Err(self.unavailable("balance"));
        }

        let balances = self
            .balances
            .read()
            .map_err(|_| self.unavailable("balance"))?;

        Ok(balances
            .get(&address.to_lowercase())
            .copied()
            .unwrap_or_default())
    }

    async fn global_usage_counter(&self) -> Result<u64> {
        if self.usage_offline.load(Ordering::SeqCst) {
            return Err(self.unavailable("usage counter"));
        }
        Ok(self.usage_counter.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl RateSource for InMemoryLedger {
    fn name(&self) -> String {
        "in_memory_rate".to_string()
    }

    async fn tokens_per_base(&self) -> Result<Decimal> {
        let rate = self
            .tokens_per_base
            .read()
            .map_err(|_| self.unavailable("exchange rate"))?;

        (*rate).ok_or_else(|| self.unavailable("exchange rate"))
    }
}
