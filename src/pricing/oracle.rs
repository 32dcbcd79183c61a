use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    ledger::{LastKnown, LedgerClient, LedgerClientConfig, RateSource, ResilientCaller},
    models::{CreationMode, Profile},
    pricing::engine::{CreationQuote, Discount, MintQuote, MintQuotes, PricingEngine, RateQuote, UsageReading},
};

/// External readings a quote was computed from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketSnapshot {
    pub rate: RateQuote,
    pub usage: UsageReading,
}

impl MarketSnapshot {
    pub fn is_fallback(&self) -> bool {
        self.rate.is_fallback || self.usage.is_fallback
    }
}

/// Everything the UI needs to render prices for one profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceSheet {
    pub discount: Discount,
    pub creation: CreationQuote,
    pub mints: MintQuotes,
    pub market: MarketSnapshot,
}

/// Resolves the ledger readings the pure engine needs. Never fails: every
/// unavailable reading degrades to last-known, then to a default, and is
/// flagged.
pub struct PriceOracle {
    engine: PricingEngine,
    ledger: Arc<dyn LedgerClient>,
    rates: Arc<dyn RateSource>,
    rate_caller: ResilientCaller,
    usage_caller: ResilientCaller,
    fresh_for: Duration,
    last_rate: Mutex<Option<LastKnown<Decimal>>>,
    last_usage: Mutex<Option<LastKnown<u64>>>,
}

impl PriceOracle {
    pub fn new(
        engine: PricingEngine,
        ledger: Arc<dyn LedgerClient>,
        rates: Arc<dyn RateSource>,
        config: LedgerClientConfig,
    ) -> Self {
        Self {
            rate_caller: config.caller(rates.name()),
            usage_caller: config.caller(ledger.name()),
            engine,
            ledger,
            rates,
            fresh_for: Duration::from_secs(config.rate_fresh_ttl_seconds),
            last_rate: Mutex::new(None),
            last_usage: Mutex::new(None),
        }
    }

    pub fn engine(&self) -> &PricingEngine {
        &self.engine
    }

    pub async fn exchange_rate(&self) -> RateQuote {
        let cached = self
            .last_rate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        if let Some(entry) = &cached {
            if entry.is_fresh() {
                return RateQuote::live(entry.value);
            }
        }

        let rates = self.rates.clone();
        let fetched = self
            .rate_caller
            .call(|| {
                let rates = rates.clone();
                async move { rates.tokens_per_base().await }
            })
            .await;

        match fetched {
            Ok(rate) if rate > Decimal::ZERO => {
                *self.last_rate.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(LastKnown::new(rate, self.fresh_for));
                debug!("Live exchange rate: {} tokens per base", rate);
                RateQuote::live(rate)
            }
            Ok(rate) => {
                warn!("Ignoring non-positive exchange rate {}", rate);
                self.rate_fallback(cached)
            }
            Err(e) => {
                warn!("Exchange rate unavailable: {}", e);
                self.rate_fallback(cached)
            }
        }
    }

    fn rate_fallback(&self, cached: Option<LastKnown<Decimal>>) -> RateQuote {
        match cached {
            Some(entry) => {
                warn!("Using last-known exchange rate {} ({:?} old)", entry.value, entry.age());
                RateQuote::last_known(entry.value)
            }
            None => {
                let rate = self.engine.default_rate();
                warn!("Using default exchange rate {}", rate.tokens_per_base);
                rate
            }
        }
    }

    pub async fn usage_counter(&self) -> UsageReading {
        let ledger = self.ledger.clone();
        let fetched = self
            .usage_caller
            .call(|| {
                let ledger = ledger.clone();
                async move { ledger.global_usage_counter().await }
            })
            .await;

        let mut last = self.last_usage.lock().unwrap_or_else(PoisonError::into_inner);
        match fetched {
            Ok(counter) => {
                *last = Some(LastKnown::new(counter, self.fresh_for));
                UsageReading {
                    global_creations: counter,
                    is_fallback: false,
                }
            }
            Err(e) => {
                let global_creations = last.as_ref().map(|entry| entry.value).unwrap_or(0);
                warn!("Usage counter unavailable ({}), using {}", e, global_creations);
                UsageReading {
                    global_creations,
                    is_fallback: true,
                }
            }
        }
    }

    pub async fn market(&self) -> MarketSnapshot {
        let (rate, usage) = futures::join!(self.exchange_rate(), self.usage_counter());
        MarketSnapshot { rate, usage }
    }

    pub async fn full_discount_token_price(&self, profile: &Profile) -> MintQuote {
        let rate = self.exchange_rate().await;
        self.engine.full_discount_token_price(profile, &rate)
    }

    pub async fn creation_cost(&self, profile: &Profile, mode: CreationMode) -> CreationQuote {
        let usage = self.usage_counter().await;
        self.engine.creation_cost(profile, mode, usage)
    }

    pub async fn price_sheet(&self, profile: &Profile) -> PriceSheet {
        let market = self.market().await;
        PriceSheet {
            discount: self.engine.discount_for(profile),
            creation: self.engine.creation_cost(profile, CreationMode::WalletGated, market.usage),
            mints: self.engine.mint_quotes(profile, &market.rate),
            market,
        }
    }
}
