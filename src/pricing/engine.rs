use ethers::types::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    config::PricingSettings,
    models::{
        amount::{decimal_to_units, whole_tokens},
        CreationMode, PaymentMode, Profile, Tier,
    },
};

const BPS_DENOMINATOR: u64 = 10_000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RateOrigin {
    Live,
    LastKnown,
    Default,
}

/// Exchange rate used for a quote. Anything not `Live` is a fallback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateQuote {
    pub tokens_per_base: Decimal,
    pub origin: RateOrigin,
    pub is_fallback: bool,
}

impl RateQuote {
    pub fn live(tokens_per_base: Decimal) -> Self {
        Self {
            tokens_per_base,
            origin: RateOrigin::Live,
            is_fallback: false,
        }
    }

    pub fn last_known(tokens_per_base: Decimal) -> Self {
        Self {
            tokens_per_base,
            origin: RateOrigin::LastKnown,
            is_fallback: true,
        }
    }

    pub fn default_rate(tokens_per_base: Decimal) -> Self {
        Self {
            tokens_per_base,
            origin: RateOrigin::Default,
            is_fallback: true,
        }
    }
}

/// Global count of wallet-gated creations as read from the ledger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageReading {
    pub global_creations: u64,
    pub is_fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Discount {
    pub eligible: bool,
    pub discount_bps: u16,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreationQuote {
    pub mode: CreationMode,
    #[serde(with = "crate::models::amount::u256_decimal")]
    pub list_cost: U256,
    pub discount_bps: u16,
    #[serde(with = "crate::models::amount::u256_decimal")]
    pub cost: U256,
    pub can_afford: bool,
    pub usage: UsageReading,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MintQuote {
    pub payment: PaymentMode,
    pub base_currency: Decimal,
    #[serde(with = "crate::models::amount::u256_decimal")]
    pub discount_tokens: U256,
    pub discount_bps: u16,
    pub can_afford: bool,
    pub is_fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MintQuotes {
    pub base_only: MintQuote,
    pub hybrid: MintQuote,
    pub token_only: MintQuote,
    pub rate: RateQuote,
}

impl MintQuotes {
    pub fn get(&self, payment: PaymentMode) -> &MintQuote {
        match payment {
            PaymentMode::BaseOnly => &self.base_only,
            PaymentMode::Hybrid => &self.hybrid,
            PaymentMode::TokenOnly => &self.token_only,
        }
    }
}

/// Pure price derivation. Never mutates the profile or the usage counter and
/// never consults the wallet's base-currency balance.
#[derive(Debug, Clone)]
pub struct PricingEngine {
    settings: PricingSettings,
    decimals: u32,
}

impl PricingEngine {
    pub fn new(settings: PricingSettings, decimals: u32) -> Self {
        Self { settings, decimals }
    }

    pub fn settings(&self) -> &PricingSettings {
        &self.settings
    }

    /// Rate to use when no live or last-known rate exists.
    pub fn default_rate(&self) -> RateQuote {
        RateQuote::default_rate(self.settings.default_tokens_per_base)
    }

    pub fn discount_for(&self, profile: &Profile) -> Discount {
        match profile.tier {
            Tier::PowerUser => Discount {
                eligible: true,
                discount_bps: self.settings.power_user_discount_bps,
                reason: "Power User discount".to_string(),
            },
            Tier::TokenHolder => Discount {
                eligible: true,
                discount_bps: self.settings.token_holder_discount_bps,
                reason: "Token Holder discount".to_string(),
            },
            Tier::Engaged | Tier::Newcomer => Discount {
                eligible: false,
                discount_bps: 0,
                reason: format!("Reach {} to unlock discounts", Tier::TokenHolder.label()),
            },
        }
    }

    /// Undiscounted wallet-gated creation cost in whole tokens. Steps up with
    /// global usage and never exceeds the cap.
    pub fn creation_list_tokens(&self, global_creations: u64) -> u64 {
        let s = &self.settings;
        let steps = global_creations / s.creation_usage_step.max(1);
        s.creation_base_cost
            .saturating_add(steps.saturating_mul(s.creation_cost_increment))
            .min(s.creation_cost_cap)
    }

    pub fn creation_cost(&self, profile: &Profile, mode: CreationMode, usage: UsageReading) -> CreationQuote {
        if mode == CreationMode::Free {
            return CreationQuote {
                mode,
                list_cost: U256::zero(),
                discount_bps: 0,
                cost: U256::zero(),
                can_afford: true,
                usage,
            };
        }

        let discount = self.discount_for(profile);
        let list_cost = whole_tokens(self.creation_list_tokens(usage.global_creations), self.decimals);
        let cost = apply_discount(list_cost, discount.discount_bps);

        CreationQuote {
            mode,
            list_cost,
            discount_bps: discount.discount_bps,
            cost,
            can_afford: profile.balances.balance >= cost,
            usage,
        }
    }

    pub fn base_only_price(&self, rate: &RateQuote) -> MintQuote {
        MintQuote {
            payment: PaymentMode::BaseOnly,
            base_currency: self.settings.nft_mint_price,
            discount_tokens: U256::zero(),
            discount_bps: 0,
            // Base currency lives in the wallet; the ledger rejects if short.
            can_afford: true,
            is_fallback: rate.is_fallback,
        }
    }

    pub fn hybrid_price(&self, profile: &Profile, rate: &RateQuote) -> MintQuote {
        let price = self.settings.nft_mint_price;
        let base_share = Decimal::from(self.settings.hybrid_base_share_bps) / Decimal::from(BPS_DENOMINATOR);
        let base_currency = (price * base_share).normalize();
        let token_value = price - base_currency;

        let discount = self.discount_for(profile);
        let tokens = apply_discount(self.tokens_for(token_value, rate), discount.discount_bps);

        MintQuote {
            payment: PaymentMode::Hybrid,
            base_currency,
            discount_tokens: tokens,
            discount_bps: discount.discount_bps,
            can_afford: profile.balances.balance >= tokens,
            is_fallback: rate.is_fallback,
        }
    }

    pub fn full_discount_token_price(&self, profile: &Profile, rate: &RateQuote) -> MintQuote {
        let discount = self.discount_for(profile);
        let tokens = apply_discount(self.tokens_for(self.settings.nft_mint_price, rate), discount.discount_bps);

        MintQuote {
            payment: PaymentMode::TokenOnly,
            base_currency: Decimal::ZERO,
            discount_tokens: tokens,
            discount_bps: discount.discount_bps,
            can_afford: profile.balances.balance >= tokens,
            is_fallback: rate.is_fallback,
        }
    }

    pub fn mint_quotes(&self, profile: &Profile, rate: &RateQuote) -> MintQuotes {
        MintQuotes {
            base_only: self.base_only_price(rate),
            hybrid: self.hybrid_price(profile, rate),
            token_only: self.full_discount_token_price(profile, rate),
            rate: rate.clone(),
        }
    }

    fn tokens_for(&self, base_amount: Decimal, rate: &RateQuote) -> U256 {
        // An unpriceable quote must never look affordable.
        let tokens = match base_amount.checked_mul(rate.tokens_per_base) {
            Some(tokens) => tokens,
            None => {
                warn!("{} x {} tokens overflows", base_amount, rate.tokens_per_base);
                return U256::MAX;
            }
        };
        match decimal_to_units(tokens, self.decimals) {
            Ok(units) => units,
            Err(e) => {
                warn!("Failed to convert {} tokens to base units: {}", tokens, e);
                U256::MAX
            }
        }
    }
}

fn apply_discount(amount: U256, discount_bps: u16) -> U256 {
    if discount_bps == 0 || amount == U256::MAX {
        return amount;
    }
    let bps = U256::from(discount_bps.min(BPS_DENOMINATOR as u16));
    let reduction = amount.saturating_mul(bps) / U256::from(BPS_DENOMINATOR);
    amount.saturating_sub(reduction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn engine() -> PricingEngine {
        PricingEngine::new(PricingSettings::default(), 18)
    }

    fn profile_with(tier: Tier, balance_tokens: u64) -> Profile {
        let mut p = Profile::new(Utc::now());
        p.tier = tier;
        p.balances.balance = whole_tokens(balance_tokens, 18);
        p
    }

    fn usage(n: u64) -> UsageReading {
        UsageReading {
            global_creations: n,
            is_fallback: false,
        }
    }

    #[test]
    fn test_creation_cost_is_monotonic_and_capped() {
        let e = engine();
        let mut last = 0;
        for n in (0..200_000).step_by(997) {
            let cost = e.creation_list_tokens(n);
            assert!(cost >= last);
            assert!(cost <= 1_000);
            last = cost;
        }
        assert_eq!(e.creation_list_tokens(0), 100);
        assert_eq!(e.creation_list_tokens(2_500), 120);
        assert_eq!(e.creation_list_tokens(10_000_000), 1_000);
    }

    #[test]
    fn test_free_creation_costs_nothing() {
        let quote = engine().creation_cost(&profile_with(Tier::Newcomer, 0), CreationMode::Free, usage(5_000));
        assert!(quote.cost.is_zero());
        assert!(quote.can_afford);
    }

    #[test]
    fn test_wallet_creation_discount_and_affordability() {
        let e = engine();
        let holder = profile_with(Tier::TokenHolder, 1_000);
        let quote = e.creation_cost(&holder, CreationMode::WalletGated, usage(0));
        assert_eq!(quote.list_cost, whole_tokens(100, 18));
        assert_eq!(quote.cost, whole_tokens(90, 18));
        assert!(quote.can_afford);

        let broke = profile_with(Tier::Engaged, 50);
        let quote = e.creation_cost(&broke, CreationMode::WalletGated, usage(0));
        assert_eq!(quote.cost, whole_tokens(100, 18));
        assert!(!quote.can_afford);
    }

    #[test]
    fn test_base_only_always_affordable() {
        let e = engine();
        let quote = e.base_only_price(&RateQuote::live(Decimal::from(100_000)));
        assert!(quote.can_afford);
        assert!(quote.discount_tokens.is_zero());
        assert_eq!(quote.base_currency, Decimal::new(1, 3));
    }

    #[test]
    fn test_hybrid_splits_price() {
        let e = engine();
        let p = profile_with(Tier::Engaged, 10);
        let quote = e.hybrid_price(&p, &RateQuote::live(Decimal::from(100_000)));
        assert_eq!(quote.base_currency, Decimal::new(5, 4));
        // 0.0005 ETH * 100_000 = 50 tokens
        assert_eq!(quote.discount_tokens, whole_tokens(50, 18));
        assert!(!quote.can_afford);
        assert!(!quote.is_fallback);
    }

    #[test]
    fn test_full_discount_token_price_with_power_user_discount() {
        let e = engine();
        let p = profile_with(Tier::PowerUser, 100);
        let quote = e.full_discount_token_price(&p, &RateQuote::live(Decimal::from(100_000)));
        assert!(quote.base_currency.is_zero());
        // 100 tokens less 25%
        assert_eq!(quote.discount_tokens, whole_tokens(75, 18));
        assert!(quote.can_afford);
    }

    #[test]
    fn test_default_rate_is_flagged() {
        let e = engine();
        let rate = e.default_rate();
        assert!(rate.is_fallback);
        assert_eq!(rate.origin, RateOrigin::Default);

        let quotes = e.mint_quotes(&profile_with(Tier::Newcomer, 0), &rate);
        assert!(quotes.token_only.is_fallback);
        assert!(quotes.get(PaymentMode::Hybrid).is_fallback);
    }

    #[test]
    fn test_discount_eligibility() {
        let e = engine();
        assert!(!e.discount_for(&profile_with(Tier::Engaged, 0)).eligible);
        let d = e.discount_for(&profile_with(Tier::PowerUser, 0));
        assert!(d.eligible);
        assert_eq!(d.discount_bps, 2_500);
    }

    #[test]
    fn test_overflowing_rate_is_unaffordable() {
        let e = PricingEngine::new(
            PricingSettings {
                nft_mint_price: Decimal::from(2),
                ..PricingSettings::default()
            },
            18,
        );
        let p = profile_with(Tier::TokenHolder, 1_000_000);
        let quote = e.full_discount_token_price(&p, &RateQuote::live(Decimal::MAX));
        assert_eq!(quote.discount_tokens, U256::MAX);
        assert!(!quote.can_afford);
    }
}
