use config::{Config, ConfigError, File};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub app: AppSettings,
    pub token: TokenSettings,
    pub tiers: TierThresholds,
    pub pricing: PricingSettings,
    pub gate: GateSettings,
    pub storage: StorageSettings,
    pub ledger: LedgerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub name: String,
    pub version: String,
    pub log_level: String,
    pub environment: Environment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSettings {
    pub symbol: String,
    pub decimals: u32,
    pub base_currency_symbol: String,
}

/// Tier cut-offs. Balances are in whole tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TierThresholds {
    pub newcomer_games_target: u64,
    pub engaged_min_creations: u64,
    pub token_holder_min_balance: u64,
    pub power_user_min_wallet_creations: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingSettings {
    /// NFT mint price in base currency.
    pub nft_mint_price: Decimal,
    /// Share of the mint price still paid in base currency on a hybrid quote.
    pub hybrid_base_share_bps: u16,
    /// Discount tokens per one unit of base currency when no live rate exists.
    pub default_tokens_per_base: Decimal,
    pub creation_base_cost: u64,
    pub creation_cost_increment: u64,
    pub creation_usage_step: u64,
    pub creation_cost_cap: u64,
    pub token_holder_discount_bps: u16,
    pub power_user_discount_bps: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateSettings {
    pub cooldown_seconds: u64,
    pub min_plausible_time_secs: f64,
    pub max_plausible_accuracy: f64,
    pub speed_runner_time_secs: f64,
    pub comeback_min_attempts: u32,
    pub comeback_min_accuracy: f64,
    pub perfect_accuracy: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub sqlite_url: String,
    pub max_connections: u32,
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSettings {
    pub price_feed_url: Option<String>,
    /// JSON pointer to the tokens-per-base value in the feed response.
    pub price_pointer: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub rate_fresh_ttl_seconds: u64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            newcomer_games_target: 3,
            engaged_min_creations: 1,
            token_holder_min_balance: 1_000,
            power_user_min_wallet_creations: 5,
        }
    }
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            nft_mint_price: Decimal::new(1, 3), // 0.001 ETH
            hybrid_base_share_bps: 5_000,
            default_tokens_per_base: Decimal::from(100_000),
            creation_base_cost: 100,
            creation_cost_increment: 10,
            creation_usage_step: 1_000,
            creation_cost_cap: 1_000,
            token_holder_discount_bps: 1_000,
            power_user_discount_bps: 2_500,
        }
    }
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            cooldown_seconds: 3_600,
            min_plausible_time_secs: 10.0,
            max_plausible_accuracy: 95.0,
            speed_runner_time_secs: 30.0,
            comeback_min_attempts: 5,
            comeback_min_accuracy: 90.0,
            perfect_accuracy: 100.0,
        }
    }
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            symbol: "LUB".to_string(),
            decimals: 18,
            base_currency_symbol: "ETH".to_string(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app: AppSettings {
                name: "Progression Engine".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                log_level: "info".to_string(),
                environment: Environment::Development,
            },
            token: TokenSettings::default(),
            tiers: TierThresholds::default(),
            pricing: PricingSettings::default(),
            gate: GateSettings::default(),
            storage: StorageSettings {
                backend: StorageBackend::Sqlite,
                sqlite_url: "sqlite://progression.db?mode=rwc".to_string(),
                max_connections: 5,
                namespace: "progression".to_string(),
            },
            ledger: LedgerSettings {
                price_feed_url: None,
                price_pointer: "/tokens_per_base".to_string(),
                timeout_seconds: 10,
                max_retries: 3,
                rate_fresh_ttl_seconds: 300,
            },
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("PROGRESSION").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::from(path.as_ref()))
            .build()?;

        s.try_deserialize()
    }

    /// Key under which the single profile record lives.
    pub fn profile_key(&self) -> String {
        format!("{}:profile:v1", self.storage.namespace)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.token.decimals > 36 {
            return Err(format!("Token decimals must be <= 36, got {}", self.token.decimals));
        }

        if self.tiers.newcomer_games_target == 0 || self.tiers.power_user_min_wallet_creations == 0 {
            return Err("Tier targets must be positive".to_string());
        }

        if self.tiers.token_holder_min_balance == 0 {
            return Err("Token holder balance threshold must be positive".to_string());
        }

        let p = &self.pricing;
        if p.hybrid_base_share_bps > 10_000 || p.token_holder_discount_bps > 10_000 || p.power_user_discount_bps > 10_000 {
            return Err("Basis point values must be <= 10000".to_string());
        }

        if p.default_tokens_per_base <= Decimal::ZERO {
            return Err("Default exchange rate must be positive".to_string());
        }

        if p.nft_mint_price < Decimal::ZERO {
            return Err("NFT mint price must not be negative".to_string());
        }

        if p.creation_usage_step == 0 {
            return Err("Creation usage step must be positive".to_string());
        }

        if p.creation_cost_cap < p.creation_base_cost {
            return Err("Creation cost cap must be >= base cost".to_string());
        }

        let g = &self.gate;
        if g.cooldown_seconds > 31_536_000 {
            return Err(format!(
                "Submission cooldown must be at most one year, got {}s",
                g.cooldown_seconds
            ));
        }

        if !(0.0..=100.0).contains(&g.max_plausible_accuracy) || !(0.0..=100.0).contains(&g.perfect_accuracy) {
            return Err("Accuracy thresholds must be between 0 and 100".to_string());
        }

        if self.storage.namespace.trim().is_empty() {
            return Err("Storage namespace must not be empty".to_string());
        }

        Ok(())
    }
}
