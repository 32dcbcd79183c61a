use ethers::types::U256;

use crate::{
    config::TierThresholds,
    models::{amount::{format_token_amount, whole_tokens}, Profile, Tier},
};

/// Tier, progress and next-step text for a profile.
#[derive(Debug, Clone, PartialEq)]
pub struct TierStanding {
    pub tier: Tier,
    pub progress: u8,
    pub next_requirement: String,
}

/// Pure tier derivation over the raw profile fields.
#[derive(Debug, Clone)]
pub struct TierClassifier {
    thresholds: TierThresholds,
    min_balance: U256,
    decimals: u32,
    symbol: String,
}

impl TierClassifier {
    pub fn new(thresholds: TierThresholds, decimals: u32, symbol: impl Into<String>) -> Self {
        let min_balance = whole_tokens(thresholds.token_holder_min_balance, decimals);
        Self {
            thresholds,
            min_balance,
            decimals,
            symbol: symbol.into(),
        }
    }

    pub fn thresholds(&self) -> &TierThresholds {
        &self.thresholds
    }

    /// Precedence: balance + wallet-gated creations, then balance, then any
    /// creation or transaction.
    pub fn classify(&self, profile: &Profile) -> Tier {
        let balance = profile.balances.balance;
        let holds_enough = balance >= self.min_balance;

        if holds_enough && profile.counters.wallet_creations >= self.thresholds.power_user_min_wallet_creations {
            return Tier::PowerUser;
        }

        if holds_enough {
            return Tier::TokenHolder;
        }

        if profile.counters.total_creations() >= self.thresholds.engaged_min_creations || profile.has_transacted {
            return Tier::Engaged;
        }

        Tier::Newcomer
    }

    pub fn progress(&self, profile: &Profile) -> u8 {
        self.progress_for(self.classify(profile), profile)
    }

    pub fn next_requirement(&self, profile: &Profile) -> String {
        self.requirement_for(self.classify(profile), profile)
    }

    pub fn standing(&self, profile: &Profile) -> TierStanding {
        let tier = self.classify(profile);
        TierStanding {
            tier,
            progress: self.progress_for(tier, profile),
            next_requirement: self.requirement_for(tier, profile),
        }
    }

    /// Overwrite the derived fields of `profile` from its raw fields.
    pub fn derive(&self, profile: &mut Profile) {
        let standing = self.standing(profile);
        profile.tier = standing.tier;
        profile.tier_progress = standing.progress;
        profile.next_requirement = standing.next_requirement;
    }

    fn progress_for(&self, tier: Tier, profile: &Profile) -> u8 {
        match tier {
            Tier::Newcomer => ratio_percent(profile.counters.games_completed, self.thresholds.newcomer_games_target),
            Tier::Engaged => u256_percent(profile.balances.balance, self.min_balance),
            Tier::TokenHolder => ratio_percent(
                profile.counters.wallet_creations,
                self.thresholds.power_user_min_wallet_creations,
            ),
            Tier::PowerUser => 100,
        }
    }

    fn requirement_for(&self, tier: Tier, profile: &Profile) -> String {
        let t = &self.thresholds;
        match tier {
            Tier::Newcomer => {
                let played = profile.counters.games_completed;
                if played < t.newcomer_games_target {
                    let remaining = t.newcomer_games_target - played;
                    format!("Play {} more {} to unlock creation", remaining, plural(remaining, "game", "games"))
                } else {
                    "Create your first piece of content or make a wallet transaction to become Engaged".to_string()
                }
            }
            Tier::Engaged => {
                let shortfall = self.min_balance.saturating_sub(profile.balances.balance);
                format!(
                    "Hold {} more to become a {}",
                    format_token_amount(shortfall, self.decimals, &self.symbol, 2),
                    Tier::TokenHolder.label()
                )
            }
            Tier::TokenHolder => {
                let remaining = t
                    .power_user_min_wallet_creations
                    .saturating_sub(profile.counters.wallet_creations);
                format!(
                    "Create {} more wallet-gated {} to become a {}",
                    remaining,
                    plural(remaining, "item", "items"),
                    Tier::PowerUser.label()
                )
            }
            Tier::PowerUser => "Maximum tier reached".to_string(),
        }
    }
}

fn plural<'a>(n: u64, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 {
        one
    } else {
        many
    }
}

fn ratio_percent(value: u64, target: u64) -> u8 {
    if target == 0 || value >= target {
        return 100;
    }
    ((value as u128 * 100) / target as u128) as u8
}

fn u256_percent(value: U256, target: U256) -> u8 {
    if target.is_zero() || value >= target {
        return 100;
    }
    // value < target, so value * 100 / target < 100
    (value.saturating_mul(U256::from(100u8)) / target).low_u64() as u8
}
