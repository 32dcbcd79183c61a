use chrono::{DateTime, Utc};
use ethers::types::U256;
use serde::{Deserialize, Serialize};

use crate::models::amount::u256_decimal;
use crate::models::{AchievementId, Tier};

/// The durable per-device aggregate. Mutated only by the reducer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Profile {
    pub counters: ActivityCounters,
    pub balances: TokenBalances,
    /// Set by the first spend, mint or wallet-gated creation.
    pub has_transacted: bool,
    pub wallet_address: Option<String>,

    // Derived from the fields above on every reduction.
    pub tier: Tier,
    pub tier_progress: u8,
    pub next_requirement: String,

    pub challenges: ChallengeStats,
    pub leaderboard: LeaderboardStats,

    pub first_seen: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ActivityCounters {
    pub games_completed: u64,
    pub social_games_played: u64,
    pub social_games_won: u64,
    pub free_creations: u64,
    pub wallet_creations: u64,
    pub shares: u64,
    pub referrals: u64,
    pub nfts_minted: u64,
}

impl ActivityCounters {
    pub fn total_creations(&self) -> u64 {
        self.free_creations.saturating_add(self.wallet_creations)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct TokenBalances {
    /// Spendable balance; may be overwritten by a ledger sync.
    #[serde(with = "u256_decimal")]
    pub balance: U256,
    /// Local, best-effort accounting. Never decreases.
    #[serde(with = "u256_decimal")]
    pub lifetime_earned: U256,
    #[serde(with = "u256_decimal")]
    pub lifetime_spent: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ChallengeStats {
    pub created: u64,
    pub completed: u64,
    pub succeeded: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub whale_encounters: u64,
    #[serde(with = "u256_decimal")]
    pub whale_bonus_total: U256,
    pub viral_detections: u64,
    #[serde(with = "u256_decimal")]
    pub viral_bonus_total: U256,
    pub best_multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct LeaderboardStats {
    pub best_time_secs: Option<f64>,
    pub best_accuracy: Option<f64>,
    pub best_score: u64,
    pub total_submissions: u64,
    pub total_time_secs: f64,
    pub total_accuracy: f64,
    /// Append-only, unlock order preserved.
    pub achievements: Vec<AchievementId>,
    pub last_submission_at: Option<DateTime<Utc>>,
    pub global_rank: Option<u32>,
    #[serde(with = "u256_decimal")]
    pub total_earnings: U256,
    pub active_tournament: Option<TournamentEntry>,
    pub tournaments_entered: u64,
    pub tournaments_completed: u64,
    pub best_tournament_rank: Option<u32>,
    #[serde(with = "u256_decimal")]
    pub tournament_winnings: U256,
}

impl LeaderboardStats {
    pub fn average_time_secs(&self) -> Option<f64> {
        if self.total_submissions == 0 {
            return None;
        }
        Some(self.total_time_secs / self.total_submissions as f64)
    }

    pub fn average_accuracy(&self) -> Option<f64> {
        if self.total_submissions == 0 {
            return None;
        }
        Some(self.total_accuracy / self.total_submissions as f64)
    }

    pub fn has_achievement(&self, id: AchievementId) -> bool {
        self.achievements.contains(&id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TournamentEntry {
    pub tournament_id: String,
    pub joined_at: DateTime<Utc>,
    #[serde(with = "u256_decimal")]
    pub entry_fee: U256,
    pub submissions: u64,
    pub best_score: u64,
}

impl Profile {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            counters: ActivityCounters::default(),
            balances: TokenBalances::default(),
            has_transacted: false,
            wallet_address: None,
            tier: Tier::Newcomer,
            tier_progress: 0,
            next_requirement: String::new(),
            challenges: ChallengeStats::default(),
            leaderboard: LeaderboardStats::default(),
            first_seen: now,
            last_activity: now,
        }
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}
