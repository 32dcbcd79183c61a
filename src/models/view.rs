use serde::Serialize;

use crate::config::TokenSettings;
use crate::models::{amount::format_token_amount, Profile};

/// Display-ready projection of a profile. Holds strings only; nothing here is
/// read back into state.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProfileView {
    pub tier: String,
    pub tier_level: u8,
    pub progress: String,
    pub next_requirement: String,
    pub balance: String,
    pub lifetime_earned: String,
    pub lifetime_spent: String,
    pub wallet: String,
    pub games_completed: u64,
    pub creations: u64,
    pub wallet_creations: u64,
    pub nfts_minted: u64,
    pub achievements: Vec<String>,
    pub best_time: String,
    pub average_time: String,
    pub average_accuracy: String,
    pub rank: String,
    pub challenge_streak: String,
    pub active_tournament: Option<String>,
}

impl ProfileView {
    pub fn from_profile(profile: &Profile, token: &TokenSettings) -> Self {
        let amount = |value| format_token_amount(value, token.decimals, &token.symbol, 2);
        let stats = &profile.leaderboard;

        Self {
            tier: profile.tier.label().to_string(),
            tier_level: profile.tier.level(),
            progress: format!("{}%", profile.tier_progress),
            next_requirement: profile.next_requirement.clone(),
            balance: amount(profile.balances.balance),
            lifetime_earned: amount(profile.balances.lifetime_earned),
            lifetime_spent: amount(profile.balances.lifetime_spent),
            wallet: profile
                .wallet_address
                .as_deref()
                .map(short_address)
                .unwrap_or_else(|| "Not connected".to_string()),
            games_completed: profile.counters.games_completed,
            creations: profile.counters.total_creations(),
            wallet_creations: profile.counters.wallet_creations,
            nfts_minted: profile.counters.nfts_minted,
            achievements: stats.achievements.iter().map(|a| a.title().to_string()).collect(),
            best_time: stats
                .best_time_secs
                .map(|t| format!("{:.1}s", t))
                .unwrap_or_else(|| "-".to_string()),
            average_time: stats
                .average_time_secs()
                .map(|t| format!("{:.1}s", t))
                .unwrap_or_else(|| "-".to_string()),
            average_accuracy: stats
                .average_accuracy()
                .map(|a| format!("{:.1}%", a))
                .unwrap_or_else(|| "-".to_string()),
            rank: stats
                .global_rank
                .map(|r| format!("#{}", r))
                .unwrap_or_else(|| "Unranked".to_string()),
            challenge_streak: format!(
                "{} (best {})",
                profile.challenges.current_streak, profile.challenges.longest_streak
            ),
            active_tournament: stats.active_tournament.as_ref().map(|t| t.tournament_id.clone()),
        }
    }
}

/// `0x1234...abcd`. Counts characters, not bytes: a stored record is not
/// guaranteed to hold a validated address.
fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 12 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{amount::whole_tokens, AchievementId, Tier};
    use chrono::Utc;

    #[test]
    fn test_fresh_profile_view() {
        let view = ProfileView::from_profile(&Profile::new(Utc::now()), &TokenSettings::default());
        assert_eq!(view.tier, "Newcomer");
        assert_eq!(view.progress, "0%");
        assert_eq!(view.balance, "0 LUB");
        assert_eq!(view.wallet, "Not connected");
        assert_eq!(view.best_time, "-");
        assert_eq!(view.average_time, "-");
        assert_eq!(view.rank, "Unranked");
        assert!(view.active_tournament.is_none());
    }

    #[test]
    fn test_populated_view() {
        let mut profile = Profile::new(Utc::now());
        profile.tier = Tier::TokenHolder;
        profile.tier_progress = 40;
        profile.balances.balance = whole_tokens(1_250, 18);
        profile.wallet_address = Some("0x52908400098527886E0F7030069857D2E4169EE7".to_string());
        profile.leaderboard.best_time_secs = Some(12.34);
        profile.leaderboard.total_submissions = 2;
        profile.leaderboard.total_accuracy = 170.0;
        profile.leaderboard.total_time_secs = 41.0;
        profile.leaderboard.global_rank = Some(7);
        profile.leaderboard.achievements = vec![AchievementId::FirstSubmission];

        let view = ProfileView::from_profile(&profile, &TokenSettings::default());
        assert_eq!(view.tier, "Token Holder");
        assert_eq!(view.tier_level, 3);
        assert_eq!(view.progress, "40%");
        assert_eq!(view.balance, "1,250 LUB");
        assert_eq!(view.wallet, "0x5290...9EE7");
        assert_eq!(view.best_time, "12.3s");
        assert_eq!(view.average_time, "20.5s");
        assert_eq!(view.average_accuracy, "85.0%");
        assert_eq!(view.rank, "#7");
        assert_eq!(view.achievements.len(), 1);
    }

    #[test]
    fn test_non_ascii_wallet_address_does_not_panic() {
        let mut profile = Profile::new(Utc::now());
        profile.wallet_address = Some("0xaéééééééééé".to_string());
        let view = ProfileView::from_profile(&profile, &TokenSettings::default());
        assert_eq!(view.wallet, "0xaééé...éééé");

        profile.wallet_address = Some("0xé".to_string());
        let view = ProfileView::from_profile(&profile, &TokenSettings::default());
        assert_eq!(view.wallet, "0xé");
    }
}
