use ethers::types::U256;
use serde::{Deserialize, Serialize};

use crate::{
    config::GateSettings,
    models::{amount::whole_tokens, AchievementId, GameSubmission, LeaderboardStats},
};

/// An achievement unlocked by the current submission, with the reward the
/// Web3 layer should pay for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnlockedAchievement {
    pub id: AchievementId,
    #[serde(with = "crate::models::amount::u256_decimal")]
    pub reward: U256,
}

/// Achievements this submission earns that `stats` does not already hold.
/// `stats` is the state before the submission is recorded.
pub fn newly_unlocked(settings: &GateSettings, stats: &LeaderboardStats, submission: &GameSubmission) -> Vec<AchievementId> {
    AchievementId::ALL
        .iter()
        .copied()
        .filter(|id| !stats.has_achievement(*id))
        .filter(|id| earns(settings, stats, submission, *id))
        .collect()
}

fn earns(settings: &GateSettings, stats: &LeaderboardStats, submission: &GameSubmission, id: AchievementId) -> bool {
    match id {
        AchievementId::FirstSubmission => stats.total_submissions == 0,
        AchievementId::PerfectAccuracy => submission.accuracy >= settings.perfect_accuracy,
        AchievementId::SpeedRunner => submission.completion_time_secs < settings.speed_runner_time_secs,
        AchievementId::Comeback => {
            submission.attempts >= settings.comeback_min_attempts && submission.accuracy >= settings.comeback_min_accuracy
        }
    }
}

pub fn with_rewards(ids: &[AchievementId], decimals: u32) -> Vec<UnlockedAchievement> {
    ids.iter()
        .map(|id| UnlockedAchievement {
            id: *id,
            reward: whole_tokens(id.reward_tokens(), decimals),
        })
        .collect()
}
