use serde::{Deserialize, Serialize};

/// Leaderboard achievements. The ids are persisted, so renaming a variant
/// needs a serde alias.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AchievementId {
    FirstSubmission,
    PerfectAccuracy,
    SpeedRunner,
    Comeback,
}

impl AchievementId {
    pub const ALL: [AchievementId; 4] = [
        AchievementId::FirstSubmission,
        AchievementId::PerfectAccuracy,
        AchievementId::SpeedRunner,
        AchievementId::Comeback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementId::FirstSubmission => "first_submission",
            AchievementId::PerfectAccuracy => "perfect_accuracy",
            AchievementId::SpeedRunner => "speed_runner",
            AchievementId::Comeback => "comeback",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AchievementId::FirstSubmission => "On the Board",
            AchievementId::PerfectAccuracy => "Flawless",
            AchievementId::SpeedRunner => "Speed Runner",
            AchievementId::Comeback => "Comeback Kid",
        }
    }

    /// Reward in whole discount tokens, paid once by the Web3 layer.
    pub fn reward_tokens(&self) -> u64 {
        match self {
            AchievementId::FirstSubmission => 10,
            AchievementId::PerfectAccuracy => 50,
            AchievementId::SpeedRunner => 25,
            AchievementId::Comeback => 25,
        }
    }
}
