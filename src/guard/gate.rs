use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::{
    config::GateSettings,
    guard::achievements::{newly_unlocked, with_rewards, UnlockedAchievement},
    models::{GameSubmission, LeaderboardStats},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    RateLimited {
        last_submission_at: DateTime<Utc>,
        retry_at: DateTime<Utc>,
    },
    /// Fast and near-perfect at once. Deliberately narrow: either condition
    /// alone passes.
    Implausible {
        completion_time_secs: f64,
        accuracy: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum GateDecision {
    Accepted { unlocked: Vec<UnlockedAchievement> },
    Rejected(Rejection),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRejection {
    pub rejection: Rejection,
    pub at: DateTime<Utc>,
}

/// Guard in front of leaderboard and tournament submissions.
///
/// `check` is pure over the stats it is handed; the only state kept here is
/// the most recent rejection, for UI feedback.
#[derive(Debug, Clone)]
pub struct SubmissionGate {
    settings: GateSettings,
    decimals: u32,
    last_rejection: Option<RecordedRejection>,
}

impl SubmissionGate {
    pub fn new(settings: GateSettings, decimals: u32) -> Self {
        Self {
            settings,
            decimals,
            last_rejection: None,
        }
    }

    pub fn settings(&self) -> &GateSettings {
        &self.settings
    }

    /// End of the cooldown window. A window past chrono's range saturates to
    /// the latest representable instant.
    fn retry_at(&self, last: DateTime<Utc>) -> DateTime<Utc> {
        i64::try_from(self.settings.cooldown_seconds)
            .ok()
            .and_then(ChronoDuration::try_seconds)
            .and_then(|cooldown| last.checked_add_signed(cooldown))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn check(&self, stats: &LeaderboardStats, submission: &GameSubmission, now: DateTime<Utc>) -> GateDecision {
        if let Some(last) = stats.last_submission_at {
            let retry_at = self.retry_at(last);
            if now < retry_at {
                return GateDecision::Rejected(Rejection::RateLimited {
                    last_submission_at: last,
                    retry_at,
                });
            }
        }

        if submission.completion_time_secs < self.settings.min_plausible_time_secs
            && submission.accuracy > self.settings.max_plausible_accuracy
        {
            return GateDecision::Rejected(Rejection::Implausible {
                completion_time_secs: submission.completion_time_secs,
                accuracy: submission.accuracy,
            });
        }

        let unlocked = newly_unlocked(&self.settings, stats, submission);
        GateDecision::Accepted {
            unlocked: with_rewards(&unlocked, self.decimals),
        }
    }

    /// Remember the outcome of a check so the UI can ask why nothing happened.
    pub fn observe(&mut self, decision: &GateDecision, now: DateTime<Utc>) {
        match decision {
            GateDecision::Rejected(rejection) => {
                warn!("Submission rejected: {:?}", rejection);
                self.last_rejection = Some(RecordedRejection {
                    rejection: rejection.clone(),
                    at: now,
                });
            }
            GateDecision::Accepted { unlocked } => {
                if !unlocked.is_empty() {
                    info!(
                        "Submission unlocked {:?}",
                        unlocked.iter().map(|u| u.id.as_str()).collect::<Vec<_>>()
                    );
                }
                self.last_rejection = None;
            }
        }
    }

    pub fn last_rejection(&self) -> Option<&RecordedRejection> {
        self.last_rejection.as_ref()
    }

    pub fn cooldown_expires_at(&self, stats: &LeaderboardStats) -> Option<DateTime<Utc>> {
        stats.last_submission_at.map(|last| self.retry_at(last))
    }

    /// Time left before another submission is accepted, if any.
    pub fn cooldown_remaining(&self, stats: &LeaderboardStats, now: DateTime<Utc>) -> Option<Duration> {
        let expires = self.cooldown_expires_at(stats)?;
        if expires <= now {
            return None;
        }
        (expires - now).to_std().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AchievementId;

    fn gate() -> SubmissionGate {
        SubmissionGate::new(GateSettings::default(), 18)
    }

    fn accepted(decision: &GateDecision) -> bool {
        matches!(decision, GateDecision::Accepted { .. })
    }

    fn submission(time: f64, accuracy: f64) -> GameSubmission {
        GameSubmission {
            completion_time_secs: time,
            accuracy,
            attempts: 1,
            score: 100,
        }
    }

    #[test]
    fn test_joint_plausibility_rule() {
        let gate = gate();
        let stats = LeaderboardStats::default();
        let now = Utc::now();

        assert!(matches!(
            gate.check(&stats, &submission(5.0, 99.0), now),
            GateDecision::Rejected(Rejection::Implausible { .. })
        ));
        assert!(accepted(&gate.check(&stats, &submission(5.0, 40.0), now)));
        assert!(accepted(&gate.check(&stats, &submission(50.0, 99.0), now)));
        // Boundary values pass: the rule is strict on both sides.
        assert!(accepted(&gate.check(&stats, &submission(10.0, 99.0), now)));
        assert!(accepted(&gate.check(&stats, &submission(5.0, 95.0), now)));
    }

    #[test]
    fn test_rate_limit_window() {
        let gate = gate();
        let now = Utc::now();
        let stats = LeaderboardStats {
            last_submission_at: Some(now - ChronoDuration::minutes(30)),
            total_submissions: 1,
            ..Default::default()
        };

        match gate.check(&stats, &submission(60.0, 80.0), now) {
            GateDecision::Rejected(Rejection::RateLimited { retry_at, .. }) => {
                assert_eq!(retry_at, now + ChronoDuration::minutes(30));
            }
            other => panic!("expected rate limit, got {:?}", other),
        }

        let later = now + ChronoDuration::minutes(31);
        assert!(accepted(&gate.check(&stats, &submission(60.0, 80.0), later)));
    }

    #[test]
    fn test_rate_limit_checked_before_plausibility() {
        let gate = gate();
        let now = Utc::now();
        let stats = LeaderboardStats {
            last_submission_at: Some(now),
            ..Default::default()
        };
        assert!(matches!(
            gate.check(&stats, &submission(5.0, 99.0), now),
            GateDecision::Rejected(Rejection::RateLimited { .. })
        ));
    }

    #[test]
    fn test_first_submission_unlocks_achievement() {
        let gate = gate();
        match gate.check(&LeaderboardStats::default(), &submission(60.0, 80.0), Utc::now()) {
            GateDecision::Accepted { unlocked } => {
                assert_eq!(unlocked.len(), 1);
                assert_eq!(unlocked[0].id, AchievementId::FirstSubmission);
            }
            other => panic!("expected acceptance, got {:?}", other),
        }
    }

    #[test]
    fn test_observe_tracks_last_rejection() {
        let mut gate = gate();
        let now = Utc::now();
        let decision = gate.check(&LeaderboardStats::default(), &submission(1.0, 100.0), now);
        gate.observe(&decision, now);
        assert!(gate.last_rejection().is_some());

        let decision = gate.check(&LeaderboardStats::default(), &submission(60.0, 80.0), now);
        gate.observe(&decision, now);
        assert!(gate.last_rejection().is_none());
    }

    #[test]
    fn test_cooldown_remaining() {
        let gate = gate();
        let now = Utc::now();
        assert_eq!(gate.cooldown_remaining(&LeaderboardStats::default(), now), None);

        let stats = LeaderboardStats {
            last_submission_at: Some(now - ChronoDuration::minutes(59)),
            ..Default::default()
        };
        let remaining = gate.cooldown_remaining(&stats, now).unwrap();
        assert_eq!(remaining, Duration::from_secs(60));
    }

    #[test]
    fn test_oversized_cooldown_saturates() {
        let now = Utc::now();
        let stats = LeaderboardStats {
            last_submission_at: Some(now - ChronoDuration::days(365)),
            total_submissions: 1,
            ..Default::default()
        };

        for cooldown_seconds in [u64::MAX, i64::MAX as u64, 10_000_000_000_000] {
            let gate = SubmissionGate::new(
                GateSettings {
                    cooldown_seconds,
                    ..GateSettings::default()
                },
                18,
            );
            match gate.check(&stats, &submission(60.0, 80.0), now) {
                GateDecision::Rejected(Rejection::RateLimited { retry_at, .. }) => {
                    assert!(retry_at > now);
                }
                other => panic!("expected rate limit, got {:?}", other),
            }
            assert!(gate.cooldown_remaining(&stats, now).is_some());
        }
    }
}
