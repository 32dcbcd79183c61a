use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    guard::{GateDecision, Rejection, SubmissionGate, UnlockedAchievement},
    models::{CreationMode, Event, GameSubmission, LeaderboardStats, Profile, TournamentEntry},
    tiers::TierClassifier,
};

/// Inputs the reducer needs besides the profile and event. `now` is injected
/// so the same inputs always produce the same output.
pub struct ReduceContext<'a> {
    pub now: DateTime<Utc>,
    pub classifier: &'a TierClassifier,
    pub gate: &'a SubmissionGate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EventOutcome {
    Applied,
    /// A submission passed the gate.
    Accepted { unlocked: Vec<UnlockedAchievement> },
    /// A submission was refused; the profile is unchanged.
    Rejected { rejection: Rejection },
    /// Malformed or inapplicable; the profile is unchanged.
    Ignored { reason: String },
}

impl EventOutcome {
    /// Whether the profile was modified and needs persisting.
    pub fn changed_profile(&self) -> bool {
        matches!(self, EventOutcome::Applied | EventOutcome::Accepted { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    pub profile: Profile,
    pub outcome: EventOutcome,
}

impl Reduction {
    fn unchanged(profile: &Profile, outcome: EventOutcome) -> Self {
        Self {
            profile: profile.clone(),
            outcome,
        }
    }
}

/// Fold one event into a profile.
///
/// Total over every event kind. Anything that is not applied leaves the
/// profile untouched, including `last_activity`. Otherwise the activity time
/// is stamped and the derived tier fields are recomputed from the new raw
/// fields.
pub fn apply(profile: &Profile, event: &Event, ctx: &ReduceContext<'_>) -> Reduction {
    if let Err(reason) = event.validate() {
        warn!("Ignoring malformed {} event: {}", event.kind(), reason);
        return Reduction::unchanged(profile, EventOutcome::Ignored { reason });
    }

    let mut next = profile.clone();
    let mut outcome = EventOutcome::Applied;

    match event {
        Event::GameCompleted { .. } => {
            next.counters.games_completed = next.counters.games_completed.saturating_add(1);
        }
        Event::ContentCreated { mode } => match mode {
            CreationMode::Free => {
                next.counters.free_creations = next.counters.free_creations.saturating_add(1);
            }
            CreationMode::WalletGated => {
                next.counters.wallet_creations = next.counters.wallet_creations.saturating_add(1);
                next.has_transacted = true;
            }
        },
        Event::ContentShared => {
            next.counters.shares = next.counters.shares.saturating_add(1);
        }
        Event::ReferralSent => {
            next.counters.referrals = next.counters.referrals.saturating_add(1);
        }
        Event::NftMinted { .. } => {
            next.counters.nfts_minted = next.counters.nfts_minted.saturating_add(1);
            next.has_transacted = true;
        }
        Event::TokensEarned { amount, source } => {
            debug!("Earned {} from {}", amount, source);
            next.balances.balance = next.balances.balance.saturating_add(*amount);
            next.balances.lifetime_earned = next.balances.lifetime_earned.saturating_add(*amount);
        }
        Event::TokensSpent { amount, purpose } => {
            if *amount > next.balances.balance {
                warn!(
                    "Spend of {} for {} exceeds local balance {}; clamping to zero",
                    amount, purpose, next.balances.balance
                );
            }
            next.balances.balance = next.balances.balance.saturating_sub(*amount);
            next.balances.lifetime_spent = next.balances.lifetime_spent.saturating_add(*amount);
            next.has_transacted = true;
        }
        Event::BalanceSynced { on_chain_balance } => {
            next.balances.balance = *on_chain_balance;
        }
        Event::WalletConnected { address } => {
            next.wallet_address = Some(address.clone());
        }
        Event::SocialGamePlayed { won } => {
            next.counters.social_games_played = next.counters.social_games_played.saturating_add(1);
            if *won {
                next.counters.social_games_won = next.counters.social_games_won.saturating_add(1);
            }
        }
        Event::LeaderboardSubmitted { submission } => {
            match ctx.gate.check(&next.leaderboard, submission, ctx.now) {
                GateDecision::Rejected(rejection) => {
                    return Reduction::unchanged(profile, EventOutcome::Rejected { rejection });
                }
                GateDecision::Accepted { unlocked } => {
                    record_submission(&mut next.leaderboard, submission, &unlocked, ctx.now);
                    outcome = EventOutcome::Accepted { unlocked };
                }
            }
        }
        Event::TournamentJoined {
            tournament_id,
            entry_fee,
        } => {
            if let Some(previous) = &next.leaderboard.active_tournament {
                warn!(
                    "Joining {} abandons unfinished tournament {}",
                    tournament_id, previous.tournament_id
                );
            }
            next.leaderboard.active_tournament = Some(TournamentEntry {
                tournament_id: tournament_id.clone(),
                joined_at: ctx.now,
                entry_fee: *entry_fee,
                submissions: 0,
                best_score: 0,
            });
            next.leaderboard.tournaments_entered = next.leaderboard.tournaments_entered.saturating_add(1);
        }
        Event::TournamentSubmitted {
            tournament_id,
            submission,
        } => {
            if let Err(reason) = check_active_tournament(&next.leaderboard, tournament_id) {
                warn!("Ignoring tournament submission: {}", reason);
                return Reduction::unchanged(profile, EventOutcome::Ignored { reason });
            }

            match ctx.gate.check(&next.leaderboard, submission, ctx.now) {
                GateDecision::Rejected(rejection) => {
                    return Reduction::unchanged(profile, EventOutcome::Rejected { rejection });
                }
                GateDecision::Accepted { unlocked } => {
                    record_submission(&mut next.leaderboard, submission, &unlocked, ctx.now);
                    if let Some(entry) = next.leaderboard.active_tournament.as_mut() {
                        entry.submissions = entry.submissions.saturating_add(1);
                        entry.best_score = entry.best_score.max(submission.score);
                    }
                    outcome = EventOutcome::Accepted { unlocked };
                }
            }
        }
        Event::TournamentEnded {
            tournament_id,
            final_rank,
            prize,
        } => {
            if let Err(reason) = check_active_tournament(&next.leaderboard, tournament_id) {
                warn!("Ignoring tournament result: {}", reason);
                return Reduction::unchanged(profile, EventOutcome::Ignored { reason });
            }

            let stats = &mut next.leaderboard;
            stats.active_tournament = None;
            stats.tournaments_completed = stats.tournaments_completed.saturating_add(1);
            stats.best_tournament_rank = Some(match stats.best_tournament_rank {
                Some(best) => best.min(*final_rank),
                None => *final_rank,
            });
            // Payout arrives separately as TokensEarned
            stats.tournament_winnings = stats.tournament_winnings.saturating_add(*prize);
        }
        Event::RankUpdated {
            global_rank,
            total_earnings,
        } => {
            next.leaderboard.global_rank = *global_rank;
            next.leaderboard.total_earnings = *total_earnings;
        }
        Event::ChallengeCreated { target_followers } => {
            debug!("Challenge created targeting {} followers", target_followers);
            next.challenges.created = next.challenges.created.saturating_add(1);
        }
        Event::ChallengeCompleted { succeeded, multiplier } => {
            let c = &mut next.challenges;
            c.completed = c.completed.saturating_add(1);
            if *succeeded {
                c.succeeded = c.succeeded.saturating_add(1);
                c.current_streak = c.current_streak.saturating_add(1);
                c.longest_streak = c.longest_streak.max(c.current_streak);
                c.best_multiplier = c.best_multiplier.max(*multiplier);
            } else {
                c.current_streak = 0;
            }
        }
        Event::WhaleDetected {
            follower_count,
            multiplier,
            bonus,
        } => {
            debug!("Whale with {} followers, x{}", follower_count, multiplier);
            let c = &mut next.challenges;
            c.whale_encounters = c.whale_encounters.saturating_add(1);
            c.whale_bonus_total = c.whale_bonus_total.saturating_add(*bonus);
            c.best_multiplier = c.best_multiplier.max(*multiplier);
        }
        Event::ViralDetected { engagement, bonus } => {
            debug!("Viral content with engagement {}", engagement);
            let c = &mut next.challenges;
            c.viral_detections = c.viral_detections.saturating_add(1);
            c.viral_bonus_total = c.viral_bonus_total.saturating_add(*bonus);
        }
    }

    next.last_activity = ctx.now;
    ctx.classifier.derive(&mut next);

    Reduction { profile: next, outcome }
}

fn check_active_tournament(stats: &LeaderboardStats, tournament_id: &str) -> Result<(), String> {
    match &stats.active_tournament {
        Some(entry) if entry.tournament_id == tournament_id => Ok(()),
        Some(entry) => Err(format!(
            "tournament {} is not the active tournament {}",
            tournament_id, entry.tournament_id
        )),
        None => Err(format!("no active tournament (got {})", tournament_id)),
    }
}

fn record_submission(
    stats: &mut LeaderboardStats,
    submission: &GameSubmission,
    unlocked: &[UnlockedAchievement],
    now: DateTime<Utc>,
) {
    stats.total_submissions = stats.total_submissions.saturating_add(1);
    stats.total_time_secs += submission.completion_time_secs;
    stats.total_accuracy += submission.accuracy;
    stats.best_time_secs = Some(match stats.best_time_secs {
        Some(best) => best.min(submission.completion_time_secs),
        None => submission.completion_time_secs,
    });
    stats.best_accuracy = Some(match stats.best_accuracy {
        Some(best) => best.max(submission.accuracy),
        None => submission.accuracy,
    });
    stats.best_score = stats.best_score.max(submission.score);
    stats.last_submission_at = Some(now);

    for achievement in unlocked {
        if !stats.has_achievement(achievement.id) {
            stats.achievements.push(achievement.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GateSettings, TierThresholds};
    use crate::models::{amount::whole_tokens, AchievementId, PaymentMode, Tier};
    use chrono::Duration;
    use ethers::types::U256;

    struct Fixture {
        classifier: TierClassifier,
        gate: SubmissionGate,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                classifier: TierClassifier::new(TierThresholds::default(), 18, "LUB"),
                gate: SubmissionGate::new(GateSettings::default(), 18),
            }
        }

        fn ctx(&self, now: DateTime<Utc>) -> ReduceContext<'_> {
            ReduceContext {
                now,
                classifier: &self.classifier,
                gate: &self.gate,
            }
        }

        fn run(&self, profile: &Profile, events: &[Event], now: DateTime<Utc>) -> Profile {
            events
                .iter()
                .fold(profile.clone(), |p, e| apply(&p, e, &self.ctx(now)).profile)
        }
    }

    fn tokens(n: u64) -> U256 {
        whole_tokens(n, 18)
    }

    fn submission(time: f64, accuracy: f64) -> GameSubmission {
        GameSubmission {
            completion_time_secs: time,
            accuracy,
            attempts: 1,
            score: 700,
        }
    }

    #[test]
    fn test_three_games_complete_newcomer_progress() {
        let fx = Fixture::new();
        let now = Utc::now();
        let games = vec![Event::GameCompleted { score: 10 }; 3];
        let profile = fx.run(&Profile::new(now), &games, now);

        assert_eq!(profile.counters.games_completed, 3);
        assert_eq!(profile.tier, Tier::Newcomer);
        assert_eq!(profile.tier_progress, 100);
        assert!(profile.next_requirement.contains("Engaged"));
    }

    #[test]
    fn test_creation_promotes_to_engaged() {
        let fx = Fixture::new();
        let now = Utc::now();
        let profile = fx.run(
            &Profile::new(now),
            &[Event::ContentCreated {
                mode: CreationMode::Free,
            }],
            now,
        );
        assert_eq!(profile.tier, Tier::Engaged);
        assert!(!profile.has_transacted);
    }

    #[test]
    fn test_spend_saturates_and_marks_transacted() {
        let fx = Fixture::new();
        let now = Utc::now();
        let profile = fx.run(
            &Profile::new(now),
            &[
                Event::TokensEarned {
                    amount: tokens(5),
                    source: "quest".to_string(),
                },
                Event::TokensSpent {
                    amount: tokens(8),
                    purpose: "mint".to_string(),
                },
            ],
            now,
        );

        assert_eq!(profile.balances.balance, U256::zero());
        assert_eq!(profile.balances.lifetime_earned, tokens(5));
        assert_eq!(profile.balances.lifetime_spent, tokens(8));
        assert!(profile.has_transacted);
        assert_eq!(profile.tier, Tier::Engaged);
    }

    #[test]
    fn test_downgrade_after_spend() {
        let fx = Fixture::new();
        let now = Utc::now();
        let holder = fx.run(
            &Profile::new(now),
            &[Event::BalanceSynced {
                on_chain_balance: tokens(1_200),
            }],
            now,
        );
        assert_eq!(holder.tier, Tier::TokenHolder);

        let after = fx.run(
            &holder,
            &[Event::TokensSpent {
                amount: tokens(300),
                purpose: "creation".to_string(),
            }],
            now,
        );
        assert!(after.tier < Tier::TokenHolder);
    }

    #[test]
    fn test_malformed_event_is_ignored() {
        let fx = Fixture::new();
        let start = Utc::now() - Duration::hours(1);
        let profile = Profile::new(start);

        let reduction = apply(
            &profile,
            &Event::TokensEarned {
                amount: U256::zero(),
                source: "bug".to_string(),
            },
            &fx.ctx(Utc::now()),
        );

        assert!(matches!(reduction.outcome, EventOutcome::Ignored { .. }));
        assert_eq!(reduction.profile, profile);
        assert_eq!(reduction.profile.last_activity, start);
    }

    #[test]
    fn test_submission_rate_limited_leaves_stats_unchanged() {
        let fx = Fixture::new();
        let now = Utc::now();
        let first = apply(
            &Profile::new(now),
            &Event::LeaderboardSubmitted {
                submission: submission(45.0, 80.0),
            },
            &fx.ctx(now),
        );
        assert!(matches!(first.outcome, EventOutcome::Accepted { .. }));
        assert_eq!(first.profile.leaderboard.total_submissions, 1);
        assert!(first.profile.leaderboard.has_achievement(AchievementId::FirstSubmission));

        let second = apply(
            &first.profile,
            &Event::LeaderboardSubmitted {
                submission: submission(40.0, 85.0),
            },
            &fx.ctx(now + Duration::minutes(10)),
        );
        assert!(matches!(
            second.outcome,
            EventOutcome::Rejected {
                rejection: Rejection::RateLimited { .. }
            }
        ));
        assert_eq!(second.profile.leaderboard, first.profile.leaderboard);
    }

    #[test]
    fn test_submission_updates_bests() {
        let fx = Fixture::new();
        let now = Utc::now();
        let later = now + Duration::hours(2);

        let p = apply(
            &Profile::new(now),
            &Event::LeaderboardSubmitted {
                submission: submission(45.0, 80.0),
            },
            &fx.ctx(now),
        )
        .profile;
        let p = apply(
            &p,
            &Event::LeaderboardSubmitted {
                submission: submission(25.0, 70.0),
            },
            &fx.ctx(later),
        )
        .profile;

        let stats = &p.leaderboard;
        assert_eq!(stats.best_time_secs, Some(25.0));
        assert_eq!(stats.best_accuracy, Some(80.0));
        assert_eq!(stats.average_accuracy(), Some(75.0));
        assert_eq!(stats.last_submission_at, Some(later));
        assert_eq!(
            stats.achievements,
            vec![AchievementId::FirstSubmission, AchievementId::SpeedRunner]
        );
    }

    #[test]
    fn test_tournament_lifecycle() {
        let fx = Fixture::new();
        let now = Utc::now();
        let p = fx.run(
            &Profile::new(now),
            &[Event::TournamentJoined {
                tournament_id: "weekly-7".to_string(),
                entry_fee: tokens(10),
            }],
            now,
        );
        assert_eq!(p.leaderboard.tournaments_entered, 1);

        let wrong = apply(
            &p,
            &Event::TournamentSubmitted {
                tournament_id: "weekly-8".to_string(),
                submission: submission(60.0, 70.0),
            },
            &fx.ctx(now),
        );
        assert!(matches!(wrong.outcome, EventOutcome::Ignored { .. }));
        assert_eq!(wrong.profile, p);

        let p = apply(
            &p,
            &Event::TournamentSubmitted {
                tournament_id: "weekly-7".to_string(),
                submission: submission(60.0, 70.0),
            },
            &fx.ctx(now),
        )
        .profile;
        let entry = p.leaderboard.active_tournament.as_ref().unwrap();
        assert_eq!(entry.submissions, 1);
        assert_eq!(entry.best_score, 700);

        let p = fx.run(
            &p,
            &[Event::TournamentEnded {
                tournament_id: "weekly-7".to_string(),
                final_rank: 3,
                prize: tokens(40),
            }],
            now,
        );
        assert!(p.leaderboard.active_tournament.is_none());
        assert_eq!(p.leaderboard.tournaments_completed, 1);
        assert_eq!(p.leaderboard.best_tournament_rank, Some(3));
        assert_eq!(p.leaderboard.tournament_winnings, tokens(40));
        // Prize is credited only by a separate TokensEarned
        assert_eq!(p.balances.balance, U256::zero());
    }

    #[test]
    fn test_challenge_streaks() {
        let fx = Fixture::new();
        let now = Utc::now();
        let won = Event::ChallengeCompleted {
            succeeded: true,
            multiplier: 2.0,
        };
        let lost = Event::ChallengeCompleted {
            succeeded: false,
            multiplier: 1.0,
        };
        let p = fx.run(
            &Profile::new(now),
            &[won.clone(), won.clone(), lost, won],
            now,
        );
        assert_eq!(p.challenges.completed, 4);
        assert_eq!(p.challenges.succeeded, 3);
        assert_eq!(p.challenges.current_streak, 1);
        assert_eq!(p.challenges.longest_streak, 2);
        assert_eq!(p.challenges.best_multiplier, 2.0);
    }

    #[test]
    fn test_mint_and_wallet_creation_reach_power_user() {
        let fx = Fixture::new();
        let now = Utc::now();
        let mut events = vec![
            Event::BalanceSynced {
                on_chain_balance: tokens(2_000),
            },
            Event::NftMinted {
                payment: PaymentMode::Hybrid,
            },
        ];
        events.extend(std::iter::repeat(Event::ContentCreated {
            mode: CreationMode::WalletGated,
        })
        .take(5));

        let p = fx.run(&Profile::new(now), &events, now);
        assert_eq!(p.tier, Tier::PowerUser);
        assert_eq!(p.tier_progress, 100);
        assert_eq!(p.counters.nfts_minted, 1);
    }

    #[test]
    fn test_apply_is_deterministic() {
        let fx = Fixture::new();
        let now = Utc::now();
        let profile = Profile::new(now);
        let event = Event::ContentShared;
        assert_eq!(apply(&profile, &event, &fx.ctx(now)), apply(&profile, &event, &fx.ctx(now)));
    }
}
