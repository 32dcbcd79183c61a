use std::str::FromStr;

use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::models::amount::u256_decimal;

/// How a piece of content was created. Wallet-gated creations cost discount
/// tokens and count towards the upper tiers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CreationMode {
    Free,
    WalletGated,
}

/// Payment shape used for an NFT mint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    BaseOnly,
    Hybrid,
    TokenOnly,
}

impl PaymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMode::BaseOnly => "base_only",
            PaymentMode::Hybrid => "hybrid",
            PaymentMode::TokenOnly => "token_only",
        }
    }
}

/// Client-reported result of a scored run, checked by the submission gate
/// before it can touch leaderboard state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameSubmission {
    pub completion_time_secs: f64,
    /// Percentage in `0.0..=100.0`.
    pub accuracy: f64,
    pub attempts: u32,
    pub score: u64,
}

impl GameSubmission {
    pub fn validate(&self) -> Result<(), String> {
        if !self.completion_time_secs.is_finite() || self.completion_time_secs <= 0.0 {
            return Err(format!("invalid completion time {}", self.completion_time_secs));
        }
        if !self.accuracy.is_finite() || !(0.0..=100.0).contains(&self.accuracy) {
            return Err(format!("accuracy {} outside 0..=100", self.accuracy));
        }
        if self.attempts == 0 {
            return Err("attempts must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Every state-changing occurrence the tracker understands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    GameCompleted {
        score: u64,
    },
    ContentCreated {
        mode: CreationMode,
    },
    ContentShared,
    ReferralSent,
    NftMinted {
        payment: PaymentMode,
    },
    TokensEarned {
        #[serde(with = "u256_decimal")]
        amount: U256,
        source: String,
    },
    TokensSpent {
        #[serde(with = "u256_decimal")]
        amount: U256,
        purpose: String,
    },
    /// Authoritative balance read back from the ledger.
    BalanceSynced {
        #[serde(with = "u256_decimal")]
        on_chain_balance: U256,
    },
    WalletConnected {
        address: String,
    },
    SocialGamePlayed {
        won: bool,
    },
    LeaderboardSubmitted {
        submission: GameSubmission,
    },
    TournamentJoined {
        tournament_id: String,
        #[serde(with = "u256_decimal")]
        entry_fee: U256,
    },
    TournamentSubmitted {
        tournament_id: String,
        submission: GameSubmission,
    },
    TournamentEnded {
        tournament_id: String,
        final_rank: u32,
        #[serde(with = "u256_decimal")]
        prize: U256,
    },
    RankUpdated {
        global_rank: Option<u32>,
        #[serde(with = "u256_decimal")]
        total_earnings: U256,
    },
    ChallengeCreated {
        target_followers: u64,
    },
    ChallengeCompleted {
        succeeded: bool,
        multiplier: f64,
    },
    WhaleDetected {
        follower_count: u64,
        multiplier: f64,
        #[serde(with = "u256_decimal")]
        bonus: U256,
    },
    ViralDetected {
        engagement: u64,
        #[serde(with = "u256_decimal")]
        bonus: U256,
    },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::GameCompleted { .. } => "game_completed",
            Event::ContentCreated { .. } => "content_created",
            Event::ContentShared => "content_shared",
            Event::ReferralSent => "referral_sent",
            Event::NftMinted { .. } => "nft_minted",
            Event::TokensEarned { .. } => "tokens_earned",
            Event::TokensSpent { .. } => "tokens_spent",
            Event::BalanceSynced { .. } => "balance_synced",
            Event::WalletConnected { .. } => "wallet_connected",
            Event::SocialGamePlayed { .. } => "social_game_played",
            Event::LeaderboardSubmitted { .. } => "leaderboard_submitted",
            Event::TournamentJoined { .. } => "tournament_joined",
            Event::TournamentSubmitted { .. } => "tournament_submitted",
            Event::TournamentEnded { .. } => "tournament_ended",
            Event::RankUpdated { .. } => "rank_updated",
            Event::ChallengeCreated { .. } => "challenge_created",
            Event::ChallengeCompleted { .. } => "challenge_completed",
            Event::WhaleDetected { .. } => "whale_detected",
            Event::ViralDetected { .. } => "viral_detected",
        }
    }

    /// Parse an event coming from an untyped boundary (UI bridge, CLI).
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Payload checks that do not need the profile. Anything failing here is
    /// treated as malformed and ignored by the reducer.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Event::TokensEarned { amount, .. } | Event::TokensSpent { amount, .. } => {
                if amount.is_zero() {
                    return Err("amount must be non-zero".to_string());
                }
            }
            Event::WalletConnected { address } => {
                validate_evm_address(address)?;
            }
            Event::LeaderboardSubmitted { submission } => {
                submission.validate()?;
            }
            Event::TournamentSubmitted { tournament_id, submission } => {
                validate_tournament_id(tournament_id)?;
                submission.validate()?;
            }
            Event::TournamentJoined { tournament_id, .. } | Event::TournamentEnded { tournament_id, .. } => {
                validate_tournament_id(tournament_id)?;
            }
            Event::ChallengeCompleted { multiplier, .. } | Event::WhaleDetected { multiplier, .. } => {
                if !multiplier.is_finite() || *multiplier < 1.0 {
                    return Err(format!("multiplier {} must be finite and >= 1", multiplier));
                }
            }
            Event::GameCompleted { .. }
            | Event::ContentCreated { .. }
            | Event::ContentShared
            | Event::ReferralSent
            | Event::NftMinted { .. }
            | Event::BalanceSynced { .. }
            | Event::SocialGamePlayed { .. }
            | Event::RankUpdated { .. }
            | Event::ChallengeCreated { .. }
            | Event::ViralDetected { .. } => {}
        }
        Ok(())
    }
}

fn validate_tournament_id(id: &str) -> Result<(), String> {
    if id.trim().is_empty() {
        return Err("tournament id must not be empty".to_string());
    }
    Ok(())
}

pub fn validate_evm_address(address: &str) -> Result<(), String> {
    if !address.starts_with("0x") || address.len() != 42 {
        return Err(format!("invalid EVM address: {}", address));
    }
    Address::from_str(address)
        .map(|_| ())
        .map_err(|_| format!("invalid EVM address: {}", address))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(time: f64, accuracy: f64) -> GameSubmission {
        GameSubmission {
            completion_time_secs: time,
            accuracy,
            attempts: 1,
            score: 100,
        }
    }

    #[test]
    fn test_event_json_is_tagged_by_kind() {
        let event = Event::TokensEarned {
            amount: U256::from(5u64),
            source: "daily".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""kind":"tokens_earned""#));
        assert!(json.contains(r#""amount":"5""#));

        let parsed = Event::from_json(&json).unwrap();
        assert_eq!(parsed, event);
        assert_eq!(parsed.kind(), "tokens_earned");
    }

    #[test]
    fn test_unknown_kind_fails_to_parse() {
        assert!(Event::from_json(r#"{"kind":"teleported"}"#).is_err());
        assert!(Event::from_json(r#"{"kind":"game_completed"}"#).is_err());
    }

    #[test]
    fn test_submission_validation() {
        assert!(submission(12.0, 80.0).validate().is_ok());
        assert!(submission(0.0, 80.0).validate().is_err());
        assert!(submission(12.0, 101.0).validate().is_err());
        assert!(submission(f64::NAN, 80.0).validate().is_err());

        let mut zero_attempts = submission(12.0, 80.0);
        zero_attempts.attempts = 0;
        assert!(zero_attempts.validate().is_err());
    }

    #[test]
    fn test_event_validation() {
        assert!(Event::TokensSpent { amount: U256::zero(), purpose: "x".into() }
            .validate()
            .is_err());
        assert!(Event::WalletConnected { address: "not_an_address".into() }
            .validate()
            .is_err());
        assert!(Event::WalletConnected {
            address: "0x742d35Cc6634C0532925a3b844Bc9e7595f6e842".into()
        }
        .validate()
        .is_ok());
        assert!(Event::ChallengeCompleted { succeeded: true, multiplier: 0.5 }
            .validate()
            .is_err());
    }
}
