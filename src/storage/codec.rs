use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::{Profile, ProgressionError, Result};

/// Current layout of the stored profile record.
pub const PROFILE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoredProfile {
    version: u32,
    saved_at: DateTime<Utc>,
    profile: Profile,
}

#[derive(Debug, Deserialize)]
struct VersionProbe {
    version: Option<u32>,
}

/// Encodes profiles into the versioned JSON envelope kept in the store.
/// Token amounts are written as decimal strings.
pub struct ProfileCodec;

impl ProfileCodec {
    pub fn encode(profile: &Profile, saved_at: DateTime<Utc>) -> Result<String> {
        let record = StoredProfile {
            version: PROFILE_FORMAT_VERSION,
            saved_at,
            profile: profile.clone(),
        };
        Ok(serde_json::to_string(&record)?)
    }

    pub fn decode(raw: &str) -> Result<Profile> {
        let probe: VersionProbe = serde_json::from_str(raw)?;
        match probe.version {
            Some(found) if found > PROFILE_FORMAT_VERSION => Err(ProgressionError::UnsupportedVersion {
                found,
                supported: PROFILE_FORMAT_VERSION,
            }),
            Some(_) => {
                let record: StoredProfile = serde_json::from_str(raw)?;
                Ok(record.profile)
            }
            None => Err(ProgressionError::StorageError(
                "stored profile has no version field".to_string(),
            )),
        }
    }

    /// Missing or unreadable records yield a fresh profile. Derived fields
    /// are whatever was stored; callers re-derive.
    pub fn decode_or_default(raw: Option<&str>, now: DateTime<Utc>) -> Profile {
        match raw {
            None => Profile::new(now),
            Some(raw) => match Self::decode(raw) {
                Ok(profile) => profile,
                Err(e) => {
                    warn!("Discarding unreadable profile record: {}", e);
                    Profile::new(now)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AchievementId, TournamentEntry};
    use ethers::types::U256;

    #[test]
    fn test_large_balance_survives() {
        let now = Utc::now();
        let mut profile = Profile::new(now);
        profile.balances.balance = U256::from_dec_str("123456789012345678901").unwrap();
        profile.leaderboard.achievements = vec![AchievementId::SpeedRunner];
        profile.leaderboard.active_tournament = Some(TournamentEntry {
            tournament_id: "weekly-1".to_string(),
            joined_at: now,
            entry_fee: U256::from(10u64),
            submissions: 0,
            best_score: 0,
        });

        let raw = ProfileCodec::encode(&profile, now).unwrap();
        assert!(raw.contains("\"123456789012345678901\""));

        let decoded = ProfileCodec::decode(&raw).unwrap();
        assert_eq!(decoded, profile);
    }

    #[test]
    fn test_corrupt_record_yields_default() {
        let now = Utc::now();
        let profile = ProfileCodec::decode_or_default(Some("{not json"), now);
        assert_eq!(profile, Profile::new(now));

        let profile = ProfileCodec::decode_or_default(None, now);
        assert_eq!(profile.counters.games_completed, 0);
    }

    #[test]
    fn test_future_version_rejected() {
        let raw = r#"{"version": 99, "saved_at": "2024-01-01T00:00:00Z", "profile": {}}"#;
        assert!(matches!(
            ProfileCodec::decode(raw),
            Err(ProgressionError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let raw = r#"{"version": 1, "saved_at": "2024-01-01T00:00:00Z",
            "profile": {"counters": {"games_completed": 4}, "balances": {"balance": "5000"}}}"#;
        let profile = ProfileCodec::decode(raw).unwrap();
        assert_eq!(profile.counters.games_completed, 4);
        assert_eq!(profile.balances.balance, U256::from(5000u64));
        assert_eq!(profile.counters.wallet_creations, 0);
    }
}
