use chrono::{DateTime, Utc};
use ethers::types::U256;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::{
    aggregator::reducer::{apply, EventOutcome, ReduceContext},
    config::Settings,
    guard::{GateDecision, RecordedRejection, SubmissionGate},
    ledger::{LedgerClient, LedgerClientConfig, ResilientCaller},
    models::{Event, Profile, ProfileView},
    storage::{new_writer_id, KeyValueStore, Persister, ProfileCodec, StoreChange, WriterId},
    tiers::TierClassifier,
};

/// What `record_event` hands back: the fully derived profile and what
/// happened to the event.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub profile: Profile,
    pub outcome: EventOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BalanceRefresh {
    Updated { balance: U256 },
    NoWallet,
    /// Ledger query failed; the previous balance is kept.
    Unavailable { kept: U256 },
}

/// One session's view of the player profile.
///
/// Owns the in-memory profile and is its only writer. Every change is queued
/// to the store in the background; changes written by other trackers sharing
/// the store replace the in-memory profile wholesale (last writer wins).
pub struct ProgressionTracker {
    settings: Settings,
    classifier: TierClassifier,
    gate: SubmissionGate,
    profile: Profile,
    store: Arc<dyn KeyValueStore>,
    key: String,
    writer: WriterId,
    changes: broadcast::Receiver<StoreChange>,
    persister: Persister,
    balance_caller: ResilientCaller,
}

impl ProgressionTracker {
    /// Load the stored profile, or start fresh. Never fails: an unreachable
    /// or unreadable store yields a default profile.
    pub async fn open(store: Arc<dyn KeyValueStore>, settings: Settings) -> Self {
        let key = settings.profile_key();
        let writer = new_writer_id();
        // Subscribe before reading so no change between the two is missed
        let changes = store.subscribe();

        let raw = match store.get(&key).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Could not read {} from {}: {}", key, store.name(), e);
                None
            }
        };

        let classifier = TierClassifier::new(
            settings.tiers.clone(),
            settings.token.decimals,
            settings.token.symbol.clone(),
        );
        let gate = SubmissionGate::new(settings.gate.clone(), settings.token.decimals);

        let mut profile = ProfileCodec::decode_or_default(raw.as_deref(), Utc::now());
        classifier.derive(&mut profile);

        info!(
            "Opened profile {} on {} (tier {}, writer {:016x})",
            key,
            store.name(),
            profile.tier.label(),
            writer
        );

        let persister = Persister::spawn(store.clone(), key.clone(), writer);
        let balance_caller = LedgerClientConfig::from(&settings.ledger).caller("balance_refresh".to_string());

        Self {
            settings,
            classifier,
            gate,
            profile,
            store,
            key,
            writer,
            changes,
            persister,
            balance_caller,
        }
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn view(&self) -> ProfileView {
        ProfileView::from_profile(&self.profile, &self.settings.token)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn classifier(&self) -> &TierClassifier {
        &self.classifier
    }

    pub fn writer_id(&self) -> WriterId {
        self.writer
    }

    pub fn record_event(&mut self, event: Event) -> Recorded {
        self.record_event_at(event, Utc::now())
    }

    /// Apply an event at an explicit time. The profile is updated in memory
    /// before this returns; the write to the store happens in the background.
    pub fn record_event_at(&mut self, event: Event, now: DateTime<Utc>) -> Recorded {
        let ctx = ReduceContext {
            now,
            classifier: &self.classifier,
            gate: &self.gate,
        };
        let reduction = apply(&self.profile, &event, &ctx);

        match &reduction.outcome {
            EventOutcome::Accepted { unlocked } => {
                self.gate.observe(
                    &GateDecision::Accepted {
                        unlocked: unlocked.clone(),
                    },
                    now,
                );
            }
            EventOutcome::Rejected { rejection } => {
                self.gate.observe(&GateDecision::Rejected(rejection.clone()), now);
            }
            EventOutcome::Applied | EventOutcome::Ignored { .. } => {}
        }

        if reduction.outcome.changed_profile() {
            if reduction.profile.tier != self.profile.tier {
                info!(
                    "Tier changed: {} -> {}",
                    self.profile.tier.label(),
                    reduction.profile.tier.label()
                );
            }
            self.profile = reduction.profile;
            self.persist(now);
        } else {
            debug!("{} event left the profile unchanged", event.kind());
        }

        Recorded {
            profile: self.profile.clone(),
            outcome: reduction.outcome,
        }
    }

    /// Parse and apply an event from an untyped boundary. Unparseable input
    /// is ignored.
    pub fn record_raw_event(&mut self, raw: &str) -> Recorded {
        match Event::from_json(raw) {
            Ok(event) => self.record_event(event),
            Err(e) => {
                warn!("Ignoring unparseable event: {}", e);
                Recorded {
                    profile: self.profile.clone(),
                    outcome: EventOutcome::Ignored {
                        reason: format!("unparseable event: {}", e),
                    },
                }
            }
        }
    }

    fn persist(&self, now: DateTime<Utc>) {
        match ProfileCodec::encode(&self.profile, now) {
            Ok(encoded) => self.persister.save(encoded),
            Err(e) => warn!("Failed to encode profile: {}", e),
        }
    }

    pub fn last_rejection(&self) -> Option<&RecordedRejection> {
        self.gate.last_rejection()
    }

    pub fn cooldown_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.gate.cooldown_remaining(&self.profile.leaderboard, now)
    }

    /// Resolves once the submission cooldown has expired. UI convenience
    /// only; the gate always checks against the clock at submission time.
    pub async fn wait_for_cooldown(&self) {
        if let Some(remaining) = self.cooldown_remaining(Utc::now()) {
            debug!("Waiting {:?} for submission cooldown", remaining);
            tokio::time::sleep(remaining).await;
        }
    }

    /// Catch up with changes written by other trackers. Returns how many
    /// foreign changes were pending.
    ///
    /// Own queued writes are flushed first and the current stored record is
    /// then loaded once, so the result is whatever was written last.
    pub async fn sync_from_store(&mut self) -> usize {
        self.persister.flush().await;
        let (pending, latest) = self.drain_foreign();
        if pending > 0 {
            self.reload(latest).await;
        }
        pending
    }

    /// Wait for the next change from another tracker and apply it. Returns
    /// false once the store stops publishing.
    pub async fn wait_for_remote_change(&mut self) -> bool {
        let mut latest = None;
        loop {
            match self.changes.recv().await {
                Ok(change) => {
                    if self.is_foreign(&change) {
                        latest = Some(change.new_value);
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Missed {} store notifications; reloading", skipped);
                    break;
                }
                Err(RecvError::Closed) => return false,
            }
        }

        self.persister.flush().await;
        let (_, newer) = self.drain_foreign();
        self.reload(newer.or(latest)).await;
        true
    }

    /// Consume queued notifications without blocking. Returns the number of
    /// foreign changes (a lag counts as one) and the newest foreign payload.
    fn drain_foreign(&mut self) -> (usize, Option<Option<String>>) {
        let mut pending = 0;
        let mut latest = None;
        loop {
            match self.changes.try_recv() {
                Ok(change) => {
                    if self.is_foreign(&change) {
                        pending += 1;
                        latest = Some(change.new_value);
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Missed {} store notifications; reloading", skipped);
                    pending += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        (pending, latest)
    }

    fn is_foreign(&self, change: &StoreChange) -> bool {
        change.key == self.key && change.origin != self.writer
    }

    /// Load the current stored record. If the store cannot be read, the
    /// payload of the newest notification is used instead, if there is one.
    async fn reload(&mut self, notified: Option<Option<String>>) {
        match self.store.get(&self.key).await {
            Ok(raw) => self.replace_from(raw.as_deref()),
            Err(e) => match notified {
                Some(raw) => {
                    warn!("Reload from {} failed, using notified record: {}", self.store.name(), e);
                    self.replace_from(raw.as_deref());
                }
                None => warn!("Reload from {} failed, keeping memory: {}", self.store.name(), e),
            },
        }
    }

    /// Replace the in-memory profile with a stored record. A removed record
    /// means another tracker reset the profile.
    fn replace_from(&mut self, raw: Option<&str>) {
        let mut incoming = ProfileCodec::decode_or_default(raw, Utc::now());
        self.classifier.derive(&mut incoming);

        if incoming.tier != self.profile.tier {
            info!(
                "Tier changed by another session: {} -> {}",
                self.profile.tier.label(),
                incoming.tier.label()
            );
        }
        debug!("Profile replaced from store (removed: {})", raw.is_none());
        self.profile = incoming;
    }

    /// Query the ledger for the connected wallet's balance and apply it.
    /// Each attempt is bounded by the ledger timeout.
    pub async fn refresh_balance(&mut self, ledger: &dyn LedgerClient) -> BalanceRefresh {
        let address = match &self.profile.wallet_address {
            Some(address) => address.clone(),
            None => return BalanceRefresh::NoWallet,
        };

        let target = address.as_str();
        let fetched = self
            .balance_caller
            .call(move || ledger.token_balance(target))
            .await;

        match fetched {
            Ok(balance) => {
                self.record_event(Event::BalanceSynced {
                    on_chain_balance: balance,
                });
                BalanceRefresh::Updated { balance }
            }
            Err(e) => {
                warn!("Balance refresh from {} failed: {}", ledger.name(), e);
                BalanceRefresh::Unavailable {
                    kept: self.profile.balances.balance,
                }
            }
        }
    }

    /// Discard all progress, here and in the store.
    pub async fn reset(&mut self) {
        let mut fresh = Profile::new(Utc::now());
        self.classifier.derive(&mut fresh);
        self.profile = fresh;
        self.gate = SubmissionGate::new(self.settings.gate.clone(), self.settings.token.decimals);
        self.persister.clear();
        self.persister.flush().await;
        info!("Profile {} reset", self.key);
    }

    /// Wait for queued writes to reach the store.
    pub async fn flush(&self) {
        self.persister.flush().await;
    }
}
