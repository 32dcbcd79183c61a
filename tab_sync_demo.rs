use progression_engine::{
    aggregator::ProgressionTracker,
    config::Settings,
    models::{amount::whole_tokens, CreationMode, Event},
    storage::MemoryStore,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    info!("Simulating two sessions sharing one store");

    let settings = Settings::default();
    let decimals = settings.token.decimals;
    let store = Arc::new(MemoryStore::new());

    let mut tab_a = ProgressionTracker::open(store.clone(), settings.clone()).await;
    let mut tab_b = ProgressionTracker::open(store.clone(), settings).await;

    for _ in 0..3 {
        tab_a.record_event(Event::GameCompleted { score: 120 });
    }
    tab_a.flush().await;

    let applied = tab_b.sync_from_store().await;
    info!(
        "Tab B applied {} change(s): {} games, progress {}%",
        applied,
        tab_b.profile().counters.games_completed,
        tab_b.profile().tier_progress
    );

    tab_b.record_event(Event::ContentCreated {
        mode: CreationMode::Free,
    });
    tab_b.record_event(Event::TokensEarned {
        amount: whole_tokens(1_000, decimals),
        source: "daily_bonus".to_string(),
    });
    tab_b.flush().await;

    tab_a.sync_from_store().await;
    info!("Tab A now sees tier {}", tab_a.profile().tier.label());

    // Concurrent edits: the later write wins everywhere
    tab_a.record_event(Event::ReferralSent);
    tab_b.record_event(Event::ContentShared);
    tab_a.flush().await;
    tab_b.flush().await;
    tab_a.sync_from_store().await;
    tab_b.sync_from_store().await;
    info!(
        "After racing writes: A has {} referral(s), {} share(s); B has {} referral(s), {} share(s)",
        tab_a.profile().counters.referrals,
        tab_a.profile().counters.shares,
        tab_b.profile().counters.referrals,
        tab_b.profile().counters.shares
    );

    tab_a.reset().await;
    tab_b.sync_from_store().await;
    info!(
        "After reset in tab A, tab B is back to {} with {} games",
        tab_b.profile().tier.label(),
        tab_b.profile().counters.games_completed
    );

    let view = tab_b.view();
    println!("{}", serde_json::to_string_pretty(&view)?);

    Ok(())
}
