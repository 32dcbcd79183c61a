use clap::{Parser, Subcommand};
use progression_engine::{
    aggregator::{EventOutcome, ProgressionTracker},
    config::{Settings, StorageBackend},
    ledger::{HttpPriceFeed, InMemoryLedger, LedgerClientConfig, RateSource},
    models::{amount::format_token_amount, PaymentMode},
    pricing::{PriceOracle, PricingEngine},
    storage::{KeyValueStore, MemoryStore, SqliteStore},
};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(name = "progression")]
#[clap(about = "Track player progression and quote token-economy prices", long_about = None)]
struct Cli {
    /// Settings file layered over the defaults
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,

    /// Keep the profile in memory instead of the configured store
    #[clap(long, global = true)]
    memory: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply one event, given as JSON (e.g. '{"kind":"game_completed","score":10}')
    Record {
        event: String,
    },

    /// Show the current profile
    Show {
        /// Print the raw profile as JSON
        #[clap(long)]
        json: bool,
    },

    /// Quote mint and creation prices for the current profile
    Quote {
        /// Global wallet-gated creation count; omitted means unavailable
        #[clap(long)]
        usage_counter: Option<u64>,

        /// Exchange rate to use when no price feed is configured
        #[clap(long)]
        rate: Option<Decimal>,
    },

    /// Show time left before the next leaderboard submission
    Cooldown,

    /// Delete all progress
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::new().unwrap_or_else(|e| {
            eprintln!("Using default settings ({})", e);
            Settings::default()
        }),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.app.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Validate settings
    if let Err(e) = settings.validate() {
        error!("Invalid settings: {}", e);
        return Err(anyhow::anyhow!(e));
    }

    let store = open_store(&settings, cli.memory).await?;
    let mut tracker = ProgressionTracker::open(store, settings.clone()).await;

    match cli.command {
        Commands::Record { event } => {
            let recorded = tracker.record_raw_event(&event);
            tracker.flush().await;

            match &recorded.outcome {
                EventOutcome::Applied => println!("Applied."),
                EventOutcome::Accepted { unlocked } => {
                    println!("Submission accepted.");
                    for achievement in unlocked {
                        println!(
                            "  Unlocked {} (reward {})",
                            achievement.id.title(),
                            format_token_amount(achievement.reward, settings.token.decimals, &settings.token.symbol, 2)
                        );
                    }
                }
                EventOutcome::Rejected { rejection } => println!("Submission rejected: {:?}", rejection),
                EventOutcome::Ignored { reason } => println!("Ignored: {}", reason),
            }
            print_view(&tracker);
        }

        Commands::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(tracker.profile())?);
            } else {
                print_view(&tracker);
            }
        }

        Commands::Quote { usage_counter, rate } => {
            let ledger = Arc::new(InMemoryLedger::new());
            match usage_counter {
                Some(counter) => ledger.set_usage_counter(counter),
                None => ledger.set_usage_offline(true),
            }
            ledger.set_rate(rate);

            let rates: Arc<dyn RateSource> = match &settings.ledger.price_feed_url {
                Some(url) => Arc::new(HttpPriceFeed::new(
                    url.clone(),
                    settings.ledger.price_pointer.clone(),
                    settings.ledger.timeout_seconds,
                )?),
                None => ledger.clone(),
            };

            let oracle = PriceOracle::new(
                PricingEngine::new(settings.pricing.clone(), settings.token.decimals),
                ledger,
                rates,
                LedgerClientConfig::from(&settings.ledger),
            );
            let sheet = oracle.price_sheet(tracker.profile()).await;

            let token = |amount| format_token_amount(amount, settings.token.decimals, &settings.token.symbol, 4);
            let base = &settings.token.base_currency_symbol;

            println!("\n=== Price Sheet ===");
            println!(
                "Rate: {} {} per {} ({:?}{})",
                sheet.market.rate.tokens_per_base,
                settings.token.symbol,
                base,
                sheet.market.rate.origin,
                if sheet.market.rate.is_fallback { ", fallback" } else { "" }
            );
            println!("Discount: {}", sheet.discount.reason);
            println!("\nNFT mint:");
            for payment in [PaymentMode::BaseOnly, PaymentMode::Hybrid, PaymentMode::TokenOnly] {
                let quote = sheet.mints.get(payment);
                println!(
                    "  {:<10} {} {} + {}{}",
                    payment.as_str(),
                    quote.base_currency,
                    base,
                    token(quote.discount_tokens),
                    if quote.can_afford { "" } else { "  (insufficient balance)" }
                );
            }
            println!(
                "\nWallet-gated creation: {} (list {}, {} global creations{})",
                token(sheet.creation.cost),
                token(sheet.creation.list_cost),
                sheet.creation.usage.global_creations,
                if sheet.creation.usage.is_fallback { ", fallback" } else { "" }
            );

            if sheet.market.is_fallback() {
                warn!("Quote uses fallback market data");
            }
        }

        Commands::Cooldown => match tracker.cooldown_remaining(chrono::Utc::now()) {
            Some(remaining) => println!("Next submission in {}s", remaining.as_secs()),
            None => println!("Submissions open"),
        },

        Commands::Reset => {
            tracker.reset().await;
            println!("Profile reset.");
        }
    }

    Ok(())
}

async fn open_store(settings: &Settings, force_memory: bool) -> anyhow::Result<Arc<dyn KeyValueStore>> {
    if force_memory {
        return Ok(Arc::new(MemoryStore::new()));
    }

    match settings.storage.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageBackend::Sqlite => {
            let store = SqliteStore::from_settings(&settings.storage).await?;
            info!("Using SQLite store at {}", settings.storage.sqlite_url);
            Ok(Arc::new(store))
        }
    }
}

fn print_view(tracker: &ProgressionTracker) {
    let view = tracker.view();
    println!("\n=== Progression ===");
    println!("Tier: {} (level {})", view.tier, view.tier_level);
    println!("Progress: {}", view.progress);
    println!("Next: {}", view.next_requirement);
    println!("\nBalance: {}", view.balance);
    println!("  Earned: {}", view.lifetime_earned);
    println!("  Spent: {}", view.lifetime_spent);
    println!("Wallet: {}", view.wallet);
    println!("\nGames: {}", view.games_completed);
    println!("Creations: {} ({} wallet-gated)", view.creations, view.wallet_creations);
    println!("NFTs minted: {}", view.nfts_minted);
    println!("\nBest time: {}", view.best_time);
    println!("Average time: {}", view.average_time);
    println!("Average accuracy: {}", view.average_accuracy);
    println!("Rank: {}", view.rank);
    println!("Challenge streak: {}", view.challenge_streak);
    if let Some(tournament) = &view.active_tournament {
        println!("Active tournament: {}", tournament);
    }
    if !view.achievements.is_empty() {
        println!("Achievements: {}", view.achievements.join(", "));
    }
}
