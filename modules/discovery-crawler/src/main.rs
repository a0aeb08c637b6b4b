use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use discovery_common::Config;
use discovery_crawler::relay::{LogRelay, WebhookRelay};
use discovery_crawler::store::PgCacheStore;
use discovery_crawler::traits::ResultRelay;
use discovery_crawler::{CrawlOutcome, Crawler};
use spotify_client::SpotifyClient;

#[derive(Parser)]
#[command(name = "discovery-crawler", about = "Periodic new-release discovery crawler")]
struct Cli {
    /// Run a single crawl and exit
    #[arg(long)]
    once: bool,

    /// Skip the startup crawl; collections are still verified and markers restored
    #[arg(long)]
    skip_initial_crawl: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("discovery=info".parse()?))
        .init();

    let cli = Cli::parse();
    info!("Discovery crawler starting...");

    let config = Config::from_env()?;
    config.log_redacted();

    let store = PgCacheStore::connect(&config.database_url).await?;
    store.migrate().await?;
    info!("Cache store ready");

    let relay: Arc<dyn ResultRelay> = match &config.relay_url {
        Some(url) => Arc::new(WebhookRelay::new(url.as_str())?),
        None => Arc::new(LogRelay),
    };
    let catalog = Arc::new(SpotifyClient::new(config.spotify_access_token.clone()));
    let crawler = Crawler::new(&config, catalog, Arc::new(store), relay);

    crawler.prepare().await?;
    if !cli.skip_initial_crawl || cli.once {
        log_outcome(crawler.try_crawl().await?);
    }
    if cli.once {
        return Ok(());
    }

    let mut crawl_tick = tokio::time::interval(Duration::from_secs(config.crawl_interval_secs));
    let mut notifier_tick =
        tokio::time::interval(Duration::from_secs(config.notifier_interval_secs));
    // The first tick fires immediately; startup already covered it.
    crawl_tick.tick().await;

    loop {
        tokio::select! {
            _ = crawl_tick.tick() => match crawler.try_crawl().await {
                Ok(outcome) => log_outcome(outcome),
                Err(e) if e.is_recoverable() => warn!(error = %e, "Crawl failed"),
                Err(e) => error!(error = %e, "Crawl failed"),
            },
            _ = notifier_tick.tick() => {
                if crawler.clear_obsolete_notifiers(Utc::now()).await {
                    info!("Cleared obsolete notifiers");
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                return Ok(());
            }
        }
    }
}

fn log_outcome(outcome: CrawlOutcome) {
    match outcome {
        CrawlOutcome::Unavailable => info!("Crawl skipped, another crawl is running"),
        CrawlOutcome::Completed(report) if report.is_empty() => info!("No new songs"),
        CrawlOutcome::Completed(report) => info!("{report}"),
    }
}
