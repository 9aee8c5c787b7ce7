//! Locator ingest: feeds in, canonical locations out
//!
//! ```text
//! locator-ingest --feed data/feeds/directory.json --feed data/feeds/curated.json
//! locator-ingest --resume
//! ```

use clap::Parser;
use tracing::{error, info};

use locator::{
    config::IngestArgs,
    logging,
    pipeline::{self, IngestOptions, ResolutionOrchestrator},
    services,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let args = IngestArgs::parse();
    logging::init(&args.log);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let storage = match services::open_storage(&args.storage).await {
        Ok(storage) => storage,
        Err(e) => {
            error!("Failed to open storage: {}", e);
            std::process::exit(1);
        }
    };

    let geocoder = match services::geocode_client(&args.geocode, storage.geocode_cache).await {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to start geocoder: {}", e);
            std::process::exit(1);
        }
    };

    let feeds = if args.resume {
        Vec::new()
    } else {
        match pipeline::load_feeds(args.feeds.as_slice()).await {
            Ok(feeds) => feeds,
            Err(e) => {
                error!("Failed to load feeds: {}", e);
                std::process::exit(1);
            }
        }
    };

    let orchestrator = ResolutionOrchestrator::new(geocoder, args.resolve_concurrency);
    let options = IngestOptions {
        resume: args.resume,
        save_every: args.save_every,
    };

    let report = pipeline::run(feeds, storage.locations.as_ref(), &orchestrator, &options).await?;

    for feed in &report.feeds {
        info!(
            provider = %feed.provider,
            total = feed.total,
            kept = feed.kept,
            dropped = feed.dropped,
            "Feed summary"
        );
    }
    let stats = &report.resolution;
    info!(
        kept = stats.kept,
        dropped = stats.dropped,
        already_resolved = stats.already_resolved,
        resolved = stats.resolved,
        failed = stats.failed,
        cache_hits = stats.cache_hits,
        remote_lookups = stats.remote_lookups,
        inserted = report.merge.inserted,
        updated = report.merge.updated,
        unchanged = report.merge.unchanged,
        saved = report.saved,
        total = report.total,
        unresolved = report.unresolved,
        "Ingest complete"
    );
    Ok(())
}
