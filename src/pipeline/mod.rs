//! Ingest pipeline
//!
//! feeds → resolution → merge → store. Resume mode skips the feeds and only
//! retries stored locations that are still unresolved.

pub mod feeds;
pub mod orchestrator;

use chrono::Utc;
use tracing::{info, warn};

use crate::merge::{MergeEngine, MergeStats};
use crate::model::CanonicalLocation;
use crate::store::LocationStore;
use crate::types::Result;

pub use feeds::{load_feeds, FeedCounts, ProviderFeed, UsableFeed};
pub use orchestrator::{ResolutionOrchestrator, ResolutionStats, DEFAULT_RESOLVE_CONCURRENCY};

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Retry unresolved stored locations instead of ingesting feeds
    pub resume: bool,
    /// Locations written per store round trip, and per progress save
    pub save_every: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            resume: false,
            save_every: 50,
        }
    }
}

/// Everything one run did
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub feeds: Vec<FeedCounts>,
    pub resolution: ResolutionStats,
    pub merge: MergeStats,
    /// Locations written to the store
    pub saved: usize,
    /// Size of the canonical set after the run
    pub total: usize,
    pub unresolved: usize,
}

/// Run one ingest against a store
pub async fn run(
    feeds: Vec<UsableFeed>,
    store: &dyn LocationStore,
    orchestrator: &ResolutionOrchestrator,
    options: &IngestOptions,
) -> Result<IngestReport> {
    let save_every = options.save_every.max(1);
    let existing = store.load_all().await?;
    info!(existing = existing.len(), mode = store.mode().as_str(), "Loaded canonical set");

    let mut report = if options.resume {
        if !feeds.is_empty() {
            warn!(feeds = feeds.len(), "Resume mode ignores feeds");
        }
        resume(existing, store, orchestrator, save_every).await?
    } else {
        ingest(feeds, existing, store, orchestrator, save_every).await?
    };

    report.resolution = report
        .resolution
        .clone()
        .with_geocode(&orchestrator.client().get_stats());
    Ok(report)
}

async fn ingest(
    feeds: Vec<UsableFeed>,
    existing: Vec<CanonicalLocation>,
    store: &dyn LocationStore,
    orchestrator: &ResolutionOrchestrator,
    save_every: usize,
) -> Result<IngestReport> {
    let mut report = IngestReport::default();
    let mut engine = MergeEngine::with_locations(existing);

    for mut feed in feeds {
        report.resolution.kept += feed.counts.kept as u64;
        report.resolution.dropped += feed.counts.dropped as u64;

        let stats = orchestrator.resolve_all(&mut feed.records).await;
        info!(
            provider = %feed.provider,
            resolved = stats.resolved,
            failed = stats.failed,
            "Feed resolved"
        );
        report.resolution.absorb(&stats);
        report.feeds.push(feed.counts.clone());

        engine.merge_stream(&feed.into_stream());
    }
    report.merge = engine.stats();

    let locations: Vec<CanonicalLocation> = engine.into_locations().into_values().collect();
    report.total = locations.len();
    report.unresolved = locations.iter().filter(|l| !l.is_resolved()).count();

    for chunk in locations.chunks(save_every) {
        report.saved += store.upsert_many(chunk).await?;
    }
    Ok(report)
}

async fn resume(
    existing: Vec<CanonicalLocation>,
    store: &dyn LocationStore,
    orchestrator: &ResolutionOrchestrator,
    save_every: usize,
) -> Result<IngestReport> {
    let mut report = IngestReport {
        total: existing.len(),
        ..Default::default()
    };
    let mut unresolved: Vec<CanonicalLocation> =
        existing.into_iter().filter(|l| !l.is_resolved()).collect();
    info!(unresolved = unresolved.len(), "Resuming resolution");

    for chunk in unresolved.chunks_mut(save_every) {
        let stats = orchestrator.resolve_all(chunk).await;
        report.resolution.absorb(&stats);

        let now = Utc::now();
        let newly_resolved: Vec<CanonicalLocation> = chunk
            .iter_mut()
            .filter(|l| l.is_resolved())
            .map(|l| {
                l.updated_at = Some(now);
                l.clone()
            })
            .collect();
        if !newly_resolved.is_empty() {
            report.saved += store.upsert_many(&newly_resolved).await?;
        }
        info!(
            resolved = report.resolution.resolved,
            failed = report.resolution.failed,
            "Progress saved"
        );
    }

    report.unresolved = unresolved.iter().filter(|l| !l.is_resolved()).count();
    Ok(report)
}
