//! Resolution orchestrator
//!
//! For every record without coordinates, walk its candidate queries in order
//! and take the first hit. Records are resolved with bounded parallelism;
//! the geocode client's throttle still caps remote traffic.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::address::candidates_for;
use crate::geocode::{GeocodeClient, GeocodeStats};
use crate::model::{AddressSource, Coordinates};

/// Default number of records resolved concurrently
pub const DEFAULT_RESOLVE_CONCURRENCY: usize = 4;

/// Counters for one ingest run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionStats {
    /// Records that passed the usability filter
    pub kept: u64,
    /// Records dropped for missing name or locality
    pub dropped: u64,
    /// Records that arrived with coordinates
    pub already_resolved: u64,
    pub resolved: u64,
    /// Records whose every candidate missed
    pub failed: u64,
    pub cache_hits: u64,
    pub remote_lookups: u64,
}

impl ResolutionStats {
    pub fn absorb(&mut self, other: &ResolutionStats) {
        self.kept += other.kept;
        self.dropped += other.dropped;
        self.already_resolved += other.already_resolved;
        self.resolved += other.resolved;
        self.failed += other.failed;
        self.cache_hits += other.cache_hits;
        self.remote_lookups += other.remote_lookups;
    }

    /// Copy the geocode client's cache counters
    pub fn with_geocode(mut self, geocode: &GeocodeStats) -> Self {
        self.cache_hits = geocode.cache_hits;
        self.remote_lookups = geocode.remote_lookups;
        self
    }
}

struct Pending {
    index: usize,
    name: String,
    candidates: Vec<String>,
}

pub struct ResolutionOrchestrator {
    client: Arc<GeocodeClient>,
    concurrency: usize,
}

impl ResolutionOrchestrator {
    pub fn new(client: Arc<GeocodeClient>, concurrency: usize) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
        }
    }

    pub fn client(&self) -> &Arc<GeocodeClient> {
        &self.client
    }

    /// Fill in coordinates for every record that lacks them
    ///
    /// Exhaustion is counted and logged; it never stops the run. Records that
    /// already have coordinates are left untouched.
    pub async fn resolve_all<R: AddressSource>(&self, records: &mut [R]) -> ResolutionStats {
        let mut stats = ResolutionStats::default();

        let pending: Vec<Pending> = records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                if record.coordinates().is_some() {
                    stats.already_resolved += 1;
                    return None;
                }
                Some(Pending {
                    index,
                    name: record.name().to_string(),
                    candidates: candidates_for(record),
                })
            })
            .collect();

        let outcomes: Vec<(Pending, Option<(usize, Coordinates)>)> = stream::iter(pending)
            .map(|item| async move {
                let hit = self.first_hit(&item.candidates).await;
                (item, hit)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (item, hit) in outcomes {
            match hit {
                Some((rank, coordinates)) => {
                    debug!(
                        name = %item.name,
                        candidate = %item.candidates[rank],
                        rank,
                        "Resolved"
                    );
                    records[item.index].set_coordinates(coordinates);
                    stats.resolved += 1;
                }
                None => {
                    warn!(
                        name = %item.name,
                        candidates = item.candidates.len(),
                        "No candidate resolved; leaving location unresolved"
                    );
                    stats.failed += 1;
                }
            }
        }

        info!(
            resolved = stats.resolved,
            failed = stats.failed,
            already_resolved = stats.already_resolved,
            "Resolution pass complete"
        );
        stats
    }

    /// First candidate that resolves, with its position in the list
    async fn first_hit(&self, candidates: &[String]) -> Option<(usize, Coordinates)> {
        for (rank, candidate) in candidates.iter().enumerate() {
            if let Some(coordinates) = self.client.resolve(candidate).await {
                return Some((rank, coordinates));
            }
        }
        None
    }
}
