//! Caching, coalescing geocode client
//!
//! `resolve` answers from the cache when it can. On a miss it makes at most
//! one remote lookup per key at a time: concurrent callers for the same key
//! wait on the first caller's result instead of issuing their own request.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::cache::GeocodeCache;
use super::nominatim::{GeocodeTransport, LookupOutcome};
use super::policy::{RetryPolicy, Throttle};
use crate::address::extract::collapse_whitespace;
use crate::model::Coordinates;

/// Geocode client statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct GeocodeStats {
    /// Calls to `resolve` with a non-empty query
    pub queries: u64,
    pub cache_hits: u64,
    /// Requests actually sent to the remote service, retries included
    pub remote_lookups: u64,
    /// Callers that waited on another caller's lookup
    pub coalesced: u64,
    pub rate_limited: u64,
    /// Network errors, bad statuses, malformed or non-finite answers
    pub failures: u64,
    pub misses: u64,
}

/// Normalized query and cache key, `None` for a blank query
///
/// The query keeps its case for the remote service; the key is lower-cased.
pub fn normalize_query(query: &str) -> Option<(String, String)> {
    let normalized = collapse_whitespace(query);
    if normalized.is_empty() {
        return None;
    }
    let key = normalized.to_lowercase();
    Some((normalized, key))
}

/// Removes the in-flight entry if the leader is dropped before completing
struct InFlightGuard<'a> {
    in_flight: &'a DashMap<String, broadcast::Sender<Option<Coordinates>>>,
    key: String,
    sender: broadcast::Sender<Option<Coordinates>>,
    completed: bool,
}

impl InFlightGuard<'_> {
    fn complete(mut self, result: Option<Coordinates>) {
        self.in_flight.remove(&self.key);
        // No receivers is fine
        let _ = self.sender.send(result);
        self.completed = true;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.in_flight.remove(&self.key);
        }
    }
}

enum Role<'a> {
    Leader(InFlightGuard<'a>),
    Follower(broadcast::Receiver<Option<Coordinates>>),
}

/// Geocode client shared by the ingest run and the query surface
pub struct GeocodeClient {
    transport: Arc<dyn GeocodeTransport>,
    cache: Arc<GeocodeCache>,
    throttle: Arc<Throttle>,
    retry: RetryPolicy,
    in_flight: DashMap<String, broadcast::Sender<Option<Coordinates>>>,
    stats: std::sync::RwLock<GeocodeStats>,
}

impl GeocodeClient {
    pub fn new(
        transport: Arc<dyn GeocodeTransport>,
        cache: Arc<GeocodeCache>,
        throttle: Arc<Throttle>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            cache,
            throttle,
            retry,
            in_flight: DashMap::new(),
            stats: std::sync::RwLock::new(GeocodeStats::default()),
        }
    }

    pub fn cache(&self) -> &Arc<GeocodeCache> {
        &self.cache
    }

    /// Resolve a free-text query to coordinates
    ///
    /// `None` means no usable answer: not found, rate limited twice, remote
    /// failure, or non-finite coordinates. Never an error.
    pub async fn resolve(&self, query: &str) -> Option<Coordinates> {
        let (normalized, key) = normalize_query(query)?;
        self.bump(|s| s.queries += 1);

        if let Some(hit) = self.cache.get(&key).await {
            debug!(key = %key, "Geocode cache hit");
            self.bump(|s| s.cache_hits += 1);
            return Some(hit);
        }

        let guard = match self.join_or_lead(&key) {
            Role::Leader(guard) => guard,
            Role::Follower(mut receiver) => {
                self.bump(|s| s.coalesced += 1);
                return match receiver.recv().await {
                    Ok(result) => result,
                    // Leader was dropped mid-lookup; use whatever it cached
                    Err(_) => self.cache.get(&key).await,
                };
            }
        };

        // Another leader may have finished between the cache check and registration
        if let Some(hit) = self.cache.get(&key).await {
            self.bump(|s| s.cache_hits += 1);
            guard.complete(Some(hit));
            return Some(hit);
        }

        let result = self.lookup_with_retry(&normalized).await;
        match result {
            Some(coordinates) => self.cache.insert(&key, coordinates).await,
            None => self.bump(|s| s.misses += 1),
        }

        guard.complete(result);
        result
    }

    fn join_or_lead(&self, key: &str) -> Role<'_> {
        match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(entry) => Role::Follower(entry.get().subscribe()),
            Entry::Vacant(entry) => {
                let (sender, _) = broadcast::channel(1);
                entry.insert(sender.clone());
                Role::Leader(InFlightGuard {
                    in_flight: &self.in_flight,
                    key: key.to_string(),
                    sender,
                    completed: false,
                })
            }
        }
    }

    async fn lookup_with_retry(&self, query: &str) -> Option<Coordinates> {
        let mut attempt = 1;
        loop {
            let outcome = match self.throttle.acquire().await {
                Ok(_permit) => {
                    self.bump(|s| s.remote_lookups += 1);
                    self.transport.lookup(query).await
                }
                Err(e) => LookupOutcome::Failed(format!("throttle closed: {}", e)),
            };

            match outcome {
                LookupOutcome::Found(coordinates) if coordinates.is_finite() => {
                    debug!(query = %query, attempt, "Geocoded");
                    return Some(coordinates);
                }
                LookupOutcome::Found(coordinates) => {
                    warn!(query = %query, ?coordinates, "Geocoder returned non-finite coordinates");
                    self.bump(|s| s.failures += 1);
                    return None;
                }
                LookupOutcome::NotFound => {
                    debug!(query = %query, "No geocoder match");
                    return None;
                }
                LookupOutcome::RateLimited => {
                    self.bump(|s| s.rate_limited += 1);
                    if !self.retry.should_retry(attempt) {
                        warn!(query = %query, attempt, "Geocoder still rate limiting, giving up on query");
                        return None;
                    }
                    debug!(
                        query = %query,
                        backoff_ms = self.retry.backoff.as_millis() as u64,
                        "Geocoder rate limited, backing off"
                    );
                    tokio::time::sleep(self.retry.backoff).await;
                    attempt += 1;
                }
                LookupOutcome::Failed(reason) => {
                    warn!(query = %query, transport = self.transport.name(), reason = %reason, "Geocode lookup failed");
                    self.bump(|s| s.failures += 1);
                    return None;
                }
            }
        }
    }

    fn bump(&self, update: impl FnOnce(&mut GeocodeStats)) {
        if let Ok(mut stats) = self.stats.write() {
            update(&mut stats);
        }
    }

    /// Get client statistics
    pub fn get_stats(&self) -> GeocodeStats {
        self.stats.read().map(|s| s.clone()).unwrap_or_default()
    }
}
