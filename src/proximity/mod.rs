//! Nearest-location search
//!
//! Results are filtered (resolved, confident enough, inside the radius),
//! ordered by distance then confidence, and only then paginated. Every back
//! end funnels its candidates through [`rank_all`] so the in-memory scan and
//! the MongoDB `$geoNear` path return the same order.

pub mod geo;
pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

use crate::model::{CanonicalLocation, Coordinates, SearchResult};
use crate::types::{LocatorError, Result};

pub use geo::{distance_meters, haversine_meters, EARTH_RADIUS_METERS};
pub use memory::MemoryBackend;
pub use mongo::MongoProximity;

/// Largest page a caller may ask for
pub const MAX_LIMIT: usize = 100;

/// A validated search request
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProximityQuery {
    pub origin: Coordinates,
    /// `None` searches without a distance bound
    pub radius_meters: Option<f64>,
    pub min_confidence: f64,
    pub limit: usize,
    pub offset: usize,
}

impl ProximityQuery {
    /// Validate caller input
    ///
    /// Rejects non-finite or out-of-range origins, negative or non-finite
    /// radii and non-finite confidence thresholds. `limit` is clamped to
    /// `1..=MAX_LIMIT`.
    pub fn new(
        origin: Coordinates,
        radius_meters: Option<f64>,
        min_confidence: f64,
        limit: usize,
        offset: usize,
    ) -> Result<Self> {
        if !origin.is_valid() {
            return Err(LocatorError::BadRequest(
                "origin must be finite coordinates within latitude/longitude range".into(),
            ));
        }
        if let Some(radius) = radius_meters {
            if !radius.is_finite() || radius < 0.0 {
                return Err(LocatorError::BadRequest(
                    "radius must be a non-negative number".into(),
                ));
            }
        }
        if !min_confidence.is_finite() {
            return Err(LocatorError::BadRequest(
                "min_conf must be a finite number".into(),
            ));
        }

        Ok(Self {
            origin,
            radius_meters,
            min_confidence,
            limit: limit.clamp(1, MAX_LIMIT),
            offset,
        })
    }

    /// Number of ranked results needed to serve this page
    pub fn window(&self) -> usize {
        self.offset.saturating_add(self.limit)
    }

    fn within_radius(&self, distance: u64) -> bool {
        self.radius_meters.map_or(true, |radius| distance as f64 <= radius)
    }
}

/// Source of ranked search results
#[async_trait]
pub trait ProximityBackend: Send + Sync {
    /// One page of results for a validated query
    async fn nearest(&self, query: &ProximityQuery) -> Result<Vec<SearchResult>>;

    /// Short name for logs and health output
    fn name(&self) -> &'static str;
}

/// Distance ascending, then confidence descending, then id
///
/// The id key makes the order total, so pages of a static data set never
/// overlap or skip.
pub fn compare_results(a: &SearchResult, b: &SearchResult) -> Ordering {
    a.distance_meters
        .cmp(&b.distance_meters)
        .then_with(|| b.location.confidence.total_cmp(&a.location.confidence))
        .then_with(|| a.location.id.cmp(&b.location.id))
}

/// Score one location, `None` when the query filters it out
pub fn score(location: &CanonicalLocation, query: &ProximityQuery) -> Option<u64> {
    let coordinates = location.coordinates()?;
    // NaN confidence fails this comparison and is dropped
    if !(location.confidence >= query.min_confidence) {
        return None;
    }
    let distance = distance_meters(query.origin, coordinates);
    query.within_radius(distance).then_some(distance)
}

/// Filter and sort every candidate, without pagination
pub fn rank_all<'a>(
    locations: impl IntoIterator<Item = &'a CanonicalLocation>,
    query: &ProximityQuery,
) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = locations
        .into_iter()
        .filter_map(|location| {
            score(location, query).map(|distance_meters| SearchResult {
                location: location.clone(),
                distance_meters,
            })
        })
        .collect();
    results.sort_by(compare_results);
    results
}

/// Apply `offset` and `limit` to already ranked results
pub fn paginate(results: Vec<SearchResult>, query: &ProximityQuery) -> Vec<SearchResult> {
    results
        .into_iter()
        .skip(query.offset)
        .take(query.limit)
        .collect()
}

/// Filter, sort, then paginate
pub fn rank<'a>(
    locations: impl IntoIterator<Item = &'a CanonicalLocation>,
    query: &ProximityQuery,
) -> Vec<SearchResult> {
    paginate(rank_all(locations, query), query)
}

/// Validating front for a proximity back end
#[derive(Clone)]
pub struct ProximityEngine {
    backend: Arc<dyn ProximityBackend>,
}

impl ProximityEngine {
    pub fn new(backend: Arc<dyn ProximityBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Search around `origin`
    ///
    /// Invalid input is a `BadRequest` and never reaches the back end.
    pub async fn search(
        &self,
        origin: Coordinates,
        radius_meters: Option<f64>,
        min_confidence: f64,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SearchResult>> {
        let query = ProximityQuery::new(origin, radius_meters, min_confidence, limit, offset)?;
        self.search_query(&query).await
    }

    pub async fn search_query(&self, query: &ProximityQuery) -> Result<Vec<SearchResult>> {
        let results = self.backend.nearest(query).await?;
        debug!(
            backend = self.backend.name(),
            lat = query.origin.latitude,
            lng = query.origin.longitude,
            radius_m = ?query.radius_meters,
            results = results.len(),
            "Proximity search"
        );
        Ok(results)
    }
}
