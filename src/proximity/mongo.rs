//! MongoDB `$geoNear` proximity back end
//!
//! MongoDB returns candidates in its own spherical-distance order. Its
//! distances use a different Earth radius, so each fetched window is
//! re-scored with haversine, re-filtered and re-sorted. The window is
//! widened while a group of equally distant results could straddle the
//! page boundary.

use async_trait::async_trait;
use bson::{doc, Document};
use tracing::{debug, warn};

use super::{distance_meters, paginate, rank_all, ProximityBackend, ProximityQuery};
use crate::db::schemas::LocationDoc;
use crate::db::MongoCollection;
use crate::model::{CanonicalLocation, SearchResult};
use crate::types::Result;

/// Largest window fetched for one page
const MAX_FETCH: usize = 10_000;

/// MongoDB's spherical distances run slightly long against haversine
const RADIUS_SLACK: f64 = 1.01;

pub struct MongoProximity {
    collection: MongoCollection<LocationDoc>,
}

impl MongoProximity {
    pub fn new(collection: MongoCollection<LocationDoc>) -> Self {
        Self { collection }
    }

    async fn fetch(&self, query: &ProximityQuery, fetch: usize) -> Result<Vec<CanonicalLocation>> {
        let pipeline = geo_near_pipeline(query, fetch);
        let documents = self.collection.aggregate(pipeline).await?;

        let mut locations = Vec::with_capacity(documents.len());
        for document in documents {
            match bson::from_document::<LocationDoc>(document) {
                Ok(doc) => locations.push(CanonicalLocation::from(doc)),
                Err(e) => warn!(error = %e, "Skipping undecodable location document"),
            }
        }
        Ok(locations)
    }
}

/// `$geoNear` stage followed by a `$limit`
pub fn geo_near_pipeline(query: &ProximityQuery, fetch: usize) -> Vec<Document> {
    let mut geo_near = doc! {
        "near": {
            "type": "Point",
            "coordinates": [query.origin.longitude, query.origin.latitude],
        },
        "key": "location",
        "distanceField": "mongo_distance_m",
        "spherical": true,
        "query": { "confidence": { "$gte": query.min_confidence } },
    };
    if let Some(radius) = query.radius_meters {
        geo_near.insert("maxDistance", radius * RADIUS_SLACK + 1.0);
    }

    vec![
        doc! { "$geoNear": geo_near },
        doc! { "$limit": i64::try_from(fetch).unwrap_or(i64::MAX) },
    ]
}

/// Whether a fetched window already holds the exact page
///
/// `fetched` is every location returned, in MongoDB's order, and `ranked`
/// is the re-scored and sorted subset.
fn window_settled(
    query: &ProximityQuery,
    fetched: &[CanonicalLocation],
    ranked: &[SearchResult],
    requested: usize,
) -> bool {
    // Fewer than asked means there is nothing left to fetch
    if fetched.len() < requested {
        return true;
    }

    let furthest = fetched
        .iter()
        .filter_map(|l| l.coordinates())
        .map(|c| distance_meters(query.origin, c))
        .max();
    let Some(furthest) = furthest else {
        return false;
    };

    // Once the window reaches past the radius, everything further is out too
    if query.radius_meters.is_some_and(|r| furthest as f64 > r) {
        return true;
    }

    // Anything unfetched is at least as far as the furthest fetched
    // location, so the page is settled once that is strictly past the
    // page's last distance, with a meter of slack for the two distance models
    match ranked.get(query.window().saturating_sub(1)) {
        Some(boundary) => furthest > boundary.distance_meters + 1,
        None => false,
    }
}

#[async_trait]
impl ProximityBackend for MongoProximity {
    async fn nearest(&self, query: &ProximityQuery) -> Result<Vec<SearchResult>> {
        let mut fetch = query.window().saturating_add(1).min(MAX_FETCH);

        loop {
            let fetched = self.fetch(query, fetch).await?;
            let ranked = rank_all(fetched.iter(), query);

            if window_settled(query, &fetched, &ranked, fetch) {
                debug!(fetched = fetched.len(), ranked = ranked.len(), "geoNear window settled");
                return Ok(paginate(ranked, query));
            }
            if fetch >= MAX_FETCH {
                warn!(fetch, "geoNear window hit its cap; page may be approximate");
                return Ok(paginate(ranked, query));
            }
            fetch = fetch.saturating_mul(2).min(MAX_FETCH);
        }
    }

    fn name(&self) -> &'static str {
        "mongodb"
    }
}
