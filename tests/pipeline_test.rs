//! End-to-end pipeline tests: feeds through resolution, merge, storage and
//! the search surface, with an in-process geocoder

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use locator::address::{candidates_for, extract};
use locator::geocode::{GeocodeCache, GeocodeClient, GeocodeTransport, LookupOutcome, RetryPolicy, Throttle};
use locator::model::{CanonicalLocation, Coordinates, LocationKind, RawRecord};
use locator::pipeline::{self, IngestOptions, ProviderFeed, ResolutionOrchestrator};
use locator::proximity::{MemoryBackend, ProximityEngine};
use locator::routes::search::search;
use locator::store::{FileLocationStore, ListFilter, LocationStore};
use locator::AppState;

/// Geocoder answering from a table keyed by lower-cased query
struct Gazetteer {
    places: HashMap<String, Coordinates>,
    calls: AtomicUsize,
}

impl Gazetteer {
    fn new(places: &[(&str, Coordinates)]) -> Arc<Self> {
        Arc::new(Self {
            places: places.iter().map(|(q, c)| (q.to_lowercase(), *c)).collect(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl GeocodeTransport for Gazetteer {
    async fn lookup(&self, query: &str) -> LookupOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.places.get(&query.to_lowercase()) {
            Some(c) => LookupOutcome::Found(*c),
            None => LookupOutcome::NotFound,
        }
    }

    fn name(&self) -> &'static str {
        "gazetteer"
    }
}

fn geocoder(transport: Arc<Gazetteer>) -> Arc<GeocodeClient> {
    Arc::new(GeocodeClient::new(
        transport,
        Arc::new(GeocodeCache::in_memory()),
        Arc::new(Throttle::unlimited()),
        RetryPolicy::no_retry(),
    ))
}

fn hadley() -> Coordinates {
    Coordinates::new(42.3418, -72.5887)
}

async fn write_feed(dir: &Path, file: &str, json: &str) -> std::path::PathBuf {
    let path = dir.join(file);
    tokio::fs::write(&path, json).await.unwrap();
    path
}

#[test]
fn test_scenario_extract_full_address() {
    let pieces = extract("123 Farm Rd Boston MA 01267 Phone Number 555-123-4567", None);
    assert_eq!(pieces.street.as_deref(), Some("123 Farm Rd"));
    assert_eq!(pieces.city.as_deref(), Some("Boston"));
    assert_eq!(pieces.state.map(|s| s.code()), Some("MA"));
    assert_eq!(pieces.postal_code.as_deref(), Some("01267"));
}

#[test]
fn test_scenario_candidates_without_street_or_postal() {
    let record = RawRecord {
        name: "Green Farm".into(),
        city: Some("Greenfield".into()),
        state: Some("Massachusetts".into()),
        ..Default::default()
    };
    let candidates = candidates_for(&record);
    assert_eq!(
        &candidates[..4],
        &[
            "Greenfield, MA",
            "Greenfield, MA, USA",
            "Green Farm, MA",
            "Green Farm, MA, USA"
        ]
    );
    assert!(candidates.len() > 4);
    assert!(candidates.last().unwrap().ends_with("USA"));
}

#[tokio::test]
async fn test_scenario_two_providers_merge_and_search() {
    let dir = tempfile::tempdir().unwrap();
    let bulk = write_feed(
        dir.path(),
        "bulk.json",
        r#"{
            "provider": "farm-directory",
            "sourceUrl": "https://directory.example/ma",
            "trust": "bulk",
            "records": [
                { "name": "Sunny Acres", "kind": "farm", "city": "Hadley", "state": "MA",
                  "postalCode": "01035", "phone": "413-555-0100" },
                { "name": "", "city": "Hadley" }
            ]
        }"#,
    )
    .await;
    let curated = write_feed(
        dir.path(),
        "curated.json",
        r#"{
            "provider": "raw-milk-map",
            "sourceUrl": "https://map.example",
            "trust": "curated",
            "records": [
                { "name": "Sunny Acres", "address": "12 Mill Rd, Hadley, MA 01035",
                  "website": "https://sunnyacres.example" }
            ]
        }"#,
    )
    .await;

    let client = geocoder(Gazetteer::new(&[("Hadley, MA", hadley())]));
    let orchestrator = ResolutionOrchestrator::new(client.clone(), 2);
    let store = Arc::new(FileLocationStore::open(&dir.path().join("data")).await.unwrap());

    let feeds = pipeline::load_feeds(&[bulk, curated]).await.unwrap();
    let report = pipeline::run(feeds, store.as_ref(), &orchestrator, &IngestOptions::default())
        .await
        .unwrap();

    assert_eq!(report.resolution.kept, 2);
    assert_eq!(report.resolution.dropped, 1);
    assert_eq!(report.resolution.resolved, 2);
    assert_eq!(report.resolution.failed, 0);
    assert!(report.resolution.cache_hits >= 1);
    assert_eq!(report.total, 1);
    assert_eq!(report.unresolved, 0);

    let all = store.list(&ListFilter::default()).await.unwrap();
    assert_eq!(all.len(), 1);
    let merged = &all[0];
    assert_eq!(merged.id, "sunny-acres-01035");
    assert_eq!(merged.phone.as_deref(), Some("413-555-0100"));
    assert_eq!(merged.website.as_deref(), Some("https://sunnyacres.example"));
    assert_eq!(merged.source_count, 2);
    assert_eq!(merged.kind, LocationKind::Farm);
    assert!((merged.confidence - 0.8).abs() < 1e-9);
    assert!(merged.updated_at.is_some());

    // Searchable through the query surface
    let state = AppState::new(store.clone(), client, Duration::from_secs(5));
    let response = search(&state, "lat=42.35&lng=-72.59&radius_km=10")
        .await
        .unwrap();
    assert_eq!(response.count, 1);
    assert_eq!(response.results[0].id, "sunny-acres-01035");
    assert_eq!(response.results[0].postal_code.as_deref(), Some("01035"));

    let by_address = search(&state, "address=hadley,+ma&radius_km=5").await.unwrap();
    assert_eq!(by_address.count, 1);

    // A rerun over the same feeds changes nothing
    let feeds = pipeline::load_feeds(&[dir.path().join("bulk.json"), dir.path().join("curated.json")])
        .await
        .unwrap();
    let rerun = pipeline::run(feeds, store.as_ref(), &orchestrator, &IngestOptions::default())
        .await
        .unwrap();
    assert_eq!(rerun.total, 1);
    assert_eq!(rerun.merge.inserted, 0);
    let again = store.load_all().await.unwrap();
    assert_eq!(again[0].source_count, 2);
    assert_eq!(again[0].phone, merged.phone);
}

#[tokio::test]
async fn test_scenario_equal_distance_ranks_by_confidence() {
    const METERS_PER_DEGREE: f64 = 111_194.926_644_558_74;
    let origin = Coordinates::new(42.36, -71.06);
    let at_10km = origin.latitude + 10_000.0 / METERS_PER_DEGREE;

    let location = |id: &str, confidence: f64| CanonicalLocation {
        id: id.to_string(),
        name: id.to_string(),
        kind: LocationKind::Pickup,
        address: None,
        city: None,
        state: None,
        postal_code: None,
        phone: None,
        website: None,
        latitude: Some(at_10km),
        longitude: Some(origin.longitude),
        confidence,
        source_count: 1,
        provenance: vec![],
        updated_at: None,
    };

    let engine = ProximityEngine::new(Arc::new(MemoryBackend::new(vec![
        location("lower", 0.6),
        location("higher", 0.9),
    ])));
    let results = engine.search(origin, Some(50_000.0), 0.55, 20, 0).await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].distance_meters, results[1].distance_meters);
    assert_eq!(results[0].location.id, "higher");
    assert_eq!(results[1].location.id, "lower");
}

#[tokio::test]
async fn test_resume_retries_only_unresolved() {
    let dir = tempfile::tempdir().unwrap();
    let feed = write_feed(
        dir.path(),
        "feed.json",
        r#"{
            "provider": "farm-directory",
            "records": [
                { "name": "Hill Farm", "city": "Barre", "state": "VT" },
                { "name": "Pinned Market", "city": "Hadley", "state": "MA",
                  "latitude": 42.34, "longitude": -72.58 }
            ]
        }"#,
    )
    .await;
    let store = FileLocationStore::open(dir.path()).await.unwrap();

    // First run: the geocoder knows nothing about Barre yet
    let empty = ResolutionOrchestrator::new(geocoder(Gazetteer::new(&[])), 2);
    let feeds = pipeline::load_feeds(&[feed]).await.unwrap();
    let first = pipeline::run(feeds, &store, &empty, &IngestOptions::default())
        .await
        .unwrap();
    assert_eq!(first.unresolved, 1);
    assert_eq!(first.resolution.failed, 1);
    assert_eq!(first.resolution.already_resolved, 1);

    // Resume with a geocoder that can place it
    let transport = Gazetteer::new(&[("Barre, VT", Coordinates::new(44.197, -72.502))]);
    let orchestrator = ResolutionOrchestrator::new(geocoder(transport.clone()), 2);
    let options = IngestOptions {
        resume: true,
        save_every: 1,
    };
    let resumed = pipeline::run(Vec::new(), &store, &orchestrator, &options)
        .await
        .unwrap();

    assert_eq!(resumed.resolution.resolved, 1);
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    assert_eq!(resumed.unresolved, 0);
    assert_eq!(resumed.saved, 1);
    assert_eq!(resumed.total, 2);

    let reopened = FileLocationStore::open(dir.path()).await.unwrap();
    let all = reopened.load_all().await.unwrap();
    assert!(all.iter().all(CanonicalLocation::is_resolved));
}

#[test]
fn test_unusable_records_never_reach_the_core() {
    let feed: ProviderFeed = serde_json::from_str(
        r#"{"provider":"p","records":[{"name":"  "},{"name":"Only Name"},{"name":"Ok","state":"NY"}]}"#,
    )
    .unwrap();
    let usable = feed.into_usable();
    assert_eq!(usable.counts.kept, 1);
    assert_eq!(usable.counts.dropped, 2);

    let dir = tempfile::tempdir().unwrap();
    let store = tokio_test::block_on(FileLocationStore::open(dir.path())).unwrap();
    assert_eq!(tokio_test::block_on(store.count()).unwrap(), 0);
}
