//! Geocoding: remote transport, durable cache, pacing and the client that
//! ties them together

pub mod cache;
pub mod client;
pub mod nominatim;
pub mod policy;

pub use cache::{CacheStore, GeocodeCache, JsonFileCacheStore, MongoCacheStore, NoopCacheStore};
pub use client::{normalize_query, GeocodeClient, GeocodeStats};
pub use nominatim::{GeocodeTransport, LookupOutcome, NominatimConfig, NominatimTransport};
pub use policy::{RetryPolicy, Throttle};
