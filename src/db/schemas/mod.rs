//! Database schemas for the locator
//!
//! Defines MongoDB document structures for canonical locations and the
//! geocode cache.

mod geocode_cache;
mod location;

pub use geocode_cache::{GeocodeCacheDoc, GEOCODE_CACHE_COLLECTION};
pub use location::{GeoPoint, LocationDoc, LOCATION_COLLECTION};
