//! Geocode cache document schema
//!
//! One document per normalized query key.

use bson::{DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::model::Coordinates;

/// Collection name for cached geocoder answers
pub const GEOCODE_CACHE_COLLECTION: &str = "geocode_cache";

/// Cached geocoder answer stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GeocodeCacheDoc {
    /// Lower-cased, whitespace-collapsed query
    pub _id: String,

    pub latitude: f64,

    pub longitude: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

impl GeocodeCacheDoc {
    pub fn new(key: &str, coordinates: Coordinates) -> Self {
        Self {
            _id: key.to_string(),
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
            updated_at: Some(DateTime::now()),
        }
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

impl IntoIndexes for GeocodeCacheDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        // Lookups are by _id only
        vec![]
    }
}
