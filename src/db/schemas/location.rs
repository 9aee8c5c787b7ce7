//! Canonical location document schema
//!
//! Coordinates are stored as a GeoJSON point under `location` so the
//! `2dsphere` index can serve `$geoNear`. Unresolved locations omit it.

use bson::{doc, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::model::{CanonicalLocation, Coordinates, LocationKind, Provenance};

/// Collection name for canonical locations
pub const LOCATION_COLLECTION: &str = "locations";

/// GeoJSON point, `[longitude, latitude]`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: [f64; 2],
}

impl GeoPoint {
    pub fn from_coordinates(coordinates: Coordinates) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: [coordinates.longitude, coordinates.latitude],
        }
    }

    pub fn to_coordinates(&self) -> Coordinates {
        Coordinates::new(self.coordinates[1], self.coordinates[0])
    }
}

/// Canonical location document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct LocationDoc {
    /// Deterministic location id
    pub _id: String,

    pub name: String,

    #[serde(default)]
    pub kind: LocationKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    /// Absent until the location is resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,

    pub confidence: f64,

    #[serde(default)]
    pub source_count: u32,

    #[serde(default)]
    pub provenance: Vec<Provenance>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

impl From<&CanonicalLocation> for LocationDoc {
    fn from(location: &CanonicalLocation) -> Self {
        Self {
            _id: location.id.clone(),
            name: location.name.clone(),
            kind: location.kind,
            address: location.address.clone(),
            city: location.city.clone(),
            state: location.state.clone(),
            postal_code: location.postal_code.clone(),
            phone: location.phone.clone(),
            website: location.website.clone(),
            location: location.coordinates().map(GeoPoint::from_coordinates),
            confidence: location.confidence,
            source_count: location.source_count,
            provenance: location.provenance.clone(),
            updated_at: location.updated_at.map(DateTime::from_chrono),
        }
    }
}

impl From<LocationDoc> for CanonicalLocation {
    fn from(doc: LocationDoc) -> Self {
        let coordinates = doc.location.as_ref().map(GeoPoint::to_coordinates);
        Self {
            id: doc._id,
            name: doc.name,
            kind: doc.kind,
            address: doc.address,
            city: doc.city,
            state: doc.state,
            postal_code: doc.postal_code,
            phone: doc.phone,
            website: doc.website,
            latitude: coordinates.map(|c| c.latitude),
            longitude: coordinates.map(|c| c.longitude),
            confidence: doc.confidence,
            source_count: doc.source_count,
            provenance: doc.provenance,
            updated_at: doc.updated_at.map(|t| t.to_chrono()),
        }
    }
}

impl IntoIndexes for LocationDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Serves $geoNear
            (
                doc! { "location": "2dsphere" },
                Some(
                    IndexOptions::builder()
                        .name("location_2dsphere".to_string())
                        .build(),
                ),
            ),
            // State filter on the listing endpoint
            (
                doc! { "state": 1 },
                Some(IndexOptions::builder().name("state_index".to_string()).build()),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location() -> CanonicalLocation {
        CanonicalLocation {
            id: "sunny-acres-01035".to_string(),
            name: "Sunny Acres".to_string(),
            kind: LocationKind::Farm,
            address: None,
            city: Some("Hadley".to_string()),
            state: Some("MA".to_string()),
            postal_code: Some("01035".to_string()),
            phone: None,
            website: None,
            latitude: Some(42.34),
            longitude: Some(-72.58),
            confidence: 0.8,
            source_count: 1,
            provenance: vec![Provenance::new("curated", "https://example.org")],
            updated_at: None,
        }
    }

    #[test]
    fn test_point_is_longitude_first() {
        let doc = LocationDoc::from(&location());
        let point = doc.location.clone().unwrap();
        assert_eq!(point.kind, "Point");
        assert_eq!(point.coordinates, [-72.58, 42.34]);

        let bson_doc = bson::to_document(&doc).unwrap();
        assert_eq!(bson_doc.get_str("_id").unwrap(), "sunny-acres-01035");
        assert!(bson_doc.get_document("location").is_ok());
    }

    #[test]
    fn test_unresolved_omits_location() {
        let mut unresolved = location();
        unresolved.latitude = None;
        let bson_doc = bson::to_document(&LocationDoc::from(&unresolved)).unwrap();
        assert!(!bson_doc.contains_key("location"));

        let back = CanonicalLocation::from(LocationDoc::from(&unresolved));
        assert!(!back.is_resolved());
    }

    #[test]
    fn test_back_to_canonical() {
        let original = location();
        let back = CanonicalLocation::from(LocationDoc::from(&original));
        assert_eq!(back, original);
    }
}
