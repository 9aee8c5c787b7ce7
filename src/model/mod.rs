//! Data model shared by every pipeline stage
//!
//! - [`RawRecord`] is what a source provider emits.
//! - [`CanonicalLocation`] is the merged, deduplicated place.
//! - [`SearchResult`] pairs a canonical location with its distance to a query point.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in decimal degrees (WGS84)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Both components are finite numbers
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    /// Finite and inside the latitude/longitude ranges
    pub fn is_valid(&self) -> bool {
        self.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// What kind of place a record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    Farm,
    Pickup,
    Retail,
    #[default]
    Unknown,
}

impl LocationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Farm => "farm",
            Self::Pickup => "pickup",
            Self::Retail => "retail",
            Self::Unknown => "unknown",
        }
    }
}

/// How much a provider's data is trusted
///
/// Determines the starting confidence of locations first seen in that
/// provider's feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTrust {
    /// Bulk directories, search-result harvests
    #[default]
    Bulk,
    /// Hand-maintained lists from an organization that vets its entries
    Curated,
}

impl ProviderTrust {
    pub fn default_confidence(&self) -> f64 {
        match self {
            Self::Bulk => 0.58,
            Self::Curated => 0.8,
        }
    }
}

/// Where a record came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub provider_name: String,
    #[serde(default)]
    pub source_url: String,
}

impl Provenance {
    pub fn new(provider_name: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.into(),
            source_url: source_url.into(),
        }
    }
}

/// A single record as emitted by a source provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    pub name: String,
    #[serde(default)]
    pub kind: LocationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default)]
    pub provenance: Provenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl RawRecord {
    /// A record is usable when it has a name and at least one locality signal
    pub fn is_usable(&self) -> bool {
        !self.name.trim().is_empty()
            && [&self.city, &self.state, &self.address]
                .iter()
                .any(|field| non_empty(field).is_some())
    }
}

/// The merged representation of one physical place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalLocation {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: LocationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    pub confidence: f64,
    pub source_count: u32,
    #[serde(default)]
    pub provenance: Vec<Provenance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CanonicalLocation {
    /// Coordinates when resolved, `None` when either half is missing or non-finite
    pub fn coordinates(&self) -> Option<Coordinates> {
        coordinates_of(self.latitude, self.longitude)
    }

    pub fn is_resolved(&self) -> bool {
        self.coordinates().is_some()
    }
}

/// A canonical location ranked against a query point
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(flatten)]
    pub location: CanonicalLocation,
    /// Great-circle distance to the query origin, rounded to whole meters
    pub distance_meters: u64,
}

/// Read access to the address-bearing fields of a record
///
/// Implemented by both provider records and canonical locations so the
/// candidate builder and resolution orchestrator work on either.
pub trait AddressSource {
    fn name(&self) -> &str;
    fn address(&self) -> Option<&str>;
    fn city(&self) -> Option<&str>;
    fn state(&self) -> Option<&str>;
    fn postal_code(&self) -> Option<&str>;
    fn coordinates(&self) -> Option<Coordinates>;
    fn set_coordinates(&mut self, coordinates: Coordinates);
}

impl AddressSource for RawRecord {
    fn name(&self) -> &str {
        &self.name
    }
    fn address(&self) -> Option<&str> {
        non_empty(&self.address)
    }
    fn city(&self) -> Option<&str> {
        non_empty(&self.city)
    }
    fn state(&self) -> Option<&str> {
        non_empty(&self.state)
    }
    fn postal_code(&self) -> Option<&str> {
        non_empty(&self.postal_code)
    }
    fn coordinates(&self) -> Option<Coordinates> {
        coordinates_of(self.latitude, self.longitude)
    }
    fn set_coordinates(&mut self, coordinates: Coordinates) {
        self.latitude = Some(coordinates.latitude);
        self.longitude = Some(coordinates.longitude);
    }
}

impl AddressSource for CanonicalLocation {
    fn name(&self) -> &str {
        &self.name
    }
    fn address(&self) -> Option<&str> {
        non_empty(&self.address)
    }
    fn city(&self) -> Option<&str> {
        non_empty(&self.city)
    }
    fn state(&self) -> Option<&str> {
        non_empty(&self.state)
    }
    fn postal_code(&self) -> Option<&str> {
        non_empty(&self.postal_code)
    }
    fn coordinates(&self) -> Option<Coordinates> {
        CanonicalLocation::coordinates(self)
    }
    fn set_coordinates(&mut self, coordinates: Coordinates) {
        self.latitude = Some(coordinates.latitude);
        self.longitude = Some(coordinates.longitude);
    }
}

/// Trimmed view of an optional field, `None` when blank
pub fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn coordinates_of(latitude: Option<f64>, longitude: Option<f64>) -> Option<Coordinates> {
    match (latitude, longitude) {
        (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)).filter(Coordinates::is_finite),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_requires_name_and_locality() {
        let mut record = RawRecord {
            name: "Sunny Acres".to_string(),
            ..Default::default()
        };
        assert!(!record.is_usable());

        record.city = Some("  ".to_string());
        assert!(!record.is_usable());

        record.state = Some("VT".to_string());
        assert!(record.is_usable());

        record.name = " ".to_string();
        assert!(!record.is_usable());
    }

    #[test]
    fn test_half_coordinates_are_unresolved() {
        let mut record = RawRecord {
            name: "Half".to_string(),
            latitude: Some(42.0),
            ..Default::default()
        };
        assert!(AddressSource::coordinates(&record).is_none());

        record.longitude = Some(f64::NAN);
        assert!(AddressSource::coordinates(&record).is_none());

        record.set_coordinates(Coordinates::new(42.0, -72.5));
        assert_eq!(
            AddressSource::coordinates(&record),
            Some(Coordinates::new(42.0, -72.5))
        );
    }

    #[test]
    fn test_coordinate_ranges() {
        assert!(Coordinates::new(42.36, -71.06).is_valid());
        assert!(!Coordinates::new(91.0, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, f64::INFINITY).is_valid());
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        let json = serde_json::to_string(&LocationKind::Pickup).unwrap();
        assert_eq!(json, "\"pickup\"");
        let kind: LocationKind = serde_json::from_str("\"retail\"").unwrap();
        assert_eq!(kind, LocationKind::Retail);
    }

    #[test]
    fn test_trust_confidence_ordering() {
        assert!(ProviderTrust::Curated.default_confidence() > ProviderTrust::Bulk.default_confidence());
        assert!(ProviderTrust::Bulk < ProviderTrust::Curated);
    }
}
