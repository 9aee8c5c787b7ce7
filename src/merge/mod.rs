//! Merge and dedup across provider feeds
//!
//! Every incoming record becomes a [`LocationPatch`]: a partial update keyed
//! by the deterministic location id. The [`MergeEngine`] folds patches in
//! order, field by field, last write wins. Which patch is applied last is
//! the caller's decision: feed bulk sources first and curated sources last
//! when curated data should win.

pub mod identity;

use chrono::Utc;
use std::collections::BTreeMap;
use tracing::debug;

use crate::address::{extract, normalize_state};
use crate::model::{
    non_empty, AddressSource, CanonicalLocation, Coordinates, LocationKind, Provenance,
    ProviderTrust, RawRecord,
};

pub use identity::{id_for, location_id, slugify};

/// Minimum confidence of a location reported by more than one provider
pub const CORROBORATION_FLOOR: f64 = 0.60;

/// One provider's partial view of a location
///
/// `None` fields leave the current value untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationPatch {
    pub id: String,
    pub name: Option<String>,
    /// `None` when the provider did not know the kind
    pub kind: Option<LocationKind>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub provenance: Vec<Provenance>,
    pub confidence: f64,
}

impl LocationPatch {
    /// Patch from a provider record, at the provider's trust level
    pub fn from_record(record: &RawRecord, trust: ProviderTrust) -> Self {
        Self {
            id: id_for(record),
            name: Some(record.name.trim().to_string()).filter(|n| !n.is_empty()),
            kind: known_kind(record.kind),
            address: owned(&record.address),
            city: owned(&record.city),
            state: record.state().map(canonical_state),
            postal_code: record.postal_code().and_then(extract::pad_postal_code),
            phone: owned(&record.phone),
            website: owned(&record.website),
            coordinates: AddressSource::coordinates(record),
            provenance: vec![record.provenance.clone()],
            confidence: trust.default_confidence(),
        }
    }

    /// Patch carrying a previously merged location, e.g. from an earlier run
    pub fn from_canonical(location: &CanonicalLocation) -> Self {
        Self {
            id: location.id.clone(),
            name: Some(location.name.trim().to_string()).filter(|n| !n.is_empty()),
            kind: known_kind(location.kind),
            address: owned(&location.address),
            city: owned(&location.city),
            state: location.state().map(canonical_state),
            postal_code: location.postal_code().and_then(extract::pad_postal_code),
            phone: owned(&location.phone),
            website: owned(&location.website),
            coordinates: location.coordinates(),
            provenance: location.provenance.clone(),
            confidence: location.confidence,
        }
    }
}

/// A record or an already-canonical location entering the merge
#[derive(Debug, Clone)]
pub enum MergeInput {
    Raw(RawRecord),
    Canonical(CanonicalLocation),
}

/// One provider's output, merged as a unit
#[derive(Debug, Clone)]
pub struct ProviderStream {
    pub trust: ProviderTrust,
    pub items: Vec<MergeInput>,
}

impl ProviderStream {
    pub fn raw(trust: ProviderTrust, records: Vec<RawRecord>) -> Self {
        Self {
            trust,
            items: records.into_iter().map(MergeInput::Raw).collect(),
        }
    }

    pub fn canonical(locations: Vec<CanonicalLocation>) -> Self {
        Self {
            trust: ProviderTrust::default(),
            items: locations.into_iter().map(MergeInput::Canonical).collect(),
        }
    }

    fn patches(&self) -> impl Iterator<Item = LocationPatch> + '_ {
        self.items.iter().map(move |item| match item {
            MergeInput::Raw(record) => LocationPatch::from_record(record, self.trust),
            MergeInput::Canonical(location) => LocationPatch::from_canonical(location),
        })
    }
}

/// What applying one patch did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// Merge counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub inserted: u64,
    pub updated: u64,
    pub unchanged: u64,
}

/// Ordered reduction of patches into canonical locations
///
/// Takes `&mut self`, so one engine never merges concurrently with itself.
#[derive(Debug, Default)]
pub struct MergeEngine {
    locations: BTreeMap<String, CanonicalLocation>,
    stats: MergeStats,
}

impl MergeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing canonical set, taken as-is
    pub fn with_locations(locations: impl IntoIterator<Item = CanonicalLocation>) -> Self {
        Self {
            locations: locations.into_iter().map(|l| (l.id.clone(), l)).collect(),
            stats: MergeStats::default(),
        }
    }

    /// Merge every stream, in order, into a fresh id → location map
    pub fn merge(streams: &[ProviderStream]) -> BTreeMap<String, CanonicalLocation> {
        let mut engine = Self::new();
        for stream in streams {
            engine.merge_stream(stream);
        }
        engine.into_locations()
    }

    pub fn merge_stream(&mut self, stream: &ProviderStream) {
        for patch in stream.patches() {
            self.apply(patch);
        }
    }

    /// Apply one patch
    pub fn apply(&mut self, patch: LocationPatch) -> MergeOutcome {
        let outcome = match self.locations.get_mut(&patch.id) {
            None => {
                let location = new_location(patch);
                debug!(id = %location.id, "New canonical location");
                self.locations.insert(location.id.clone(), location);
                MergeOutcome::Inserted
            }
            Some(location) => {
                if apply_patch(location, patch) {
                    location.updated_at = Some(Utc::now());
                    MergeOutcome::Updated
                } else {
                    MergeOutcome::Unchanged
                }
            }
        };

        match outcome {
            MergeOutcome::Inserted => self.stats.inserted += 1,
            MergeOutcome::Updated => self.stats.updated += 1,
            MergeOutcome::Unchanged => self.stats.unchanged += 1,
        }
        outcome
    }

    pub fn get(&self, id: &str) -> Option<&CanonicalLocation> {
        self.locations.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut CanonicalLocation> {
        self.locations.get_mut(id)
    }

    pub fn locations(&self) -> impl Iterator<Item = &CanonicalLocation> {
        self.locations.values()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn stats(&self) -> MergeStats {
        self.stats
    }

    pub fn into_locations(self) -> BTreeMap<String, CanonicalLocation> {
        self.locations
    }
}

fn new_location(patch: LocationPatch) -> CanonicalLocation {
    let mut provenance: Vec<Provenance> = Vec::with_capacity(patch.provenance.len());
    for entry in patch.provenance {
        if !provenance.iter().any(|p| p.provider_name == entry.provider_name) {
            provenance.push(entry);
        }
    }

    let mut confidence = patch.confidence;
    if provenance.len() > 1 {
        confidence = confidence.max(CORROBORATION_FLOOR);
    }

    CanonicalLocation {
        name: patch.name.unwrap_or_else(|| patch.id.clone()),
        id: patch.id,
        kind: patch.kind.unwrap_or_default(),
        address: patch.address,
        city: patch.city,
        state: patch.state,
        postal_code: patch.postal_code,
        phone: patch.phone,
        website: patch.website,
        latitude: patch.coordinates.map(|c| c.latitude),
        longitude: patch.coordinates.map(|c| c.longitude),
        confidence,
        source_count: provenance.len().max(1) as u32,
        provenance,
        updated_at: Some(Utc::now()),
    }
}

/// Per-field last write wins; returns whether anything changed
fn apply_patch(location: &mut CanonicalLocation, patch: LocationPatch) -> bool {
    let mut changed = false;

    if let Some(name) = patch.name {
        changed |= overwrite(&mut location.name, name);
    }
    if let Some(kind) = patch.kind {
        changed |= overwrite(&mut location.kind, kind);
    }
    changed |= overwrite_some(&mut location.address, patch.address);
    changed |= overwrite_some(&mut location.city, patch.city);
    changed |= overwrite_some(&mut location.state, patch.state);
    changed |= overwrite_some(&mut location.postal_code, patch.postal_code);
    changed |= overwrite_some(&mut location.phone, patch.phone);
    changed |= overwrite_some(&mut location.website, patch.website);

    // Both halves or neither
    if let Some(coordinates) = patch.coordinates {
        changed |= overwrite_some(&mut location.latitude, Some(coordinates.latitude));
        changed |= overwrite_some(&mut location.longitude, Some(coordinates.longitude));
    }

    let mut corroborated = false;
    for entry in patch.provenance {
        if !location
            .provenance
            .iter()
            .any(|p| p.provider_name == entry.provider_name)
        {
            location.provenance.push(entry);
            location.source_count += 1;
            corroborated = true;
        }
    }

    let mut confidence = location.confidence.max(patch.confidence);
    if corroborated {
        confidence = confidence.max(CORROBORATION_FLOOR);
    }
    changed |= corroborated;
    changed |= overwrite(&mut location.confidence, confidence);

    changed
}

fn overwrite<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

fn overwrite_some<T: PartialEq>(slot: &mut Option<T>, value: Option<T>) -> bool {
    match value {
        Some(value) if slot.as_ref() != Some(&value) => {
            *slot = Some(value);
            true
        }
        _ => false,
    }
}

fn owned(field: &Option<String>) -> Option<String> {
    non_empty(field).map(str::to_string)
}

fn known_kind(kind: LocationKind) -> Option<LocationKind> {
    Some(kind).filter(|k| *k != LocationKind::Unknown)
}

/// 2-letter code when the state is recognised, the trimmed text otherwise
fn canonical_state(state: &str) -> String {
    normalize_state(state)
        .map(|s| s.code().to_string())
        .unwrap_or_else(|| state.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn record(provider: &str) -> RawRecord {
        RawRecord {
            name: "Sunny Acres".to_string(),
            city: Some("Hadley".to_string()),
            state: Some("Massachusetts".to_string()),
            postal_code: Some("01035".to_string()),
            provenance: Provenance::new(provider, format!("https://{}.example", provider)),
            ..Default::default()
        }
    }

    #[test]
    fn test_fields_from_both_providers_survive() {
        let mut a = record("a");
        a.phone = Some("413-555-0100".to_string());
        let mut b = record("b");
        b.website = Some("https://sunnyacres.example".to_string());

        let merged = MergeEngine::merge(&[
            ProviderStream::raw(ProviderTrust::Bulk, vec![a]),
            ProviderStream::raw(ProviderTrust::Bulk, vec![b]),
        ]);

        assert_eq!(merged.len(), 1);
        let location = merged.values().next().unwrap();
        assert_eq!(location.id, "sunny-acres-01035");
        assert_eq!(location.phone.as_deref(), Some("413-555-0100"));
        assert_eq!(location.website.as_deref(), Some("https://sunnyacres.example"));
        assert_eq!(location.state.as_deref(), Some("MA"));
        assert_eq!(location.source_count, 2);
        assert!(location.confidence >= CORROBORATION_FLOOR);
    }

    #[test]
    fn test_conflicts_follow_last_write() {
        let mut a = record("a");
        a.website = Some("https://a.example".to_string());
        let mut b = record("b");
        b.website = Some("https://b.example".to_string());

        let ab = MergeEngine::merge(&[
            ProviderStream::raw(ProviderTrust::Bulk, vec![a.clone()]),
            ProviderStream::raw(ProviderTrust::Bulk, vec![b.clone()]),
        ]);
        let ba = MergeEngine::merge(&[
            ProviderStream::raw(ProviderTrust::Bulk, vec![b]),
            ProviderStream::raw(ProviderTrust::Bulk, vec![a]),
        ]);

        assert_eq!(
            ab.keys().collect::<BTreeSet<_>>(),
            ba.keys().collect::<BTreeSet<_>>()
        );
        assert_eq!(ab["sunny-acres-01035"].website.as_deref(), Some("https://b.example"));
        assert_eq!(ba["sunny-acres-01035"].website.as_deref(), Some("https://a.example"));
    }

    #[test]
    fn test_id_set_independent_of_order() {
        let mut other = record("b");
        other.name = "Hilltop Dairy".to_string();
        let streams = vec![
            ProviderStream::raw(ProviderTrust::Bulk, vec![record("a"), other]),
            ProviderStream::raw(ProviderTrust::Curated, vec![record("c")]),
        ];
        let mut reversed = streams.clone();
        reversed.reverse();

        let forward: BTreeSet<_> = MergeEngine::merge(&streams).into_keys().collect();
        let backward: BTreeSet<_> = MergeEngine::merge(&reversed).into_keys().collect();
        assert_eq!(forward, backward);
        assert_eq!(forward.len(), 2);
    }

    #[test]
    fn test_reapplying_same_record_is_noop() {
        let mut engine = MergeEngine::new();
        let patch = LocationPatch::from_record(&record("a"), ProviderTrust::Bulk);

        assert_eq!(engine.apply(patch.clone()), MergeOutcome::Inserted);
        let before = engine.get("sunny-acres-01035").unwrap().clone();

        assert_eq!(engine.apply(patch), MergeOutcome::Unchanged);
        assert_eq!(engine.get("sunny-acres-01035").unwrap(), &before);
        assert_eq!(before.source_count, 1);
        assert_eq!(engine.stats().unchanged, 1);
    }

    #[test]
    fn test_confidence_never_lowered() {
        let mut engine = MergeEngine::new();
        engine.apply(LocationPatch::from_record(&record("curated"), ProviderTrust::Curated));
        engine.apply(LocationPatch::from_record(&record("bulk"), ProviderTrust::Bulk));

        let location = engine.get("sunny-acres-01035").unwrap();
        assert_eq!(location.confidence, ProviderTrust::Curated.default_confidence());
        assert_eq!(location.source_count, 2);
    }

    #[test]
    fn test_bulk_default_confidence() {
        let mut engine = MergeEngine::new();
        engine.apply(LocationPatch::from_record(&record("a"), ProviderTrust::Bulk));
        assert_eq!(engine.get("sunny-acres-01035").unwrap().confidence, 0.58);

        engine.apply(LocationPatch::from_record(&record("b"), ProviderTrust::Bulk));
        assert_eq!(engine.get("sunny-acres-01035").unwrap().confidence, CORROBORATION_FLOOR);
    }

    #[test]
    fn test_unknown_kind_and_half_coordinates_do_not_overwrite() {
        let mut first = record("a");
        first.kind = LocationKind::Farm;
        first.latitude = Some(42.34);
        first.longitude = Some(-72.58);

        let mut second = record("b");
        second.kind = LocationKind::Unknown;
        second.latitude = Some(10.0);

        let mut engine = MergeEngine::new();
        engine.apply(LocationPatch::from_record(&first, ProviderTrust::Bulk));
        engine.apply(LocationPatch::from_record(&second, ProviderTrust::Bulk));

        let location = engine.get("sunny-acres-01035").unwrap();
        assert_eq!(location.kind, LocationKind::Farm);
        assert_eq!(location.coordinates(), Some(Coordinates::new(42.34, -72.58)));
    }

    #[test]
    fn test_canonical_input_reseeds_without_double_counting() {
        let first = MergeEngine::merge(&[
            ProviderStream::raw(ProviderTrust::Bulk, vec![record("a")]),
            ProviderStream::raw(ProviderTrust::Curated, vec![record("b")]),
        ]);
        let existing: Vec<_> = first.into_values().collect();

        let mut engine = MergeEngine::with_locations(existing.clone());
        engine.merge_stream(&ProviderStream::canonical(existing));
        engine.merge_stream(&ProviderStream::raw(ProviderTrust::Bulk, vec![record("a")]));

        let location = engine.get("sunny-acres-01035").unwrap();
        assert_eq!(location.source_count, 2);
        assert_eq!(location.confidence, 0.8);
        assert_eq!(engine.stats().updated, 0);
    }
}
