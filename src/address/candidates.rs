//! Candidate geocoding queries for one record
//!
//! Queries are ordered most specific first; the resolution orchestrator
//! stops at the first one the geocoder resolves.

use std::collections::HashSet;

use super::extract::{self, collapse_whitespace, AddressPieces};
use super::state;
use crate::model::AddressSource;

/// Country hint appended to queries
pub const COUNTRY_HINT: &str = "USA";

/// Extract address pieces from every address-bearing field of a record
///
/// The record's own state, when it normalizes, is the default state.
pub fn pieces_for<R: AddressSource + ?Sized>(record: &R) -> AddressPieces {
    let text = [
        record.address(),
        record.city(),
        record.state(),
        record.postal_code(),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ");

    extract::extract(&text, record.state().and_then(state::normalize))
}

/// Extract and build in one step
pub fn candidates_for<R: AddressSource + ?Sized>(record: &R) -> Vec<String> {
    build(record, &pieces_for(record))
}

/// Build the ordered, deduplicated candidate list
///
/// Never empty: the sanitized raw text (or the record name when nothing else
/// is left) always contributes the last entry, and a record with neither
/// still gets the bare country hint.
pub fn build<R: AddressSource + ?Sized>(record: &R, pieces: &AddressPieces) -> Vec<String> {
    let mut candidates = CandidateList::default();
    let state = pieces.state.map(|s| s.code());

    // 1. What the source supplied itself
    if let Some(structured) = structured_query(record) {
        candidates.push_with_country(&structured);
    }

    // 2. Postal code
    if let Some(postal) = &pieces.postal_code {
        candidates.push_with_country(postal);
    }

    // 3. City + state
    if let (Some(city), Some(state)) = (&pieces.city, state) {
        let query = format!("{}, {}", city, state);
        candidates.push(&query);
        candidates.push_with_country(&query);
    }

    // 4. Street + city + state
    if let (Some(street), Some(city), Some(state)) = (&pieces.street, &pieces.city, state) {
        let query = format!("{}, {}, {}", street, city, state);
        candidates.push(&query);
        candidates.push_with_country(&query);
    }

    // 5. Name + state, for landmarks the geocoder knows by name
    let name = collapse_whitespace(record.name());
    if let (false, Some(state)) = (name.is_empty(), state) {
        let query = format!("{}, {}", name, state);
        candidates.push(&query);
        candidates.push_with_country(&query);
    }

    // 6. Whatever text is left
    let raw = if pieces.sanitized_text.is_empty() {
        name.as_str()
    } else {
        pieces.sanitized_text.as_str()
    };
    candidates.push_with_country(raw);

    if candidates.is_empty() {
        candidates.push(COUNTRY_HINT);
    }
    candidates.into_vec()
}

/// Joined source fields, only when they carry more than a bare city
///
/// A city alone duplicates the city + state candidate, so this requires a
/// street, or a city together with a postal code.
fn structured_query<R: AddressSource + ?Sized>(record: &R) -> Option<String> {
    let street = record.address().map(extract::sanitize).filter(|s| !s.is_empty());
    let city = record.city().map(collapse_whitespace);
    let postal = record.postal_code().and_then(extract::pad_postal_code);

    if street.is_none() && !(city.is_some() && postal.is_some()) {
        return None;
    }

    let state = record
        .state()
        .and_then(state::normalize)
        .map(|s| s.code().to_string());

    let parts: Vec<String> = [street, city, state, postal].into_iter().flatten().collect();
    Some(parts.join(", "))
}

/// Insertion-ordered set of whitespace-normalized queries
#[derive(Default)]
struct CandidateList {
    queries: Vec<String>,
    seen: HashSet<String>,
}

impl CandidateList {
    fn push(&mut self, query: &str) {
        let query = collapse_whitespace(query);
        if query.is_empty() || self.seen.contains(&query) {
            return;
        }
        self.seen.insert(query.clone());
        self.queries.push(query);
    }

    fn push_with_country(&mut self, query: &str) {
        let query = query.trim().trim_end_matches(',');
        if query.trim().is_empty() {
            return;
        }
        self.push(&format!("{}, {}", query, COUNTRY_HINT));
    }

    fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    fn into_vec(self) -> Vec<String> {
        self.queries
    }
}
