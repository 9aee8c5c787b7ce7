//! US state normalization
//!
//! Maps full state names (spaced or hyphenated) and 2-letter postal codes to
//! a canonical [`UsState`]. Lookups are exact: anything not in the table is
//! rejected rather than guessed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// (postal code, lower-case full name) for the 50 states and D.C.
const STATES: &[(&str, &str)] = &[
    ("AL", "alabama"),
    ("AK", "alaska"),
    ("AZ", "arizona"),
    ("AR", "arkansas"),
    ("CA", "california"),
    ("CO", "colorado"),
    ("CT", "connecticut"),
    ("DE", "delaware"),
    ("FL", "florida"),
    ("GA", "georgia"),
    ("HI", "hawaii"),
    ("ID", "idaho"),
    ("IL", "illinois"),
    ("IN", "indiana"),
    ("IA", "iowa"),
    ("KS", "kansas"),
    ("KY", "kentucky"),
    ("LA", "louisiana"),
    ("ME", "maine"),
    ("MD", "maryland"),
    ("MA", "massachusetts"),
    ("MI", "michigan"),
    ("MN", "minnesota"),
    ("MS", "mississippi"),
    ("MO", "missouri"),
    ("MT", "montana"),
    ("NE", "nebraska"),
    ("NV", "nevada"),
    ("NH", "new hampshire"),
    ("NJ", "new jersey"),
    ("NM", "new mexico"),
    ("NY", "new york"),
    ("NC", "north carolina"),
    ("ND", "north dakota"),
    ("OH", "ohio"),
    ("OK", "oklahoma"),
    ("OR", "oregon"),
    ("PA", "pennsylvania"),
    ("RI", "rhode island"),
    ("SC", "south carolina"),
    ("SD", "south dakota"),
    ("TN", "tennessee"),
    ("TX", "texas"),
    ("UT", "utah"),
    ("VT", "vermont"),
    ("VA", "virginia"),
    ("WA", "washington"),
    ("WV", "west virginia"),
    ("WI", "wisconsin"),
    ("WY", "wyoming"),
    ("DC", "district of columbia"),
];

/// A canonical 2-letter US state (or D.C.) code
///
/// Only constructible through [`normalize`], so a value is always a known,
/// uppercase code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UsState(&'static str);

impl UsState {
    pub fn code(&self) -> &'static str {
        self.0
    }

    /// Lower-case full name, e.g. "new hampshire"
    pub fn full_name(&self) -> &'static str {
        STATES
            .iter()
            .find(|(code, _)| *code == self.0)
            .map(|(_, name)| *name)
            .unwrap_or_default()
    }
}

impl fmt::Display for UsState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl TryFrom<String> for UsState {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        normalize(&value).ok_or_else(|| format!("unknown US state: {}", value))
    }
}

impl From<UsState> for String {
    fn from(state: UsState) -> Self {
        state.0.to_string()
    }
}

/// Normalize a free-form state name or code
///
/// - "ma", "MA", "Ma" → `MA`
/// - "Massachusetts", "new-york", "New York" → `MA`, `NY`, `NY`
/// - "dc", "District of Columbia" → `DC`
/// - anything else → `None`
pub fn normalize(input: &str) -> Option<UsState> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let upper = trimmed.to_ascii_uppercase();
    if let Some((code, _)) = STATES.iter().find(|(code, _)| *code == upper) {
        return Some(UsState(*code));
    }

    // Hyphenated and multi-space variants share the spaced entry
    let lower = trimmed.to_ascii_lowercase();
    let spaced: String = lower
        .split(|c: char| c == '-' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    STATES
        .iter()
        .find(|(_, name)| *name == spaced)
        .map(|(code, _)| UsState(*code))
}

/// All canonical codes, in table order
pub fn all() -> impl Iterator<Item = UsState> {
    STATES.iter().map(|(code, _)| UsState(*code))
}
