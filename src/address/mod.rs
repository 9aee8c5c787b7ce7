//! Address heuristics for scraped listings
//!
//! - [`state`] canonicalizes US state names and codes
//! - [`extract`] pulls street/city/state/postal pieces out of a text blob
//! - [`candidates`] turns a record into ordered geocoding queries

pub mod candidates;
pub mod extract;
pub mod state;

pub use candidates::{build as build_candidates, candidates_for, pieces_for};
pub use extract::{extract, AddressPieces};
pub use state::{normalize as normalize_state, UsState};
