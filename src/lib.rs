//! Locator - geocoding and proximity search for farm and pickup locations
//!
//! Listings scraped from several providers are resolved to coordinates,
//! merged into one canonical set, and served as "nearest to me" queries.
//!
//! ## Pipeline
//!
//! - **Address**: state normalization, address extraction, candidate queries
//! - **Geocode**: cached, throttled, coalescing client over a Nominatim-style API
//! - **Pipeline**: feed loading and the resolution orchestrator
//! - **Merge**: deterministic identity and field-level merge across providers
//! - **Proximity**: radius filter, distance ranking, confidence tie-break
//! - **Store**: JSON data directory or MongoDB

pub mod address;
pub mod config;
pub mod db;
pub mod geocode;
pub mod logging;
pub mod merge;
pub mod model;
pub mod pipeline;
pub mod proximity;
pub mod routes;
pub mod server;
pub mod services;
pub mod store;
pub mod types;

pub use config::{IngestArgs, ServerArgs};
pub use server::{run, AppState};
pub use types::{LocatorError, Result};
