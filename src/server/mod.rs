//! HTTP query surface

pub mod http;

use std::sync::Arc;
use std::time::Duration;

use crate::geocode::GeocodeClient;
use crate::proximity::ProximityEngine;
use crate::store::LocationStore;

pub use http::{handle_request, run};

/// Shared state for every request handler
pub struct AppState {
    pub store: Arc<dyn LocationStore>,
    pub proximity: ProximityEngine,
    /// Resolves free-text `address=` origins
    pub geocoder: Arc<GeocodeClient>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(
        store: Arc<dyn LocationStore>,
        geocoder: Arc<GeocodeClient>,
        request_timeout: Duration,
    ) -> Self {
        let proximity = ProximityEngine::new(store.proximity());
        Self {
            store,
            proximity,
            geocoder,
            request_timeout,
        }
    }
}
