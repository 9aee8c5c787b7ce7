//! Canonical location storage
//!
//! Two modes, picked at startup by whether `MONGODB_URI` is set:
//! - file mode: `locations.json` in the data directory, served from memory
//! - DB mode: the `locations` collection, searched with `$geoNear`

pub mod file;
pub mod mongo;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::address::normalize_state;
use crate::model::CanonicalLocation;
use crate::proximity::ProximityBackend;
use crate::types::Result;

pub use file::{FileLocationStore, LocationSnapshot};
pub use mongo::MongoLocationStore;

/// Which persistence the process runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    File,
    Database,
}

impl StoreMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreMode::File => "file",
            StoreMode::Database => "db",
        }
    }
}

/// Listing filter for `/v1/locations`
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// State code or name, case-insensitive
    pub state: Option<String>,
    /// Substring over name, city, address and website
    pub text: Option<String>,
}

impl ListFilter {
    pub fn new(state: Option<String>, text: Option<String>) -> Self {
        let clean = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Self {
            state: clean(state),
            text: clean(text),
        }
    }

    /// The state filter as a stored value: the 2-letter code when recognized
    pub fn state_value(&self) -> Option<String> {
        self.state.as_deref().map(|s| match normalize_state(s) {
            Some(state) => state.code().to_string(),
            None => s.to_string(),
        })
    }

    pub fn matches(&self, location: &CanonicalLocation) -> bool {
        if let Some(state) = self.state_value() {
            let stored = location.state.as_deref().unwrap_or("");
            let stored = normalize_state(stored).map_or(stored, |s| s.code());
            if !stored.eq_ignore_ascii_case(&state) {
                return false;
            }
        }
        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            let hit = [
                Some(location.name.as_str()),
                location.city.as_deref(),
                location.address.as_deref(),
                location.website.as_deref(),
            ]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Durable home of the canonical location set
#[async_trait]
pub trait LocationStore: Send + Sync {
    /// Every stored location
    async fn load_all(&self) -> Result<Vec<CanonicalLocation>>;

    /// Insert or replace by id; returns how many were written
    async fn upsert_many(&self, locations: &[CanonicalLocation]) -> Result<usize>;

    /// Locations matching a filter, ordered by name then id
    async fn list(&self, filter: &ListFilter) -> Result<Vec<CanonicalLocation>>;

    async fn count(&self) -> Result<u64>;

    fn mode(&self) -> StoreMode;

    /// The proximity back end reading this store
    fn proximity(&self) -> Arc<dyn ProximityBackend>;
}

/// Sort order shared by every listing
pub(crate) fn sort_listing(locations: &mut [CanonicalLocation]) {
    locations.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
}

/// Path of a file inside the data directory
pub fn data_file(data_dir: &Path, name: &str) -> PathBuf {
    data_dir.join(name)
}

/// Write to a sibling temp file, then rename over the target
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
