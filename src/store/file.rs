//! File mode: one JSON snapshot in the data directory
//!
//! The snapshot is read once at open and served from a [`MemoryBackend`].
//! Upserts merge into that set by id and rewrite the file atomically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{data_file, sort_listing, write_atomic, ListFilter, LocationStore, StoreMode};
use crate::model::CanonicalLocation;
use crate::proximity::{MemoryBackend, ProximityBackend};
use crate::types::{LocatorError, Result};

pub const LOCATIONS_FILE: &str = "locations.json";

/// On-disk layout of `locations.json`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub locations: Vec<CanonicalLocation>,
}

pub struct FileLocationStore {
    path: PathBuf,
    index: MemoryBackend,
    /// Serializes read-modify-write cycles on the snapshot
    write_lock: Mutex<()>,
}

impl FileLocationStore {
    /// Open `locations.json` under `data_dir`; a missing file is an empty store
    pub async fn open(data_dir: &Path) -> Result<Self> {
        let path = data_file(data_dir, LOCATIONS_FILE);
        let locations = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: LocationSnapshot = serde_json::from_slice(&bytes).map_err(|e| {
                    LocatorError::Storage(format!("{} is not a location snapshot: {}", path.display(), e))
                })?;
                snapshot.locations
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), locations = locations.len(), "Opened location snapshot");
        Ok(Self {
            path,
            index: MemoryBackend::new(locations),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LocationStore for FileLocationStore {
    async fn load_all(&self) -> Result<Vec<CanonicalLocation>> {
        Ok(self.index.snapshot().await)
    }

    async fn upsert_many(&self, locations: &[CanonicalLocation]) -> Result<usize> {
        let _guard = self.write_lock.lock().await;

        let mut merged: BTreeMap<String, CanonicalLocation> = self
            .index
            .snapshot()
            .await
            .into_iter()
            .map(|l| (l.id.clone(), l))
            .collect();
        for location in locations {
            merged.insert(location.id.clone(), location.clone());
        }

        let snapshot = LocationSnapshot {
            generated_at: Some(Utc::now()),
            count: merged.len(),
            locations: merged.into_values().collect(),
        };
        let json = serde_json::to_vec_pretty(&snapshot)?;
        write_atomic(&self.path, &json).await?;

        debug!(written = locations.len(), total = snapshot.count, "Saved location snapshot");
        self.index.replace(snapshot.locations).await;
        Ok(locations.len())
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<CanonicalLocation>> {
        let mut matched = self.index.filter(|l| filter.matches(l)).await;
        sort_listing(&mut matched);
        Ok(matched)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.index.len().await as u64)
    }

    fn mode(&self) -> StoreMode {
        StoreMode::File
    }

    fn proximity(&self) -> Arc<dyn ProximityBackend> {
        Arc::new(self.index.clone())
    }
}
