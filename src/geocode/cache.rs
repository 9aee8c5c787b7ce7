//! Geocode cache with pluggable persistence
//!
//! The in-memory map is authoritative for the lifetime of the process. Every
//! insert is also handed to a [`CacheStore`]; a store failure is logged and
//! otherwise ignored.

use async_trait::async_trait;
use bson::doc;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::db::schemas::{GeocodeCacheDoc, GEOCODE_CACHE_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::model::Coordinates;
use crate::store::write_atomic;
use crate::types::{LocatorError, Result};

/// Durable backing for the geocode cache
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Load every persisted entry
    async fn load(&self) -> Result<HashMap<String, Coordinates>>;

    /// Persist one entry; returns once the write is durable
    async fn persist(&self, key: &str, coordinates: Coordinates) -> Result<()>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Persistence that forgets everything, for tests and dry runs
#[derive(Debug, Default)]
pub struct NoopCacheStore;

#[async_trait]
impl CacheStore for NoopCacheStore {
    async fn load(&self) -> Result<HashMap<String, Coordinates>> {
        Ok(HashMap::new())
    }

    async fn persist(&self, _key: &str, _coordinates: Coordinates) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// Whole-map JSON file, rewritten atomically on every insert
///
/// Keys are kept sorted so the file diffs cleanly between runs.
pub struct JsonFileCacheStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, Coordinates>>,
}

impl JsonFileCacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CacheStore for JsonFileCacheStore {
    async fn load(&self) -> Result<HashMap<String, Coordinates>> {
        let loaded: BTreeMap<String, Coordinates> = match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        let mut entries = self.entries.lock().await;
        *entries = loaded;
        Ok(entries.iter().map(|(k, v)| (k.clone(), *v)).collect())
    }

    async fn persist(&self, key: &str, coordinates: Coordinates) -> Result<()> {
        // Held across the write so concurrent inserts cannot interleave files
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), coordinates);
        let json = serde_json::to_vec_pretty(&*entries)?;
        write_atomic(&self.path, &json).await
    }

    fn name(&self) -> &'static str {
        "json-file"
    }
}

/// `geocode_cache` collection, one document per key
pub struct MongoCacheStore {
    collection: MongoCollection<GeocodeCacheDoc>,
}

impl MongoCacheStore {
    pub async fn new(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            collection: client.collection(GEOCODE_CACHE_COLLECTION).await?,
        })
    }
}

#[async_trait]
impl CacheStore for MongoCacheStore {
    async fn load(&self) -> Result<HashMap<String, Coordinates>> {
        let docs = self.collection.find_many(doc! {}).await?;
        Ok(docs
            .into_iter()
            .filter(|d| d.coordinates().is_finite())
            .map(|d| {
                let coordinates = d.coordinates();
                (d._id, coordinates)
            })
            .collect())
    }

    async fn persist(&self, key: &str, coordinates: Coordinates) -> Result<()> {
        let doc = GeocodeCacheDoc::new(key, coordinates);
        self.collection.upsert(doc! { "_id": key }, &doc).await
    }

    fn name(&self) -> &'static str {
        "mongodb"
    }
}

/// Query key → coordinates, shared by every resolver in the process
pub struct GeocodeCache {
    entries: RwLock<HashMap<String, Coordinates>>,
    store: Arc<dyn CacheStore>,
}

impl GeocodeCache {
    /// Load every persisted entry from `store`
    pub async fn open(store: Arc<dyn CacheStore>) -> Result<Self> {
        let entries = store.load().await.map_err(|e| {
            LocatorError::Storage(format!("Failed to load geocode cache from {}: {}", store.name(), e))
        })?;
        info!(store = store.name(), entries = entries.len(), "Geocode cache loaded");

        Ok(Self {
            entries: RwLock::new(entries),
            store,
        })
    }

    /// Empty cache that persists nothing
    pub fn in_memory() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            store: Arc::new(NoopCacheStore),
        }
    }

    pub async fn get(&self, key: &str) -> Option<Coordinates> {
        self.entries.read().await.get(key).copied()
    }

    /// Insert and persist
    ///
    /// A persistence failure is logged; the in-memory entry stays.
    pub async fn insert(&self, key: &str, coordinates: Coordinates) {
        self.entries
            .write()
            .await
            .insert(key.to_string(), coordinates);

        match self.store.persist(key, coordinates).await {
            Ok(()) => debug!(key = %key, store = self.store.name(), "Geocode cache entry persisted"),
            Err(e) => warn!(
                key = %key,
                store = self.store.name(),
                error = %e,
                "Failed to persist geocode cache entry"
            ),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingStore {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl CacheStore for FailingStore {
        async fn load(&self) -> Result<HashMap<String, Coordinates>> {
            Ok(HashMap::new())
        }

        async fn persist(&self, _key: &str, _coordinates: Coordinates) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(LocatorError::Storage("disk full".to_string()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geocode-cache.json");

        let cache = GeocodeCache::open(Arc::new(JsonFileCacheStore::new(&path)))
            .await
            .unwrap();
        assert!(cache.is_empty().await);
        cache.insert("hadley, ma", Coordinates::new(42.34, -72.58)).await;
        cache.insert("barre, vt", Coordinates::new(44.19, -72.5)).await;

        let reopened = GeocodeCache::open(Arc::new(JsonFileCacheStore::new(&path)))
            .await
            .unwrap();
        assert_eq!(reopened.len().await, 2);
        assert_eq!(
            reopened.get("hadley, ma").await,
            Some(Coordinates::new(42.34, -72.58))
        );
        assert!(!dir.path().join("geocode-cache.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geocode-cache.json");
        std::fs::write(&path, b"{not json").unwrap();

        let result = GeocodeCache::open(Arc::new(JsonFileCacheStore::new(&path))).await;
        assert!(matches!(result, Err(LocatorError::Storage(_))));
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_memory_entry() {
        let store = Arc::new(FailingStore {
            attempts: AtomicUsize::new(0),
        });
        let cache = GeocodeCache::open(store.clone()).await.unwrap();

        cache.insert("barre, vt", Coordinates::new(44.19, -72.5)).await;

        assert_eq!(store.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(
            cache.get("barre, vt").await,
            Some(Coordinates::new(44.19, -72.5))
        );
    }
}
