//! Startup wiring shared by both binaries
//!
//! File mode vs DB mode is decided here, once, from `MONGODB_URI`.

use std::sync::Arc;
use tracing::info;

use crate::config::{GeocodeArgs, StorageArgs};
use crate::db::MongoClient;
use crate::geocode::{
    CacheStore, GeocodeCache, GeocodeClient, JsonFileCacheStore, MongoCacheStore, NominatimTransport,
};
use crate::store::{data_file, FileLocationStore, LocationStore, MongoLocationStore};
use crate::types::Result;

pub const GEOCODE_CACHE_FILE: &str = "geocode-cache.json";

/// Opened persistence for one process
pub struct Storage {
    pub locations: Arc<dyn LocationStore>,
    pub geocode_cache: Arc<dyn CacheStore>,
}

/// Open the location store and the geocode cache store
///
/// Any failure here is fatal at startup.
pub async fn open_storage(args: &StorageArgs) -> Result<Storage> {
    match args.mongodb_uri() {
        Some(uri) => {
            let client = MongoClient::new(uri, &args.mongodb_db).await?;
            info!(db = client.db_name(), "MongoDB connected; running in DB mode");
            Ok(Storage {
                locations: Arc::new(MongoLocationStore::open(&client).await?),
                geocode_cache: Arc::new(MongoCacheStore::new(&client).await?),
            })
        }
        None => {
            info!(data_dir = %args.data_dir.display(), "Running in file mode");
            let cache_path = data_file(&args.data_dir, GEOCODE_CACHE_FILE);
            Ok(Storage {
                locations: Arc::new(FileLocationStore::open(&args.data_dir).await?),
                geocode_cache: Arc::new(JsonFileCacheStore::new(cache_path)),
            })
        }
    }
}

/// Geocode client over the configured remote service and cache store
pub async fn geocode_client(
    args: &GeocodeArgs,
    cache_store: Arc<dyn CacheStore>,
) -> Result<Arc<GeocodeClient>> {
    let cache = GeocodeCache::open(cache_store).await?;
    let transport = NominatimTransport::new(args.nominatim_config());
    info!(
        url = %args.geocoder_url,
        concurrency = args.geocode_concurrency,
        courtesy_delay_ms = args.geocode_courtesy_delay_ms,
        "Geocoder configured"
    );

    Ok(Arc::new(GeocodeClient::new(
        Arc::new(transport),
        Arc::new(cache),
        Arc::new(args.throttle()),
        args.retry_policy(),
    )))
}
