//! Configuration for the locator binaries
//!
//! CLI arguments with environment variable fallbacks, loaded after `.env`.

use clap::{Args, Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::geocode::{NominatimConfig, RetryPolicy, Throttle};
use crate::pipeline::DEFAULT_RESOLVE_CONCURRENCY;
use crate::types::{LocatorError, Result};

/// Query server: nearest farms and pickup points
#[derive(Parser, Debug, Clone)]
#[command(name = "locator")]
#[command(about = "Nearest farm and pickup location search")]
pub struct ServerArgs {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Per-request time limit in milliseconds; exceeding it answers 503
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "10000")]
    pub request_timeout_ms: u64,

    #[command(flatten)]
    pub storage: StorageArgs,

    #[command(flatten)]
    pub geocode: GeocodeArgs,

    #[command(flatten)]
    pub log: LogArgs,
}

/// Ingest provider feeds into the canonical location set
#[derive(Parser, Debug, Clone)]
#[command(name = "locator-ingest")]
#[command(about = "Resolve, merge and store provider feeds")]
pub struct IngestArgs {
    /// Provider feed file; repeat in trust order, bulk first and curated last
    #[arg(long = "feed", value_name = "PATH")]
    pub feeds: Vec<PathBuf>,

    /// Skip feeds and retry stored locations that are still unresolved
    #[arg(long, default_value = "false")]
    pub resume: bool,

    /// Save progress every N locations
    #[arg(long, env = "SAVE_EVERY", default_value = "50")]
    pub save_every: usize,

    /// Records resolved concurrently
    #[arg(long, env = "RESOLVE_CONCURRENCY", default_value_t = DEFAULT_RESOLVE_CONCURRENCY)]
    pub resolve_concurrency: usize,

    #[command(flatten)]
    pub storage: StorageArgs,

    #[command(flatten)]
    pub geocode: GeocodeArgs,

    #[command(flatten)]
    pub log: LogArgs,
}

/// Where canonical locations and the geocode cache live
#[derive(Args, Debug, Clone)]
pub struct StorageArgs {
    /// Data directory for file mode (`locations.json`, `geocode-cache.json`)
    #[arg(long, env = "DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// MongoDB connection URI; when set, runs in DB mode
    #[arg(long, env = "MONGODB_URI")]
    pub mongodb_uri: Option<String>,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "locator")]
    pub mongodb_db: String,
}

/// Remote geocoding service and its courtesy limits
#[derive(Args, Debug, Clone)]
pub struct GeocodeArgs {
    /// Nominatim-compatible search endpoint
    #[arg(long, env = "GEOCODER_URL", default_value = "https://nominatim.openstreetmap.org/search")]
    pub geocoder_url: String,

    /// Contact address sent with every request
    #[arg(long, env = "GEOCODER_EMAIL", default_value = "locator@example.org")]
    pub geocoder_email: String,

    #[arg(long, env = "GEOCODER_USER_AGENT", default_value = "locator/0.1 (farm and pickup finder)")]
    pub geocoder_user_agent: String,

    /// Remote requests in flight at once
    #[arg(long, env = "GEOCODE_CONCURRENCY", default_value = "2")]
    pub geocode_concurrency: usize,

    /// Minimum spacing between consecutive remote requests
    #[arg(long, env = "GEOCODE_COURTESY_DELAY_MS", default_value = "850")]
    pub geocode_courtesy_delay_ms: u64,

    /// Wait before retrying a rate-limited request
    #[arg(long, env = "GEOCODE_RETRY_BACKOFF_MS", default_value = "1500")]
    pub geocode_retry_backoff_ms: u64,

    #[arg(long, env = "GEOCODE_TIMEOUT_MS", default_value = "10000")]
    pub geocode_timeout_ms: u64,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct LogArgs {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl StorageArgs {
    /// DB mode when a non-blank MongoDB URI is configured
    pub fn mongodb_uri(&self) -> Option<&str> {
        self.mongodb_uri
            .as_deref()
            .map(str::trim)
            .filter(|uri| !uri.is_empty())
    }

    pub fn validate(&self) -> Result<()> {
        if self.mongodb_uri().is_some() && self.mongodb_db.trim().is_empty() {
            return Err(LocatorError::Config("MONGODB_DB must not be empty".into()));
        }
        if self.mongodb_uri().is_none() && self.data_dir.as_os_str().is_empty() {
            return Err(LocatorError::Config("DATA_DIR must not be empty".into()));
        }
        Ok(())
    }
}

impl GeocodeArgs {
    pub fn validate(&self) -> Result<()> {
        if !(self.geocoder_url.starts_with("http://") || self.geocoder_url.starts_with("https://")) {
            return Err(LocatorError::Config(format!(
                "GEOCODER_URL must be an http(s) URL, got {}",
                self.geocoder_url
            )));
        }
        if !self.geocoder_email.contains('@') {
            return Err(LocatorError::Config(
                "GEOCODER_EMAIL must be a contact e-mail address".into(),
            ));
        }
        if self.geocoder_user_agent.trim().is_empty() {
            return Err(LocatorError::Config("GEOCODER_USER_AGENT must not be empty".into()));
        }
        if self.geocode_concurrency == 0 {
            return Err(LocatorError::Config("GEOCODE_CONCURRENCY must be at least 1".into()));
        }
        if self.geocode_timeout_ms == 0 {
            return Err(LocatorError::Config("GEOCODE_TIMEOUT_MS must be positive".into()));
        }
        Ok(())
    }

    pub fn nominatim_config(&self) -> NominatimConfig {
        NominatimConfig {
            base_url: self.geocoder_url.clone(),
            email: self.geocoder_email.clone(),
            user_agent: self.geocoder_user_agent.clone(),
            request_timeout: Duration::from_millis(self.geocode_timeout_ms),
            ..NominatimConfig::default()
        }
    }

    pub fn throttle(&self) -> Throttle {
        Throttle::new(
            self.geocode_concurrency,
            Duration::from_millis(self.geocode_courtesy_delay_ms),
        )
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(2, Duration::from_millis(self.geocode_retry_backoff_ms))
    }
}

impl ServerArgs {
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            return Err(LocatorError::Config("REQUEST_TIMEOUT_MS must be positive".into()));
        }
        self.storage.validate()?;
        self.geocode.validate()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl IngestArgs {
    pub fn validate(&self) -> Result<()> {
        if !self.resume && self.feeds.is_empty() {
            return Err(LocatorError::Config(
                "at least one --feed is required unless --resume is set".into(),
            ));
        }
        if self.save_every == 0 {
            return Err(LocatorError::Config("--save-every must be at least 1".into()));
        }
        if self.resolve_concurrency == 0 {
            return Err(LocatorError::Config("--resolve-concurrency must be at least 1".into()));
        }
        self.storage.validate()?;
        self.geocode.validate()
    }
}
