//! Provider feed files
//!
//! A feed is one provider's scrape output:
//!
//! ```json
//! { "provider": "state-ag-directory", "sourceUrl": "https://...", "trust": "bulk",
//!   "records": [ { "name": "...", "city": "...", ... } ] }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::merge::ProviderStream;
use crate::model::{ProviderTrust, RawRecord};
use crate::types::{LocatorError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderFeed {
    pub provider: String,
    #[serde(default, alias = "source_url")]
    pub source_url: String,
    #[serde(default)]
    pub trust: ProviderTrust,
    #[serde(default)]
    pub records: Vec<RawRecord>,
}

/// Per-feed record counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedCounts {
    pub provider: String,
    pub total: usize,
    pub kept: usize,
    pub dropped: usize,
}

/// A feed after the unusable-record filter
#[derive(Debug, Clone)]
pub struct UsableFeed {
    pub provider: String,
    pub trust: ProviderTrust,
    pub records: Vec<RawRecord>,
    pub counts: FeedCounts,
}

impl UsableFeed {
    pub fn into_stream(self) -> ProviderStream {
        ProviderStream::raw(self.trust, self.records)
    }
}

impl ProviderFeed {
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| LocatorError::Storage(format!("Cannot read feed {}: {}", path.display(), e)))?;
        let feed: ProviderFeed = serde_json::from_slice(&bytes)
            .map_err(|e| LocatorError::Storage(format!("Invalid feed {}: {}", path.display(), e)))?;
        if feed.provider.trim().is_empty() {
            return Err(LocatorError::Storage(format!(
                "Feed {} has no provider name",
                path.display()
            )));
        }
        debug!(path = %path.display(), provider = %feed.provider, records = feed.records.len(), "Loaded feed");
        Ok(feed)
    }

    /// Stamp provenance and drop records with no name or no locality signal
    pub fn into_usable(self) -> UsableFeed {
        let total = self.records.len();
        let provider = self.provider.trim().to_string();
        let source_url = self.source_url;

        let records: Vec<RawRecord> = self
            .records
            .into_iter()
            .filter(RawRecord::is_usable)
            .map(|mut record| {
                if record.provenance.provider_name.trim().is_empty() {
                    record.provenance.provider_name = provider.clone();
                }
                if record.provenance.source_url.is_empty() {
                    record.provenance.source_url = source_url.clone();
                }
                record
            })
            .collect();

        let counts = FeedCounts {
            provider: provider.clone(),
            total,
            kept: records.len(),
            dropped: total - records.len(),
        };
        info!(
            provider = %counts.provider,
            trust = ?self.trust,
            total = counts.total,
            kept = counts.kept,
            dropped = counts.dropped,
            "Feed filtered"
        );

        UsableFeed {
            provider,
            trust: self.trust,
            records,
            counts,
        }
    }
}

/// Load feeds in the order given; that order is the merge order
pub async fn load_feeds(paths: &[impl AsRef<Path>]) -> Result<Vec<UsableFeed>> {
    let mut feeds = Vec::with_capacity(paths.len());
    for path in paths {
        feeds.push(ProviderFeed::load(path.as_ref()).await?.into_usable());
    }
    Ok(feeds)
}
