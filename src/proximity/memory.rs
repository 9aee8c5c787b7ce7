//! In-memory proximity back end
//!
//! Linear scan over a snapshot of canonical locations. Fine for the data set
//! sizes file mode serves.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{rank, ProximityBackend, ProximityQuery};
use crate::model::{CanonicalLocation, SearchResult};
use crate::types::Result;

/// Shared, replaceable location snapshot
#[derive(Clone, Default)]
pub struct MemoryBackend {
    locations: Arc<RwLock<Vec<CanonicalLocation>>>,
}

impl MemoryBackend {
    pub fn new(locations: Vec<CanonicalLocation>) -> Self {
        Self {
            locations: Arc::new(RwLock::new(locations)),
        }
    }

    /// Swap in a new snapshot; in-progress searches finish on the old one
    pub async fn replace(&self, locations: Vec<CanonicalLocation>) {
        *self.locations.write().await = locations;
    }

    /// Clone of the current snapshot
    pub async fn snapshot(&self) -> Vec<CanonicalLocation> {
        self.locations.read().await.clone()
    }

    /// Clones of the locations matching `predicate`
    pub async fn filter<F>(&self, predicate: F) -> Vec<CanonicalLocation>
    where
        F: Fn(&CanonicalLocation) -> bool,
    {
        self.locations
            .read()
            .await
            .iter()
            .filter(|l| predicate(l))
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.locations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.locations.read().await.is_empty()
    }
}

#[async_trait]
impl ProximityBackend for MemoryBackend {
    async fn nearest(&self, query: &ProximityQuery) -> Result<Vec<SearchResult>> {
        let locations = self.locations.read().await;
        Ok(rank(locations.iter(), query))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
