//! DB mode: the `locations` collection

use async_trait::async_trait;
use bson::{doc, Document};
use std::sync::Arc;
use tracing::debug;

use super::{sort_listing, ListFilter, LocationStore, StoreMode};
use crate::db::schemas::{LocationDoc, LOCATION_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::model::CanonicalLocation;
use crate::proximity::{MongoProximity, ProximityBackend};
use crate::types::Result;

pub struct MongoLocationStore {
    collection: MongoCollection<LocationDoc>,
}

impl MongoLocationStore {
    /// Open the collection, creating its `2dsphere` and state indexes
    pub async fn open(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            collection: client.collection(LOCATION_COLLECTION).await?,
        })
    }

    pub fn collection(&self) -> &MongoCollection<LocationDoc> {
        &self.collection
    }
}

/// Case-insensitive exact match on state, regex substring over text fields
pub fn list_query(filter: &ListFilter) -> Document {
    let mut query = doc! {};
    if let Some(state) = filter.state_value() {
        query.insert(
            "state",
            doc! { "$regex": format!("^{}$", regex::escape(&state)), "$options": "i" },
        );
    }
    if let Some(text) = &filter.text {
        let pattern = regex::escape(text);
        let clauses: Vec<Document> = ["name", "city", "address", "website"]
            .iter()
            .map(|field| {
                let mut clause = Document::new();
                clause.insert(*field, doc! { "$regex": pattern.as_str(), "$options": "i" });
                clause
            })
            .collect();
        query.insert("$or", clauses);
    }
    query
}

#[async_trait]
impl LocationStore for MongoLocationStore {
    async fn load_all(&self) -> Result<Vec<CanonicalLocation>> {
        let docs = self.collection.find_many(doc! {}).await?;
        Ok(docs.into_iter().map(CanonicalLocation::from).collect())
    }

    async fn upsert_many(&self, locations: &[CanonicalLocation]) -> Result<usize> {
        for location in locations {
            let document = LocationDoc::from(location);
            self.collection
                .upsert(doc! { "_id": location.id.as_str() }, &document)
                .await?;
        }
        debug!(written = locations.len(), "Upserted locations");
        Ok(locations.len())
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<CanonicalLocation>> {
        let docs = self.collection.find_many(list_query(filter)).await?;
        let mut locations: Vec<CanonicalLocation> =
            docs.into_iter().map(CanonicalLocation::from).collect();
        sort_listing(&mut locations);
        Ok(locations)
    }

    async fn count(&self) -> Result<u64> {
        self.collection.count(doc! {}).await
    }

    fn mode(&self) -> StoreMode {
        StoreMode::Database
    }

    fn proximity(&self) -> Arc<dyn ProximityBackend> {
        Arc::new(MongoProximity::new(self.collection.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_empty() {
        assert!(list_query(&ListFilter::default()).is_empty());
    }

    #[test]
    fn test_list_query_state_uses_code() {
        let query = list_query(&ListFilter::new(Some("massachusetts".into()), None));
        let state = query.get_document("state").unwrap();
        assert_eq!(state.get_str("$regex").unwrap(), "^MA$");
        assert_eq!(state.get_str("$options").unwrap(), "i");
    }

    #[test]
    fn test_list_query_text_is_escaped() {
        let query = list_query(&ListFilter::new(None, Some("a.b (farm)".into())));
        let clauses = query.get_array("$or").unwrap();
        assert_eq!(clauses.len(), 4);
        let first = clauses[0].as_document().unwrap().get_document("name").unwrap();
        assert_eq!(first.get_str("$regex").unwrap(), r"a\.b \(farm\)");
    }
}
