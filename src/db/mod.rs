//! MongoDB access for DB mode
//!
//! Typed collection wrapper plus the document schemas for canonical
//! locations and the geocode cache.

pub mod mongo;
pub mod schemas;

pub use mongo::{IntoIndexes, MongoClient, MongoCollection};
