//! Shared types

pub mod error;

pub use error::{LocatorError, Result};
