//! Deterministic location identity
//!
//! `id = slug(name) + "-" + postal_code`. The same place reported by two
//! providers with the same name and postal code gets the same id.

use sha2::{Digest, Sha256};

use crate::address::{extract, pieces_for};
use crate::model::AddressSource;

/// Lower-case, ASCII alphanumeric runs joined by single hyphens
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

/// Id from a name and an optional 5-digit postal code
///
/// A name with no ASCII letters or digits falls back to a hash of the name.
pub fn location_id(name: &str, postal_code: Option<&str>) -> String {
    let mut slug = slugify(name);
    if slug.is_empty() {
        let digest = Sha256::digest(name.trim().as_bytes());
        slug = format!("loc-{}", &hex::encode(digest)[..12]);
    }
    match postal_code {
        Some(zip) => format!("{}-{}", slug, zip),
        None => slug,
    }
}

/// Id for any record
///
/// Uses the record's own postal code when it is a valid 4/5-digit code,
/// otherwise the one extracted from its address text.
pub fn id_for<R: AddressSource + ?Sized>(record: &R) -> String {
    let postal = record
        .postal_code()
        .and_then(extract::pad_postal_code)
        .or_else(|| pieces_for(record).postal_code);
    location_id(record.name(), postal.as_deref())
}
