//! # Catalog Module
//!
//! The durable store of media records and their tags, on SQLite.
//!
//! ## Guarantees
//! - `file_path` is unique; `id` is assigned once and never reused
//! - Records are soft-deleted (`status = 'deleted'`) and keep their
//!   fields and tags; every default query implies `status = 'active'`
//! - Tag names are trimmed and lower-cased before storage or matching
//! - Mutations that change visible state emit a [`CatalogEvent`]
//!
//! ## Revive policy
//! A soft-deleted path that shows up again is revived in place: the same
//! row, the same id, its tags intact, every derived field replaced by the
//! fresh fingerprint. A path always maps to exactly one row, so an id is
//! never handed to a different path. The catalog can't tell "same file
//! restored" from "different file at the same path"; both keep the id.
//!
//! ## Concurrency
//! One connection behind a mutex, opened in WAL mode with
//! `synchronous=NORMAL`. Concurrent writers are serialized here, not by
//! callers.
//!
//! [`CatalogEvent`]: crate::events::CatalogEvent

mod query;
mod similarity;
mod store;
mod tags;

pub use query::{MediaOrder, MediaQuery, QueryPage};
pub use similarity::{DuplicateGroup, SimilarMatch};
pub use store::{CatalogStore, ScanSnapshot, SnapshotEntry};
pub use tags::TagCount;

/// Trim and lower-case a tag name
pub fn normalize_tag(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Normalize a tag list, dropping empties and duplicates (first wins)
pub fn normalize_tags<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names
        .iter()
        .map(|name| normalize_tag(name.as_ref()))
        .filter(|name| !name.is_empty() && seen.insert(name.clone()))
        .collect()
}
