//! # Core Module
//!
//! The UI-agnostic media catalog engine.
//!
//! ## Modules
//! - `media` - Media records and extension classification
//! - `fingerprint` - Content hash, perceptual hash and thumbnails per file
//! - `catalog` - SQLite catalog of records and tags
//! - `scanner` - Incremental reconciliation of a root with the catalog
//! - `thumbcache` - Async LRU of display-ready thumbnails
//! - `watcher` - Live change notification for a root

pub mod catalog;
pub mod fingerprint;
pub mod media;
pub mod scanner;
pub mod thumbcache;
pub mod watcher;

// Re-export commonly used types
pub use catalog::{CatalogStore, MediaOrder, MediaQuery, QueryPage};
pub use fingerprint::{Fingerprint, FingerprintConfig, Fingerprinter};
pub use media::{MediaId, MediaRecord, MediaStatus, MediaType};
pub use scanner::{IncrementalScanner, ScanConfig, ScanController, ScanSummary};
pub use thumbcache::{Placeholder, ThumbnailCache, ThumbnailCacheConfig};
