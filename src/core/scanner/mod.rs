//! # Scanner Module
//!
//! Reconciles a directory tree with the catalog.
//!
//! ## Flow
//! 1. Walk the root for supported media (hidden entries and the thumbnails
//!    dir are skipped)
//! 2. Soft-delete catalog rows under the root whose files are gone
//! 3. Load a snapshot of what the catalog already knows about the root
//! 4. Per file: skip, repair the thumbnail, or fully fingerprint
//!
//! Progress, per-file failures and the final [`ScanSummary`] are reported
//! through the event channel. Cancellation is checked between files.
//!
//! ## Example
//! ```rust,ignore
//! use media_catalog::core::scanner::{IncrementalScanner, ScanConfig};
//!
//! let scanner = IncrementalScanner::new(store, fingerprinter, ScanConfig::default());
//! let summary = scanner.scan(Path::new("/photos"), &AtomicBool::new(false))?;
//! ```

mod controller;
mod incremental;
mod walker;

pub use controller::{ScanController, DEFAULT_STOP_TIMEOUT};
pub use incremental::{decide, IncrementalScanner, ScanAction};
pub use walker::walk_media_files;

pub use crate::events::ScanSummary;

use crate::core::media::{normalize_path, MediaType};
use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Name of the thumbnails dir created inside each scanned root
pub const THUMBNAILS_DIR_NAME: &str = "thumbnails";

/// A media file discovered by the walk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    /// Absolute path
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Filesystem mtime, unix seconds
    pub modified_time_utc: Option<i64>,
    pub media_type: MediaType,
}

/// Configuration for scanning
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// Where thumbnails are written; defaults to `<root>/thumbnails`
    pub thumbnails_dir: Option<PathBuf>,
    /// Follow symbolic links
    pub follow_symlinks: bool,
    /// Include hidden files and directories
    pub include_hidden: bool,
    /// Maximum directory depth (None = unlimited)
    pub max_depth: Option<usize>,
}

impl ScanConfig {
    /// Thumbnails dir for `root`, absolute and normalized so the walk can
    /// compare it against entry paths. A relative override resolves
    /// against the working directory.
    pub fn thumbnails_dir_for(&self, root: &Path) -> PathBuf {
        match &self.thumbnails_dir {
            Some(dir) => normalize_path(dir),
            None => normalize_path(&root.join(THUMBNAILS_DIR_NAME)),
        }
    }
}

/// mtime in whole unix seconds
pub(crate) fn modified_secs(metadata: &Metadata) -> Option<i64> {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
}
