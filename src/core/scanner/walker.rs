//! Directory walking using walkdir.

use super::{modified_secs, MediaFile, ScanConfig};
use crate::core::media::MediaFilter;
use crate::error::ScanError;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Enumerate supported media under `root` in a stable order.
///
/// Hidden directories (unless configured) and `exclude` are pruned
/// entirely. Entries that can't be read are logged and skipped.
pub fn walk_media_files(
    root: &Path,
    config: &ScanConfig,
    exclude: Option<&Path>,
) -> Result<Vec<MediaFile>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::RootNotFound {
            path: root.to_path_buf(),
        });
    }

    let filter = MediaFilter::new().with_hidden(config.include_hidden);

    let mut walker = WalkDir::new(root)
        .follow_links(config.follow_symlinks)
        .sort_by_file_name();
    if let Some(depth) = config.max_depth {
        walker = walker.max_depth(depth);
    }

    let mut files = Vec::new();
    let entries = walker
        .into_iter()
        .filter_entry(|entry| keep_entry(entry, config.include_hidden, exclude));

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Error accessing entry under {}: {}", root.display(), e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if !filter.should_include(path) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                warn!("Failed to read metadata for {}: {}", path.display(), e);
                continue;
            }
        };

        files.push(MediaFile {
            path: path.to_path_buf(),
            size: metadata.len(),
            modified_time_utc: modified_secs(&metadata),
            media_type: filter.classify(path),
        });
    }

    debug!("Found {} media files under {}", files.len(), root.display());
    Ok(files)
}

fn keep_entry(entry: &DirEntry, include_hidden: bool, exclude: Option<&Path>) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    if !entry.file_type().is_dir() {
        return true;
    }
    if exclude.is_some_and(|dir| entry.path() == dir) {
        return false;
    }
    if !include_hidden {
        let hidden = entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false);
        if hidden {
            return false;
        }
    }
    true
}
