//! Event type definitions for scan progress and change notification.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// All events emitted by the media catalog core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Incremental scan events
    Scan(ScanEvent),
    /// Thumbnail cache completions
    Thumbnail(ThumbnailEvent),
    /// Catalog mutations that change visible state
    Catalog(CatalogEvent),
    /// File watcher events
    Watcher(WatcherEvent),
}

/// Events from the folder watcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WatcherEvent {
    /// Watcher started monitoring a folder
    Started { path: PathBuf },
    /// Watcher stopped monitoring a folder
    Stopped { path: PathBuf },
    /// A new media file appeared
    MediaAdded { path: PathBuf },
    /// A media file was modified
    MediaModified { path: PathBuf },
    /// A media file was removed
    MediaRemoved { path: PathBuf },
    /// An error occurred
    Error { message: String },
}

/// Events during an incremental scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// Enumeration finished and per-file processing is about to begin
    Started { root: PathBuf, total_files: usize },
    /// Sent after every file
    Progress(ScanProgress),
    /// A file could not be fingerprinted; the scan continues
    FileFailed { path: PathBuf, message: String },
    /// The scan ran to completion
    Finished(ScanSummary),
    /// The scan stopped early; changes applied so far are kept
    Cancelled(ScanSummary),
}

/// Progress information during a scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanProgress {
    /// 1-based index of the file just handled
    pub current: usize,
    /// Number of media files enumerated under the root
    pub total: usize,
    /// File just handled
    pub current_path: PathBuf,
}

/// Counters produced once per scan invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Files looked at, including skipped ones
    pub scanned: usize,
    /// Records written by a full process
    pub added_or_updated: usize,
    /// Files whose fingerprinting failed
    pub errors: usize,
    /// Files skipped because size and mtime were unchanged
    pub skipped: usize,
    /// Files whose thumbnail alone was regenerated
    pub repaired: usize,
    /// Records soft-deleted because their file vanished
    pub marked_deleted: usize,
    /// Whether the scan stopped before handling every file
    pub cancelled: bool,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

/// Completions delivered by the thumbnail cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ThumbnailEvent {
    /// Pixels for `(media_id, size)` are ready
    Loaded {
        media_id: i64,
        size: u32,
        #[serde(skip)]
        pixels: Option<Arc<RgbaImage>>,
    },
    /// The thumbnail could not be produced; show a fallback icon
    Failed {
        media_id: i64,
        size: u32,
        reason: String,
    },
}

/// Catalog mutations that dependent views should refresh on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogEvent {
    /// Records were inserted, updated or soft-deleted
    Changed,
    /// Tag associations changed; tag counts are stale
    TagsChanged,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_serializable() {
        let event = Event::Scan(ScanEvent::Progress(ScanProgress {
            current: 10,
            total: 50,
            current_path: PathBuf::from("/media/clip.mp4"),
        }));

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: Event = serde_json::from_str(&json).unwrap();

        match deserialized {
            Event::Scan(ScanEvent::Progress(p)) => {
                assert_eq!(p.total, 50);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn thumbnail_pixels_are_not_serialized() {
        let event = Event::Thumbnail(ThumbnailEvent::Loaded {
            media_id: 7,
            size: 220,
            pixels: Some(Arc::new(RgbaImage::new(4, 4))),
        });

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: Event = serde_json::from_str(&json).unwrap();

        match deserialized {
            Event::Thumbnail(ThumbnailEvent::Loaded {
                media_id, pixels, ..
            }) => {
                assert_eq!(media_id, 7);
                assert!(pixels.is_none());
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn scan_summary_is_serializable() {
        let summary = ScanSummary {
            scanned: 1000,
            added_or_updated: 12,
            errors: 1,
            ..Default::default()
        };

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"added_or_updated\":12"));
    }
}
