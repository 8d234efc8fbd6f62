//! # Folder Watcher Module
//!
//! Monitors a catalog root for media file changes in real-time.
//!
//! ## Features
//! - Reports media files added, modified and removed
//! - Filters to supported media extensions, skipping hidden files
//! - Ignores configured directories (the thumbnails dir, so writing
//!   thumbnails never looks like a change)
//!
//! Debouncing is left to the consumer; `WatcherConfig::debounce_duration`
//! is the suggested quiet period before acting on a burst of events.
//!
//! ## Example
//! ```rust,ignore
//! use media_catalog::core::watcher::{FolderWatcher, WatcherConfig};
//!
//! let (tx, rx) = crossbeam_channel::unbounded();
//! let mut watcher = FolderWatcher::new(WatcherConfig::default(), move |event| {
//!     let _ = tx.send(event);
//! })?;
//! watcher.watch("/media/photos")?;
//!
//! for event in rx {
//!     match event {
//!         WatcherEvent::MediaAdded { path } => println!("New: {:?}", path),
//!         WatcherEvent::MediaRemoved { path } => println!("Deleted: {:?}", path),
//!         _ => {}
//!     }
//! }
//! ```

use crate::core::media::MediaFilter;
use crate::error::WatcherError;
use crate::events::WatcherEvent;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Configuration for the folder watcher
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Quiet period consumers should wait before acting on changes
    pub debounce_duration: Duration,
    /// Whether to watch subdirectories recursively
    pub recursive: bool,
    /// Report hidden files too
    pub include_hidden: bool,
    /// Directories whose contents never produce events
    pub ignored_dirs: Vec<PathBuf>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(500),
            recursive: true,
            include_hidden: false,
            ignored_dirs: Vec::new(),
        }
    }
}

/// Turns raw notify events into media events
#[derive(Debug, Clone)]
struct EventClassifier {
    filter: MediaFilter,
    ignored_dirs: Vec<PathBuf>,
}

impl EventClassifier {
    fn new(config: &WatcherConfig) -> Self {
        Self {
            filter: MediaFilter::new().with_hidden(config.include_hidden),
            ignored_dirs: config.ignored_dirs.clone(),
        }
    }

    fn is_media_file(&self, path: &Path) -> bool {
        if self.ignored_dirs.iter().any(|dir| path.starts_with(dir)) {
            return false;
        }
        self.filter.should_include(path)
    }

    /// Convert a notify event to a WatcherEvent if it concerns media
    fn classify(&self, event: Event) -> Option<WatcherEvent> {
        let path = event
            .paths
            .into_iter()
            .find(|p| self.is_media_file(p))?;

        match event.kind {
            EventKind::Create(_) => Some(WatcherEvent::MediaAdded { path }),
            EventKind::Modify(_) => Some(WatcherEvent::MediaModified { path }),
            EventKind::Remove(_) => Some(WatcherEvent::MediaRemoved { path }),
            _ => None,
        }
    }
}

/// Watches folders for media file changes
pub struct FolderWatcher {
    watcher: RecommendedWatcher,
    config: WatcherConfig,
    watched_paths: Arc<Mutex<HashSet<PathBuf>>>,
}

impl FolderWatcher {
    /// Create a new folder watcher that hands events to `event_handler`
    pub fn new<F>(config: WatcherConfig, event_handler: F) -> Result<Self, WatcherError>
    where
        F: Fn(WatcherEvent) + Send + 'static,
    {
        let watched_paths = Arc::new(Mutex::new(HashSet::new()));
        let classifier = EventClassifier::new(&config);

        let watcher = notify::recommended_watcher(move |result: Result<Event, notify::Error>| {
            match result {
                Ok(event) => {
                    if let Some(watcher_event) = classifier.classify(event) {
                        event_handler(watcher_event);
                    }
                }
                Err(e) => {
                    event_handler(WatcherEvent::Error {
                        message: e.to_string(),
                    });
                }
            }
        })
        .map_err(|e| WatcherError::InitFailed(e.to_string()))?;

        Ok(Self {
            watcher,
            config,
            watched_paths,
        })
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Start watching a directory
    pub fn watch(&mut self, path: impl AsRef<Path>) -> Result<(), WatcherError> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            return Err(WatcherError::PathNotFound(path));
        }

        let mode = if self.config.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };

        self.watcher
            .watch(&path, mode)
            .map_err(|e| WatcherError::WatchFailed {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        if let Ok(mut paths) = self.watched_paths.lock() {
            paths.insert(path);
        }

        Ok(())
    }

    /// Stop watching a directory
    pub fn unwatch(&mut self, path: impl AsRef<Path>) -> Result<(), WatcherError> {
        let path = path.as_ref();

        self.watcher
            .unwatch(path)
            .map_err(|e| WatcherError::UnwatchFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if let Ok(mut paths) = self.watched_paths.lock() {
            paths.remove(path);
        }

        Ok(())
    }

    /// Get list of currently watched paths
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.watched_paths
            .lock()
            .map(|paths| paths.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Check if a path is being watched
    pub fn is_watching(&self, path: impl AsRef<Path>) -> bool {
        self.watched_paths
            .lock()
            .map(|paths| paths.contains(path.as_ref()))
            .unwrap_or(false)
    }
}
