//! # Error Module
//!
//! Error types for the media catalog.
//!
//! ## Design Principles
//! - **Never panic** on user data - a bad file becomes an error value
//! - **Include context** - paths, file names, what went wrong
//! - **Per-file failures are data** - the scanner records them on the
//!   catalog row instead of aborting

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Fingerprint error: {0}")]
    Fingerprint(#[from] FingerprintError),

    #[error("Catalog store error: {0}")]
    Store(#[from] StoreError),

    #[error("Thumbnail error: {0}")]
    Thumbnail(#[from] ThumbnailError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Watcher error: {0}")]
    Watcher(#[from] WatcherError),
}

/// Errors raised while walking a root and reconciling it with the catalog
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Root directory not found: {path}")]
    RootNotFound { path: PathBuf },

    #[error("Catalog update failed during scan: {0}")]
    Store(#[from] StoreError),

    #[error("A scan is already running for {path}")]
    AlreadyRunning { path: PathBuf },
}

/// Errors produced by the fingerprint engine for a single file
#[derive(Error, Debug)]
pub enum FingerprintError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Unsupported media type: {path}")]
    Unsupported { path: PathBuf },

    #[error("Failed to extract a video frame from {path}: {reason}")]
    FrameExtraction { path: PathBuf, reason: String },

    #[error("Resize failed: {reason}")]
    Resize { reason: String },
}

impl FingerprintError {
    pub(crate) fn decode(path: &std::path::Path, reason: impl ToString) -> Self {
        FingerprintError::Decode {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        FingerprintError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Errors from the catalog database
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open catalog database at {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("Database query failed: {0}")]
    QueryFailed(String),

    #[error("No media with id {id}")]
    MediaNotFound { id: i64 },

    #[error("Catalog connection at {path} is unusable after a panic in another thread")]
    Poisoned { path: PathBuf },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::QueryFailed(err.to_string())
    }
}

/// Errors while materializing a thumbnail for display
#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("Thumbnail file is missing: {path}")]
    MissingSource { path: PathBuf },

    #[error("Failed to decode thumbnail {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
}

/// Errors reading or writing the settings document
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write settings to {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    #[error("No directory given and no previous scan to resume")]
    NoLastRoot,
}

/// Errors from the folder watcher
#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Failed to initialize watcher: {0}")]
    InitFailed(String),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Failed to watch {path}: {reason}")]
    WatchFailed { path: PathBuf, reason: String },

    #[error("Failed to unwatch {path}: {reason}")]
    UnwatchFailed { path: PathBuf, reason: String },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, CatalogError>;
