//! # Media Module
//!
//! The catalog's data model: what a media file is, how it is classified,
//! and what the store remembers about it.
//!
//! ## Supported Formats
//! - Image: jpg, jpeg, png, webp, bmp, tif, tiff, gif
//! - Video: mp4, mov, avi, mkv, webm, m4v, wmv, 3gp
//! - Audio: m4a, mp3, wav, flac, ogg, aac
//!
//! Classification is by extension only (case-insensitive). Files with any
//! other extension are never inserted into the catalog.

mod filter;

pub use filter::MediaFilter;

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Catalog-assigned record id. Stable once created and never reused.
pub type MediaId = i64;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "tif", "tiff", "gif"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "m4v", "wmv", "3gp"];
const AUDIO_EXTENSIONS: &[&str] = &["m4a", "mp3", "wav", "flac", "ogg", "aac"];

/// Kind of media, derived purely from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Audio,
    Unknown,
}

impl MediaType {
    /// Classify an extension (without the leading dot)
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.to_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            MediaType::Image
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            MediaType::Video
        } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            MediaType::Audio
        } else {
            MediaType::Unknown
        }
    }

    /// Classify a path by its extension
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(MediaType::Unknown)
    }

    /// Name as stored in the catalog
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Unknown => "unknown",
        }
    }

    /// Parse a stored name; anything unrecognized is `Unknown`
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "image" => MediaType::Image,
            "video" => MediaType::Video,
            "audio" => MediaType::Audio,
            _ => MediaType::Unknown,
        }
    }

    /// Check if this type is cataloged at all
    pub fn is_supported(&self) -> bool {
        !matches!(self, MediaType::Unknown)
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a record. Records are soft-deleted, never removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaStatus {
    #[default]
    Active,
    Deleted,
}

impl MediaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaStatus::Active => "active",
            MediaStatus::Deleted => "deleted",
        }
    }

    pub fn parse(name: &str) -> Self {
        if name.eq_ignore_ascii_case("deleted") {
            MediaStatus::Deleted
        } else {
            MediaStatus::Active
        }
    }
}

/// Everything the catalog knows about one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    /// Catalog id, 0 until the record has been stored
    pub id: MediaId,
    /// Absolute path; unique within the catalog
    pub file_path: PathBuf,
    /// Root directory the file was discovered under
    pub root_dir: PathBuf,
    pub file_name: String,
    /// Lowercase hex SHA-256 of the file bytes, empty until computed
    pub content_hash: String,
    /// 16 hex digit DCT hash, images only
    pub perceptual_hash: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub size_bytes: Option<u64>,
    /// Capture time from embedded metadata, unix seconds
    pub captured_time_utc: Option<i64>,
    /// Filesystem mtime, unix seconds
    pub modified_time_utc: Option<i64>,
    pub media_type: MediaType,
    /// Generated thumbnail; `None` for audio and failed extractions
    pub thumbnail_path: Option<PathBuf>,
    pub status: MediaStatus,
    /// Diagnostic set when fingerprinting failed
    pub error: Option<String>,
}

impl MediaRecord {
    /// A record carrying only identity fields for `path` under `root`
    pub fn new(path: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        let file_path = path.into();
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let media_type = MediaType::from_path(&file_path);

        Self {
            id: 0,
            file_path,
            root_dir: root.into(),
            file_name,
            content_hash: String::new(),
            perceptual_hash: String::new(),
            width: None,
            height: None,
            size_bytes: None,
            captured_time_utc: None,
            modified_time_utc: None,
            media_type,
            thumbnail_path: None,
            status: MediaStatus::Active,
            error: None,
        }
    }

    pub fn is_image(&self) -> bool {
        self.media_type == MediaType::Image
    }

    pub fn is_video(&self) -> bool {
        self.media_type == MediaType::Video
    }

    pub fn is_audio(&self) -> bool {
        self.media_type == MediaType::Audio
    }

    pub fn is_active(&self) -> bool {
        self.status == MediaStatus::Active
    }
}

/// Absolute, lexically clean form of `path`.
///
/// Roots and paths are stored and compared as text, so `/photos/`,
/// `/photos/.` and `/photos/albums/..` must all become `/photos`. Symlinks
/// are not resolved.
pub fn normalize_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut clean = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(
                    clean.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                ) {
                    clean.pop();
                }
            }
            other => clean.push(other.as_os_str()),
        }
    }
    clean
}
