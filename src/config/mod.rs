//! # Config Module
//!
//! The persisted settings document shared with UI consumers.
//!
//! The catalog core only reads `last_root_dir` from here. Everything else
//! (hotkeys, theme, grid size, navigation keys) belongs to the consumer and
//! round-trips through this document untouched by the core.
//!
//! Runtime configuration is not global: `ScanConfig`, `FingerprintConfig`
//! and `ThumbnailCacheConfig` are plain values passed to constructors.

use crate::core::media::normalize_path;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Application directory name used under the platform config/data dirs
pub const APP_DIR_NAME: &str = "media-catalog";

const MIN_THUMB_SIZE: u32 = 120;
const MAX_THUMB_SIZE: u32 = 512;

/// User settings, stored as a JSON key-value document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Hotkey -> tag name, both normalized
    hotkeys: BTreeMap<String, String>,
    /// Dark theme enabled
    pub dark_mode: bool,
    /// Grid thumbnail edge in pixels
    thumb_size: u32,
    /// Root of the most recent scan, absolute
    last_root_dir: Option<PathBuf>,
    tagging_prev_key: String,
    tagging_next_key: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            hotkeys: BTreeMap::new(),
            dark_mode: true,
            thumb_size: 320,
            last_root_dir: None,
            tagging_prev_key: "a".to_string(),
            tagging_next_key: "d".to_string(),
        }
    }
}

/// Trim and lowercase a hotkey or tag name
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

impl AppSettings {
    /// Load settings from `path`.
    ///
    /// A missing file yields the defaults. A file that exists but can't be
    /// read or parsed is an error so a broken document is never silently
    /// overwritten.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Settings file {} not found, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let mut settings: AppSettings =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.normalize();
        Ok(settings)
    }

    /// Write settings to `path` as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |reason: String| ConfigError::Write {
            path: path.to_path_buf(),
            reason,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| write_err(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| write_err(e.to_string()))
    }

    /// Default settings file location in the platform config directory
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME)
            .join("settings.json")
    }

    /// Default catalog database location in the platform data directory
    pub fn default_database_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME)
            .join("catalog.db")
    }

    fn normalize(&mut self) {
        let hotkeys = std::mem::take(&mut self.hotkeys);
        self.hotkeys = hotkeys
            .into_iter()
            .map(|(key, tag)| (normalize_key(&key), normalize_key(&tag)))
            .filter(|(key, tag)| !key.is_empty() && !tag.is_empty())
            .collect();
        self.thumb_size = self.thumb_size.clamp(MIN_THUMB_SIZE, MAX_THUMB_SIZE);
    }

    /// All hotkey bindings
    pub fn hotkeys(&self) -> &BTreeMap<String, String> {
        &self.hotkeys
    }

    /// Bind `key` to `tag`. An empty tag removes the binding.
    pub fn set_hotkey(&mut self, key: &str, tag: &str) {
        let key = normalize_key(key);
        if key.is_empty() {
            return;
        }
        let tag = normalize_key(tag);
        if tag.is_empty() {
            self.hotkeys.remove(&key);
        } else {
            self.hotkeys.insert(key, tag);
        }
    }

    /// Remove the binding for `key`
    pub fn remove_hotkey(&mut self, key: &str) {
        self.set_hotkey(key, "");
    }

    /// Tag bound to `key`, if any
    pub fn tag_for_hotkey(&self, key: &str) -> Option<&str> {
        self.hotkeys.get(&normalize_key(key)).map(String::as_str)
    }

    /// Grid thumbnail size, always within 120..=512
    pub fn thumbnail_size(&self) -> u32 {
        self.thumb_size.clamp(MIN_THUMB_SIZE, MAX_THUMB_SIZE)
    }

    pub fn set_thumbnail_size(&mut self, size: u32) {
        self.thumb_size = size.clamp(MIN_THUMB_SIZE, MAX_THUMB_SIZE);
    }

    /// Root of the most recent scan
    pub fn last_root_dir(&self) -> Option<&Path> {
        self.last_root_dir.as_deref()
    }

    /// Remember `path` as the last root, stored absolute and normalized
    pub fn set_last_root_dir(&mut self, path: &Path) {
        self.last_root_dir = Some(normalize_path(path));
    }

    /// Key that moves to the previous item while tagging
    pub fn tagging_prev_key(&self) -> &str {
        if self.tagging_prev_key.trim().is_empty() {
            "a"
        } else {
            &self.tagging_prev_key
        }
    }

    /// Key that moves to the next item while tagging
    pub fn tagging_next_key(&self) -> &str {
        if self.tagging_next_key.trim().is_empty() {
            "d"
        } else {
            &self.tagging_next_key
        }
    }

    pub fn set_tagging_nav_keys(&mut self, prev: &str, next: &str) {
        self.tagging_prev_key = normalize_key(prev);
        self.tagging_next_key = normalize_key(next);
    }
}
