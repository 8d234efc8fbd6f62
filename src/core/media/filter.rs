//! File filtering for directory walks.

use super::MediaType;
use std::path::Path;

/// Decides which walked files are media the catalog should track
#[derive(Debug, Clone, Default)]
pub struct MediaFilter {
    /// Whether to include hidden files
    include_hidden: bool,
}

impl MediaFilter {
    /// Create a filter accepting every supported media extension
    pub fn new() -> Self {
        Self::default()
    }

    /// Include hidden files (starting with .)
    pub fn with_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Check if a file should be included
    pub fn should_include(&self, path: &Path) -> bool {
        if !self.include_hidden {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.starts_with('.') {
                    return false;
                }
            }
        }

        self.classify(path).is_supported()
    }

    /// Get the media type for a path
    pub fn classify(&self, path: &Path) -> MediaType {
        MediaType::from_path(path)
    }
}
