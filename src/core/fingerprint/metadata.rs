//! Dimensions and capture time.
//!
//! Both are best-effort: a file that can't be probed yields `None`,
//! never an error.

use super::video::FrameExtractor;
use crate::core::media::MediaType;
use chrono::NaiveDateTime;
use exif::{In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

/// EXIF date format: "YYYY:MM:DD HH:MM:SS"
const EXIF_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Pixel or frame dimensions.
///
/// Images are probed from the header without a full decode; videos ask
/// the container through `extractor`. Audio has no dimensions.
pub fn dimensions(
    path: &Path,
    media_type: MediaType,
    extractor: &dyn FrameExtractor,
) -> Option<(u32, u32)> {
    match media_type {
        MediaType::Image => match image::image_dimensions(path) {
            Ok((w, h)) if w > 0 && h > 0 => Some((w, h)),
            Ok(_) => None,
            Err(e) => {
                debug!("Dimension probe failed for {}: {}", path.display(), e);
                None
            }
        },
        MediaType::Video => match extractor.probe(path) {
            Ok(info) => info.dimensions(),
            Err(e) => {
                debug!("Video probe failed for {}: {}", path.display(), e);
                None
            }
        },
        MediaType::Audio | MediaType::Unknown => None,
    }
}

/// Capture time from EXIF `DateTimeOriginal` (falling back to `DateTime`),
/// as unix seconds. Images only.
pub fn capture_time(path: &Path) -> Option<i64> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    let exif = Reader::new().read_from_container(&mut reader).ok()?;

    [Tag::DateTimeOriginal, Tag::DateTime]
        .iter()
        .filter_map(|tag| exif.get_field(*tag, In::PRIMARY))
        .find_map(|field| ascii_value(&field.value).and_then(|s| parse_exif_datetime(&s)))
}

fn ascii_value(value: &Value) -> Option<String> {
    if let Value::Ascii(ref vec) = value {
        let bytes = vec.first()?;
        let text = std::str::from_utf8(bytes).ok()?;
        let trimmed = text.trim_end_matches('\0').trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    None
}

/// Parse an EXIF timestamp, treated as UTC
pub fn parse_exif_datetime(text: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(text.trim(), EXIF_DATE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc().timestamp())
}
