//! # Fingerprint Module
//!
//! Derives identity and similarity fingerprints for a single media file.
//!
//! ## Outputs
//! - **Content hash** - SHA-256 of the bytes, streamed in 1 MiB chunks
//! - **Perceptual hash** - 64-bit DCT hash, images only
//! - **Dimensions** - header probe for images, container query for video
//! - **Capture time** - EXIF `DateTimeOriginal`, images only
//! - **Thumbnail** - JPEG named `<content hash>.jpg` in the thumbnails dir
//!
//! All functions are stateless. A corrupt or unreadable file produces a
//! [`FingerprintError`] value; nothing here panics on user data.
//!
//! ## Example
//! ```rust,ignore
//! let fingerprinter = Fingerprinter::new(FingerprintConfig::default());
//! let fp = fingerprinter.fingerprint(path, MediaType::Image, &thumbs_dir)?;
//! println!("{} {}", fp.content_hash, fp.perceptual_hash);
//! ```

mod content;
mod decode;
mod metadata;
mod phash;
mod resize;
mod thumbnail;
mod video;

pub use content::{content_hash, CHUNK_SIZE};
pub use decode::FastDecoder;
pub use metadata::{capture_time, dimensions, parse_exif_datetime};
pub use phash::{format_hash, hamming_distance, parse_hash, perceptual_hash, perceptual_hash_image};
pub use resize::{fit_within, scale_to_fit, FastResizer};
pub use thumbnail::{generate_thumbnail, render_thumbnail, thumbnail_path_for, write_jpeg};
pub use video::{FfmpegExtractor, FrameExtractor, VideoInfo, FALLBACK_OFFSET_SECS};

use crate::core::media::MediaType;
use crate::error::FingerprintError;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Settings for fingerprinting and thumbnail output
#[derive(Debug, Clone)]
pub struct FingerprintConfig {
    /// Longest thumbnail edge in pixels
    pub thumbnail_max_size: u32,
    /// JPEG quality for thumbnails (1-100)
    pub jpeg_quality: u8,
    /// ffmpeg executable used for frame extraction
    pub ffmpeg_program: String,
    /// ffprobe executable used for video metadata
    pub ffprobe_program: String,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            thumbnail_max_size: 512,
            jpeg_quality: 85,
            ffmpeg_program: "ffmpeg".to_string(),
            ffprobe_program: "ffprobe".to_string(),
        }
    }
}

/// Everything derived from one file's content
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fingerprint {
    pub content_hash: String,
    /// Empty for anything but images
    pub perceptual_hash: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub captured_time_utc: Option<i64>,
    /// `None` for audio, or when no thumbnail could be produced
    pub thumbnail_path: Option<PathBuf>,
}

/// The fingerprint engine: config plus a video frame source
#[derive(Clone)]
pub struct Fingerprinter {
    config: FingerprintConfig,
    extractor: Arc<dyn FrameExtractor>,
}

impl Fingerprinter {
    /// Create an engine that extracts video frames with ffmpeg
    pub fn new(config: FingerprintConfig) -> Self {
        let extractor = FfmpegExtractor::new(&config.ffmpeg_program, &config.ffprobe_program);
        Self::with_extractor(config, Arc::new(extractor))
    }

    /// Create an engine with a custom frame source
    pub fn with_extractor(config: FingerprintConfig, extractor: Arc<dyn FrameExtractor>) -> Self {
        Self { config, extractor }
    }

    pub fn config(&self) -> &FingerprintConfig {
        &self.config
    }

    /// Fully fingerprint `path`.
    ///
    /// Fails on unreadable files and undecodable images. A video whose frame
    /// can't be extracted, or a thumbnail that can't be written, is not a
    /// failure: the fingerprint simply carries no thumbnail.
    pub fn fingerprint(
        &self,
        path: &Path,
        media_type: MediaType,
        thumbnails_dir: &Path,
    ) -> Result<Fingerprint, FingerprintError> {
        if !media_type.is_supported() {
            return Err(FingerprintError::Unsupported {
                path: path.to_path_buf(),
            });
        }

        let content_hash = content_hash(path)?;
        let thumb_dest = thumbnail_path_for(thumbnails_dir, &content_hash);
        let mut fingerprint = Fingerprint {
            content_hash,
            ..Default::default()
        };

        match media_type {
            MediaType::Image => {
                let image = FastDecoder::decode(path)?;
                fingerprint.perceptual_hash = perceptual_hash_image(&image)?;
                fingerprint.width = Some(image.width()).filter(|w| *w > 0);
                fingerprint.height = Some(image.height()).filter(|h| *h > 0);
                fingerprint.captured_time_utc = capture_time(path);
                fingerprint.thumbnail_path =
                    self.existing_or_write(path, &thumb_dest, || Ok(image));
            }
            MediaType::Video => {
                let info = self.probe_video(path);
                if let Some((w, h)) = info.as_ref().and_then(VideoInfo::dimensions) {
                    fingerprint.width = Some(w);
                    fingerprint.height = Some(h);
                }
                fingerprint.thumbnail_path = self.existing_or_write(path, &thumb_dest, || {
                    self.middle_frame(path, info.as_ref())
                });
            }
            MediaType::Audio | MediaType::Unknown => {}
        }

        Ok(fingerprint)
    }

    /// Regenerate the thumbnail for already-hashed content.
    ///
    /// Returns the thumbnail path, or `None` for audio or when it could not
    /// be produced. Hashes are not recomputed.
    pub fn repair_thumbnail(
        &self,
        path: &Path,
        media_type: MediaType,
        content_hash: &str,
        thumbnails_dir: &Path,
    ) -> Option<PathBuf> {
        let dest = thumbnail_path_for(thumbnails_dir, content_hash);
        match media_type {
            MediaType::Image => self.existing_or_write(path, &dest, || FastDecoder::decode(path)),
            MediaType::Video => self.existing_or_write(path, &dest, || {
                let info = self.probe_video(path);
                self.middle_frame(path, info.as_ref())
            }),
            MediaType::Audio | MediaType::Unknown => None,
        }
    }

    fn probe_video(&self, path: &Path) -> Option<VideoInfo> {
        match self.extractor.probe(path) {
            Ok(info) => Some(info),
            Err(e) => {
                debug!("Video probe failed for {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Frame at `frame_count / 2`. Without probe data ffmpeg still tries
    /// the fallback offset.
    fn middle_frame(
        &self,
        path: &Path,
        info: Option<&VideoInfo>,
    ) -> Result<DynamicImage, FingerprintError> {
        let offset = info.map_or(FALLBACK_OFFSET_SECS, VideoInfo::middle_frame_offset);
        self.extractor
            .frame_at(path, offset)
            .map(DynamicImage::ImageRgb8)
    }

    /// Reuse a thumbnail already written for the same content, otherwise
    /// render one from the decoded source
    fn existing_or_write<F>(&self, source: &Path, dest: &Path, load: F) -> Option<PathBuf>
    where
        F: FnOnce() -> Result<DynamicImage, FingerprintError>,
    {
        if dest.exists() {
            return Some(dest.to_path_buf());
        }

        let written = load()
            .and_then(|image| render_thumbnail(&image, self.config.thumbnail_max_size))
            .and_then(|thumb| write_jpeg(&thumb, dest, self.config.jpeg_quality));

        match written {
            Ok(()) => Some(dest.to_path_buf()),
            Err(e) => {
                warn!("No thumbnail for {}: {}", source.display(), e);
                None
            }
        }
    }
}

impl std::fmt::Debug for Fingerprinter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fingerprinter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serves a fixed frame for any video and counts ffprobe-style calls
    struct StubExtractor {
        frame: Option<RgbImage>,
        probes: AtomicUsize,
        offsets: Mutex<Vec<f64>>,
    }

    impl FrameExtractor for StubExtractor {
        fn probe(&self, _path: &Path) -> Result<VideoInfo, FingerprintError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            Ok(VideoInfo {
                width: Some(640),
                height: Some(360),
                frame_count: Some(100),
                frame_rate: Some(25.0),
            })
        }

        fn frame_at(&self, path: &Path, offset_secs: f64) -> Result<RgbImage, FingerprintError> {
            self.offsets.lock().unwrap().push(offset_secs);
            self.frame
                .clone()
                .ok_or_else(|| FingerprintError::FrameExtraction {
                    path: path.to_path_buf(),
                    reason: "no frame".to_string(),
                })
        }
    }

    fn stub(frame: Option<RgbImage>) -> Arc<StubExtractor> {
        Arc::new(StubExtractor {
            frame,
            probes: AtomicUsize::new(0),
            offsets: Mutex::new(Vec::new()),
        })
    }

    fn fingerprinter(frame: Option<RgbImage>) -> Fingerprinter {
        Fingerprinter::with_extractor(FingerprintConfig::default(), stub(frame))
    }

    #[test]
    fn config_defaults() {
        let config = FingerprintConfig::default();
        assert_eq!(config.thumbnail_max_size, 512);
        assert_eq!(config.jpeg_quality, 85);
    }

    #[test]
    fn image_gets_every_field() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.png");
        RgbImage::from_fn(800, 600, |x, _| Rgb([(x % 256) as u8, 0, 0]))
            .save(&path)
            .unwrap();
        let thumbs = temp.path().join("thumbnails");

        let fp = fingerprinter(None)
            .fingerprint(&path, MediaType::Image, &thumbs)
            .unwrap();

        assert_eq!(fp.content_hash.len(), 64);
        assert_eq!(fp.perceptual_hash.len(), 16);
        assert_eq!((fp.width, fp.height), (Some(800), Some(600)));
        let thumb = fp.thumbnail_path.unwrap();
        assert_eq!(thumb, thumbs.join(format!("{}.jpg", fp.content_hash)));
        assert!(thumb.exists());
    }

    #[test]
    fn video_has_no_perceptual_hash() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("b.mp4");
        std::fs::write(&path, b"fake video bytes").unwrap();
        let thumbs = temp.path().join("thumbnails");

        let fp = fingerprinter(Some(RgbImage::from_pixel(640, 360, Rgb([0, 90, 0]))))
            .fingerprint(&path, MediaType::Video, &thumbs)
            .unwrap();

        assert!(fp.perceptual_hash.is_empty());
        assert_eq!((fp.width, fp.height), (Some(640), Some(360)));
        assert!(fp.thumbnail_path.unwrap().exists());
    }

    #[test]
    fn video_is_probed_once_and_seeks_to_the_middle() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("b.mp4");
        std::fs::write(&path, b"fake video bytes").unwrap();
        let extractor = stub(Some(RgbImage::from_pixel(64, 36, Rgb([0, 90, 0]))));
        let engine = Fingerprinter::with_extractor(FingerprintConfig::default(), extractor.clone());

        engine
            .fingerprint(&path, MediaType::Video, &temp.path().join("thumbnails"))
            .unwrap();

        assert_eq!(extractor.probes.load(Ordering::SeqCst), 1);
        // 100 frames at 25 fps: frame 50 sits at 2 s
        assert_eq!(*extractor.offsets.lock().unwrap(), vec![2.0]);
    }

    #[test]
    fn failed_frame_extraction_leaves_no_thumbnail() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("b.mp4");
        std::fs::write(&path, b"fake video bytes").unwrap();

        let fp = fingerprinter(None)
            .fingerprint(&path, MediaType::Video, &temp.path().join("thumbnails"))
            .unwrap();

        assert!(!fp.content_hash.is_empty());
        assert!(fp.thumbnail_path.is_none());
    }

    #[test]
    fn audio_gets_hash_only() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("song.mp3");
        std::fs::write(&path, b"ID3 not really").unwrap();

        let fp = fingerprinter(None)
            .fingerprint(&path, MediaType::Audio, &temp.path().join("thumbnails"))
            .unwrap();

        assert!(!fp.content_hash.is_empty());
        assert!(fp.perceptual_hash.is_empty());
        assert!(fp.thumbnail_path.is_none());
        assert!(fp.width.is_none());
    }

    #[test]
    fn corrupt_image_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").unwrap();

        let result = fingerprinter(None).fingerprint(&path, MediaType::Image, temp.path());
        assert!(matches!(result, Err(FingerprintError::Decode { .. })));
    }

    #[test]
    fn repair_rewrites_missing_thumbnail() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.png");
        RgbImage::from_pixel(50, 50, Rgb([10, 20, 30])).save(&path).unwrap();
        let thumbs = temp.path().join("thumbnails");

        let engine = fingerprinter(None);
        let fp = engine.fingerprint(&path, MediaType::Image, &thumbs).unwrap();
        let thumb = fp.thumbnail_path.unwrap();
        std::fs::remove_file(&thumb).unwrap();

        let repaired = engine.repair_thumbnail(&path, MediaType::Image, &fp.content_hash, &thumbs);
        assert_eq!(repaired.as_deref(), Some(thumb.as_path()));
        assert!(thumb.exists());
    }
}
