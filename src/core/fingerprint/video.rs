//! Single-frame extraction from video containers.
//!
//! Decoding is delegated to the `ffmpeg`/`ffprobe` executables behind the
//! [`FrameExtractor`] trait so tests (and hosts without ffmpeg) can plug in
//! their own implementation.

use crate::error::FingerprintError;
use image::{ImageFormat, RgbImage};
use serde::Deserialize;
use std::path::Path;
use std::process::{Command, Stdio};

/// Seek offset used when the container does not report a frame count
pub const FALLBACK_OFFSET_SECS: f64 = 0.0;

/// Stream properties reported by the container
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoInfo {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_count: Option<u64>,
    pub frame_rate: Option<f64>,
}

impl VideoInfo {
    /// Width and height, when the container reports both
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.width.zip(self.height).filter(|(w, h)| *w > 0 && *h > 0)
    }

    /// Timestamp of the middle frame (`frame_count / 2`), in seconds
    pub fn middle_frame_offset(&self) -> f64 {
        match (self.frame_count, self.frame_rate) {
            (Some(frames), Some(fps)) if frames > 0 && fps > 0.0 => (frames / 2) as f64 / fps,
            _ => FALLBACK_OFFSET_SECS,
        }
    }
}

/// Source of video metadata and representative frames
pub trait FrameExtractor: Send + Sync {
    /// Read stream dimensions and frame count
    fn probe(&self, path: &Path) -> Result<VideoInfo, FingerprintError>;

    /// Decode the frame at `offset_secs` as RGB
    fn frame_at(&self, path: &Path, offset_secs: f64) -> Result<RgbImage, FingerprintError>;
}

/// Extractor backed by the ffmpeg command-line tools
#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegExtractor {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    fn extraction_err(path: &Path, reason: impl Into<String>) -> FingerprintError {
        FingerprintError::FrameExtraction {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

impl Default for FfmpegExtractor {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FrameExtractor for FfmpegExtractor {
    fn probe(&self, path: &Path) -> Result<VideoInfo, FingerprintError> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-select_streams", "v:0", "-show_entries"])
            .arg("stream=width,height,nb_frames,r_frame_rate")
            .args(["-of", "json"])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Self::extraction_err(path, format!("Failed to run {}: {}", self.ffprobe, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Self::extraction_err(path, format!("ffprobe failed: {}", stderr.trim())));
        }

        parse_probe_output(&output.stdout).map_err(|reason| Self::extraction_err(path, reason))
    }

    fn frame_at(&self, path: &Path, offset_secs: f64) -> Result<RgbImage, FingerprintError> {
        let output = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-ss"])
            .arg(format!("{:.3}", offset_secs))
            .arg("-i")
            .arg(path)
            .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "-"])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Self::extraction_err(path, format!("Failed to run {}: {}", self.ffmpeg, e)))?;

        if !output.status.success() || output.stdout.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Self::extraction_err(path, format!("ffmpeg produced no frame: {}", stderr.trim())));
        }

        image::load_from_memory_with_format(&output.stdout, ImageFormat::Png)
            .map(|frame| frame.to_rgb8())
            .map_err(|e| FingerprintError::decode(path, e))
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    nb_frames: Option<String>,
    r_frame_rate: Option<String>,
}

fn parse_probe_output(stdout: &[u8]) -> Result<VideoInfo, String> {
    let probe: ProbeOutput =
        serde_json::from_slice(stdout).map_err(|e| format!("Unreadable ffprobe output: {}", e))?;
    let stream = probe
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| "No video stream".to_string())?;

    Ok(VideoInfo {
        width: stream.width.filter(|w| *w > 0),
        height: stream.height.filter(|h| *h > 0),
        frame_count: stream
            .nb_frames
            .and_then(|n| n.parse::<u64>().ok())
            .filter(|n| *n > 0),
        frame_rate: stream.r_frame_rate.as_deref().and_then(parse_frame_rate),
    })
}

/// Parse ffprobe's rational frame rate, e.g. `30000/1001`
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (value > 0.0).then_some(value)
}
