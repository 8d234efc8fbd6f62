//! Thumbnail rendering and JPEG output.

use super::decode::FastDecoder;
use super::resize::{fit_within, FastResizer};
use crate::error::FingerprintError;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgb, RgbImage};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Where the thumbnail for a content hash lives.
///
/// Files with identical bytes share one thumbnail.
pub fn thumbnail_path_for(thumbnails_dir: &Path, content_hash: &str) -> PathBuf {
    thumbnails_dir.join(format!("{}.jpg", content_hash))
}

/// Scale `image` to fit within `max_size`×`max_size` and flatten alpha onto black
pub fn render_thumbnail(image: &DynamicImage, max_size: u32) -> Result<RgbImage, FingerprintError> {
    let rgba = image.to_rgba8();
    let (width, height) = fit_within(rgba.width(), rgba.height(), max_size);
    let scaled = FastResizer::new().resize_rgba(&rgba, width, height)?;

    let flattened = RgbImage::from_fn(width, height, |x, y| {
        let [r, g, b, a] = scaled.get_pixel(x, y).0;
        let alpha = a as u16;
        Rgb([
            (r as u16 * alpha / 255) as u8,
            (g as u16 * alpha / 255) as u8,
            (b as u16 * alpha / 255) as u8,
        ])
    });
    Ok(flattened)
}

/// Encode RGB pixels as a JPEG at `dest`, creating parent directories.
///
/// The JPEG is written beside `dest` and renamed into place, so `dest`
/// either holds a complete file or does not exist.
pub fn write_jpeg(image: &RgbImage, dest: &Path, quality: u8) -> Result<(), FingerprintError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| FingerprintError::io(parent, e))?;
    }

    let partial = partial_path(dest);
    let written = encode_jpeg(image, &partial, quality)
        .and_then(|()| fs::rename(&partial, dest).map_err(|e| FingerprintError::io(dest, e)));
    if written.is_err() {
        let _ = fs::remove_file(&partial);
    }
    written
}

fn encode_jpeg(image: &RgbImage, path: &Path, quality: u8) -> Result<(), FingerprintError> {
    let file = File::create(path).map_err(|e| FingerprintError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut writer, quality)
        .encode_image(image)
        .map_err(|e| FingerprintError::decode(path, format!("JPEG encode failed: {}", e)))?;
    writer.flush().map_err(|e| FingerprintError::io(path, e))
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    dest.with_file_name(name)
}

/// Decode an image file and write its thumbnail to `dest`
pub fn generate_thumbnail(
    source: &Path,
    dest: &Path,
    max_size: u32,
    quality: u8,
) -> Result<(), FingerprintError> {
    let image = FastDecoder::decode(source)?;
    write_jpeg(&render_thumbnail(&image, max_size)?, dest, quality)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    #[test]
    fn thumbnail_is_named_by_hash() {
        let path = thumbnail_path_for(Path::new("/media/thumbnails"), "abc123");
        assert_eq!(path, PathBuf::from("/media/thumbnails/abc123.jpg"));
    }

    #[test]
    fn large_image_is_scaled_to_fit() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(2048, 1024));
        let thumb = render_thumbnail(&image, 512).unwrap();
        assert_eq!(thumb.dimensions(), (512, 256));
    }

    #[test]
    fn transparent_pixels_flatten_to_black() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([255, 255, 255, 0])));
        let thumb = render_thumbnail(&image, 512).unwrap();
        assert_eq!(thumb.get_pixel(4, 4), &Rgb([0, 0, 0]));
    }

    #[test]
    fn generate_writes_a_decodable_jpeg() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("wide.png");
        RgbImage::from_pixel(1000, 500, Rgb([200, 30, 30]))
            .save(&source)
            .unwrap();

        let dest = temp.path().join("thumbs").join("x.jpg");
        generate_thumbnail(&source, &dest, 512, 85).unwrap();

        let written = image::open(&dest).unwrap();
        assert_eq!((written.width(), written.height()), (512, 256));
        assert!(!partial_path(&dest).exists());
    }

    #[test]
    fn failed_encode_leaves_nothing_behind() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("thumbs").join("x.jpg");
        // JPEG edges are limited to 65535 pixels
        let too_wide = RgbImage::new(70_000, 1);

        assert!(write_jpeg(&too_wide, &dest, 85).is_err());
        assert!(!dest.exists());
        assert_eq!(fs::read_dir(temp.path().join("thumbs")).unwrap().count(), 0);
    }
}
