//! Pixel work for the thumbnail cache: grid cells and placeholders.

use crate::core::fingerprint::{scale_to_fit, FastDecoder, FastResizer};
use crate::error::ThumbnailError;
use image::{imageops, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fill behind letterboxed thumbnails
pub const CANVAS_FILL: Rgba<u8> = Rgba([15, 23, 42, 255]);

const LOADING_FILL: Rgba<u8> = Rgba([50, 50, 55, 255]);
const LOADING_BAR: Rgba<u8> = Rgba([80, 80, 90, 255]);
const LOADING_BAR_HEIGHT: u32 = 6;
const AUDIO_FILL: Rgba<u8> = Rgba([31, 41, 55, 255]);
const AUDIO_GLYPH: Rgba<u8> = Rgba([229, 231, 235, 255]);

/// Stand-in pixels shown until a real thumbnail arrives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Placeholder {
    /// A load may be in flight
    Loading,
    /// The item has no visual thumbnail
    Audio,
}

/// Decode `path` and center it on a `size`×`size` canvas.
///
/// The image is scaled up or down so its longer edge equals `size`, which
/// gives every cell in a grid the same bounding box.
pub fn render_cell(path: &Path, size: u32) -> Result<RgbaImage, ThumbnailError> {
    let size = size.max(1);
    let decode_err = |reason: String| ThumbnailError::Decode {
        path: path.to_path_buf(),
        reason,
    };

    let source = FastDecoder::decode(path)
        .map_err(|e| decode_err(e.to_string()))?
        .to_rgba8();
    let (width, height) = scale_to_fit(source.width(), source.height(), size);
    let scaled = FastResizer::new()
        .resize_rgba(&source, width, height)
        .map_err(|e| decode_err(e.to_string()))?;

    let mut canvas = RgbaImage::from_pixel(size, size, CANVAS_FILL);
    let x = (size - width) / 2;
    let y = (size - height) / 2;
    imageops::overlay(&mut canvas, &scaled, x as i64, y as i64);
    Ok(canvas)
}

/// Draw a placeholder of the given kind
pub fn render_placeholder(kind: Placeholder, size: u32) -> RgbaImage {
    let size = size.max(1);
    match kind {
        Placeholder::Loading => {
            let mut pixels = RgbaImage::from_pixel(size, size, LOADING_FILL);
            let bar_width = size / 2;
            let bar_height = LOADING_BAR_HEIGHT.min(size);
            fill_rect(
                &mut pixels,
                (size - bar_width) / 2,
                (size - bar_height) / 2,
                bar_width,
                bar_height,
                LOADING_BAR,
            );
            pixels
        }
        Placeholder::Audio => {
            // Three equalizer bars
            let mut pixels = RgbaImage::from_pixel(size, size, AUDIO_FILL);
            let bar_width = (size / 12).max(1);
            let gap = bar_width;
            let left = (size - (3 * bar_width + 2 * gap).min(size)) / 2;
            for (i, fraction) in [3u32, 5, 4].into_iter().enumerate() {
                let bar_height = size * fraction / 10;
                let x = left + i as u32 * (bar_width + gap);
                fill_rect(
                    &mut pixels,
                    x,
                    (size - bar_height) / 2,
                    bar_width,
                    bar_height,
                    AUDIO_GLYPH,
                );
            }
            pixels
        }
    }
}

fn fill_rect(image: &mut RgbaImage, x: u32, y: u32, width: u32, height: u32, color: Rgba<u8>) {
    let x_end = (x + width).min(image.width());
    let y_end = (y + height).min(image.height());
    for py in y..y_end {
        for px in x..x_end {
            image.put_pixel(px, py, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    #[test]
    fn wide_image_is_letterboxed() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("wide.png");
        RgbImage::from_pixel(200, 100, Rgb([255, 255, 255]))
            .save(&path)
            .unwrap();

        let cell = render_cell(&path, 100).unwrap();

        assert_eq!(cell.dimensions(), (100, 100));
        assert_eq!(*cell.get_pixel(50, 5), CANVAS_FILL);
        assert!(cell.get_pixel(50, 50)[0] > 250);
    }

    #[test]
    fn small_image_is_scaled_up() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tiny.png");
        RgbImage::from_pixel(10, 10, Rgb([0, 200, 0])).save(&path).unwrap();

        let cell = render_cell(&path, 64).unwrap();

        assert_eq!(cell.dimensions(), (64, 64));
        let pixel = cell.get_pixel(1, 1);
        assert!(pixel[1] > 190 && pixel[0] < 10);
    }

    #[test]
    fn undecodable_file_is_a_decode_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("junk.jpg");
        std::fs::write(&path, b"junk").unwrap();

        assert!(matches!(
            render_cell(&path, 64),
            Err(ThumbnailError::Decode { .. })
        ));
    }

    #[test]
    fn loading_placeholder_has_centered_bar() {
        let pixels = render_placeholder(Placeholder::Loading, 100);
        assert_eq!(pixels.dimensions(), (100, 100));
        assert_eq!(*pixels.get_pixel(0, 0), LOADING_FILL);
        assert_eq!(*pixels.get_pixel(50, 50), LOADING_BAR);
        assert_eq!(*pixels.get_pixel(10, 50), LOADING_FILL);
    }

    #[test]
    fn placeholders_differ_by_kind() {
        let loading = render_placeholder(Placeholder::Loading, 48);
        let audio = render_placeholder(Placeholder::Audio, 48);
        assert_ne!(loading, audio);
        assert_eq!(*audio.get_pixel(0, 0), AUDIO_FILL);
    }

    #[test]
    fn tiny_placeholders_do_not_panic() {
        assert_eq!(render_placeholder(Placeholder::Loading, 1).dimensions(), (1, 1));
        assert_eq!(render_placeholder(Placeholder::Audio, 2).dimensions(), (2, 2));
    }
}
