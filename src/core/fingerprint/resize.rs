//! Fast SIMD-accelerated image resizing.
//!
//! Uses fast_image_resize crate which is 5-14x faster than image crate's resize.
//! Automatically uses AVX2/NEON SIMD when available.

use crate::error::FingerprintError;
use fast_image_resize::{images::Image, FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgba, RgbaImage};

/// Largest dimensions fitting inside `max`×`max` with the same aspect ratio.
///
/// Never upscales and never returns a zero edge.
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width.max(1), height.max(1));
    }
    scale_to_fit(width, height, max)
}

/// Dimensions scaled (up or down) so the longer edge equals `target`
pub fn scale_to_fit(width: u32, height: u32, target: u32) -> (u32, u32) {
    let longest = width.max(height).max(1) as f64;
    let scale = target as f64 / longest;
    let w = ((width as f64 * scale).round() as u32).clamp(1, target.max(1));
    let h = ((height as f64 * scale).round() as u32).clamp(1, target.max(1));
    (w, h)
}

fn resize_err(reason: impl ToString) -> FingerprintError {
    FingerprintError::Resize {
        reason: reason.to_string(),
    }
}

/// Fast image resizer using SIMD acceleration
pub struct FastResizer {
    resizer: Resizer,
}

impl FastResizer {
    /// Create a new fast resizer
    pub fn new() -> Self {
        Self {
            resizer: Resizer::new(),
        }
    }

    fn bilinear() -> ResizeOptions {
        ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear))
    }

    /// Resize an image to the specified dimensions and convert to grayscale.
    ///
    /// Used by the perceptual hash: 32×32 luma with a bilinear filter.
    pub fn resize_to_grayscale(
        &mut self,
        image: &DynamicImage,
        width: u32,
        height: u32,
    ) -> Result<GrayImage, FingerprintError> {
        // Grayscale first, resizing one channel is cheaper than three
        let gray = image.to_luma8();

        let (src_width, src_height) = gray.dimensions();
        if src_width == 0 || src_height == 0 {
            return Err(resize_err("Invalid source dimensions"));
        }
        if width == 0 || height == 0 {
            return Err(resize_err("Invalid destination dimensions"));
        }

        let src_image = Image::from_vec_u8(src_width, src_height, gray.into_raw(), PixelType::U8)
            .map_err(|e| resize_err(format!("Failed to create source image: {}", e)))?;
        let mut dst_image = Image::new(width, height, PixelType::U8);

        self.resizer
            .resize(&src_image, &mut dst_image, &Self::bilinear())
            .map_err(|e| resize_err(format!("Resize failed: {}", e)))?;

        let result: ImageBuffer<Luma<u8>, Vec<u8>> =
            ImageBuffer::from_raw(width, height, dst_image.into_vec())
                .ok_or_else(|| resize_err("Failed to create result buffer"))?;

        Ok(result)
    }

    /// Resize RGBA pixels to exactly `width`×`height`
    pub fn resize_rgba(
        &mut self,
        image: &RgbaImage,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, FingerprintError> {
        let (src_width, src_height) = image.dimensions();
        if src_width == 0 || src_height == 0 {
            return Err(resize_err("Invalid source dimensions"));
        }
        if width == 0 || height == 0 {
            return Err(resize_err("Invalid destination dimensions"));
        }
        if (src_width, src_height) == (width, height) {
            return Ok(image.clone());
        }

        let src_image =
            Image::from_vec_u8(src_width, src_height, image.as_raw().clone(), PixelType::U8x4)
                .map_err(|e| resize_err(format!("Failed to create source image: {}", e)))?;
        let mut dst_image = Image::new(width, height, PixelType::U8x4);

        self.resizer
            .resize(&src_image, &mut dst_image, &Self::bilinear())
            .map_err(|e| resize_err(format!("Resize failed: {}", e)))?;

        let result: ImageBuffer<Rgba<u8>, Vec<u8>> =
            ImageBuffer::from_raw(width, height, dst_image.into_vec())
                .ok_or_else(|| resize_err("Failed to create result buffer"))?;

        Ok(result)
    }
}

impl Default for FastResizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn create_test_image(width: u32, height: u32) -> DynamicImage {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            let r = (x * 255 / width.max(1)) as u8;
            let g = (y * 255 / height.max(1)) as u8;
            let b = ((x + y) * 128 / (width + height).max(1)) as u8;
            Rgb([r, g, b])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn grayscale_resize_produces_requested_dimensions() {
        let image = create_test_image(100, 60);
        let resized = FastResizer::new().resize_to_grayscale(&image, 32, 32).unwrap();

        assert_eq!(resized.dimensions(), (32, 32));
    }

    #[test]
    fn rgba_resize_produces_requested_dimensions() {
        let image = create_test_image(200, 100).to_rgba8();
        let resized = FastResizer::new().resize_rgba(&image, 50, 25).unwrap();

        assert_eq!(resized.dimensions(), (50, 25));
    }

    #[test]
    fn zero_destination_is_rejected() {
        let image = create_test_image(10, 10);
        assert!(FastResizer::new().resize_to_grayscale(&image, 0, 8).is_err());
    }

    #[test]
    fn fit_within_preserves_aspect_ratio() {
        assert_eq!(fit_within(4000, 3000, 512), (512, 384));
        assert_eq!(fit_within(1000, 2000, 512), (256, 512));
    }

    #[test]
    fn fit_within_never_upscales() {
        assert_eq!(fit_within(100, 50, 512), (100, 50));
    }

    #[test]
    fn scale_to_fit_upscales_small_sources() {
        assert_eq!(scale_to_fit(100, 50, 200), (200, 100));
        assert_eq!(scale_to_fit(3000, 1, 300), (300, 1));
    }
}
