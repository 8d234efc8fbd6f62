//! Perceptual Hash (pHash) implementation.
//!
//! pHash uses the Discrete Cosine Transform (DCT) to extract
//! frequency information from the image. Near-duplicate images
//! (rescaled, recompressed, slightly brightened) land within a few
//! bits of each other.
//!
//! ## Algorithm
//! 1. Decode and convert to grayscale
//! 2. Resize to 32×32 with a bilinear filter
//! 3. Orthonormal 2-D DCT-II, keeping only the top-left 8×8 block
//! 4. Mean of the 63 coefficients excluding the DC term
//! 5. Bit `i*8 + j` is set iff coefficient `(i, j)` exceeds the mean
//!
//! This is a coarse similarity heuristic. Collisions between visually
//! similar images are expected; it is never an identity guarantee.

use super::decode::FastDecoder;
use super::resize::FastResizer;
use crate::error::FingerprintError;
use image::{DynamicImage, GrayImage};
use std::f64::consts::PI;
use std::path::Path;

const SAMPLE_SIZE: usize = 32;
const BLOCK_SIZE: usize = 8;

/// Compute the 16 hex digit pHash of an image file
pub fn perceptual_hash(path: &Path) -> Result<String, FingerprintError> {
    let image = FastDecoder::decode(path)?;
    perceptual_hash_image(&image)
}

/// Compute the pHash of an already decoded image
pub fn perceptual_hash_image(image: &DynamicImage) -> Result<String, FingerprintError> {
    let sample = FastResizer::new().resize_to_grayscale(
        image,
        SAMPLE_SIZE as u32,
        SAMPLE_SIZE as u32,
    )?;
    Ok(format_hash(hash_bits(&sample)))
}

/// Render a 64-bit hash as zero-padded lowercase hex
pub fn format_hash(hash: u64) -> String {
    format!("{:016x}", hash)
}

/// Parse a stored hash; `None` for empty or malformed values
pub fn parse_hash(hex: &str) -> Option<u64> {
    if hex.is_empty() || hex.len() > 16 {
        return None;
    }
    u64::from_str_radix(hex, 16).ok()
}

/// Number of differing bits between two hashes
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

fn hash_bits(sample: &GrayImage) -> u64 {
    let block = low_frequency_block(sample);

    let sum: f64 = block
        .iter()
        .enumerate()
        .flat_map(|(i, row)| row.iter().enumerate().map(move |(j, c)| (i, j, *c)))
        .filter(|(i, j, _)| !(*i == 0 && *j == 0))
        .map(|(_, _, c)| c)
        .sum();
    let mean = sum / 63.0;

    let mut hash = 0u64;
    for (i, row) in block.iter().enumerate() {
        for (j, coefficient) in row.iter().enumerate() {
            if *coefficient > mean {
                hash |= 1u64 << (i * BLOCK_SIZE + j);
            }
        }
    }
    hash
}

/// Top-left 8×8 of the orthonormal DCT-II of a 32×32 sample.
///
/// `block[i][j]` is vertical frequency `i`, horizontal frequency `j`.
fn low_frequency_block(sample: &GrayImage) -> [[f64; BLOCK_SIZE]; BLOCK_SIZE] {
    let basis = dct_basis();

    // Row pass: horizontal frequencies for every sample row
    let mut rows = [[0.0f64; BLOCK_SIZE]; SAMPLE_SIZE];
    for (y, out) in rows.iter_mut().enumerate() {
        for (v, value) in out.iter_mut().enumerate() {
            *value = (0..SAMPLE_SIZE)
                .map(|x| sample.get_pixel(x as u32, y as u32)[0] as f64 * basis[v][x])
                .sum();
        }
    }

    // Column pass
    let mut block = [[0.0f64; BLOCK_SIZE]; BLOCK_SIZE];
    for (u, out) in block.iter_mut().enumerate() {
        for (v, value) in out.iter_mut().enumerate() {
            *value = (0..SAMPLE_SIZE).map(|y| rows[y][v] * basis[u][y]).sum();
        }
    }
    block
}

fn dct_basis() -> [[f64; SAMPLE_SIZE]; BLOCK_SIZE] {
    let n = SAMPLE_SIZE as f64;
    let mut basis = [[0.0f64; SAMPLE_SIZE]; BLOCK_SIZE];
    for (k, row) in basis.iter_mut().enumerate() {
        let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
        for (x, value) in row.iter_mut().enumerate() {
            *value = scale * ((2.0 * x as f64 + 1.0) * k as f64 * PI / (2.0 * n)).cos();
        }
    }
    basis
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    fn horizontal_gradient(offset: u8) -> DynamicImage {
        let img = ImageBuffer::from_fn(128, 96, |x, _| {
            let v = (x * 200 / 128) as u8 + offset;
            Rgb([v, v, v])
        });
        DynamicImage::ImageRgb8(img)
    }

    fn vertical_gradient() -> DynamicImage {
        let img = ImageBuffer::from_fn(128, 96, |_, y| {
            let v = (y * 200 / 96) as u8;
            Rgb([v, v, v])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn hash_is_sixteen_hex_digits() {
        let hash = perceptual_hash_image(&horizontal_gradient(0)).unwrap();
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hash_of_file_is_deterministic() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("gradient.png");
        horizontal_gradient(0).save(&path).unwrap();

        let first = perceptual_hash(&path).unwrap();
        let second = perceptual_hash(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn brightened_copy_is_a_near_duplicate() {
        let a = parse_hash(&perceptual_hash_image(&horizontal_gradient(0)).unwrap()).unwrap();
        let b = parse_hash(&perceptual_hash_image(&horizontal_gradient(10)).unwrap()).unwrap();
        assert!(hamming_distance(a, b) <= 4);
    }

    #[test]
    fn different_structure_produces_different_hash() {
        let a = perceptual_hash_image(&horizontal_gradient(0)).unwrap();
        let b = perceptual_hash_image(&vertical_gradient()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn dc_basis_row_is_constant() {
        let basis = dct_basis();
        let expected = (1.0 / SAMPLE_SIZE as f64).sqrt();
        assert!(basis[0].iter().all(|v| (v - expected).abs() < 1e-12));
    }

    #[test]
    fn parse_and_distance() {
        assert_eq!(parse_hash("00000000000000ff"), Some(0xff));
        assert_eq!(parse_hash(""), None);
        assert_eq!(parse_hash("xyz"), None);
        assert_eq!(hamming_distance(0b1011, 0b0001), 2);
        assert_eq!(format_hash(0xff), "00000000000000ff");
    }
}
