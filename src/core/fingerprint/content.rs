//! Cryptographic content hash.

use crate::error::FingerprintError;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Bytes fed to the hasher per read
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Lowercase hex SHA-256 of the file's bytes.
///
/// Streams the file in 1 MiB chunks so memory use is flat regardless of
/// file size.
pub fn content_hash(path: &Path) -> Result<String, FingerprintError> {
    let file = File::open(path).map_err(|e| FingerprintError::io(path, e))?;
    let mut reader = BufReader::with_capacity(CHUNK_SIZE, file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let count = reader
            .read(&mut buffer)
            .map_err(|e| FingerprintError::io(path, e))?;
        if count == 0 {
            break;
        }
        hasher.update(&buffer[..count]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn hashes_known_content() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("abc.bin");
        std::fs::write(&path, b"abc").unwrap();

        assert_eq!(
            content_hash(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn empty_file_hashes_to_empty_digest() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("empty.bin");
        std::fs::write(&path, b"").unwrap();

        assert_eq!(
            content_hash(&path).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn multi_chunk_file_matches_single_shot_digest() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("big.bin");
        let data: Vec<u8> = (0..(CHUNK_SIZE * 2 + 17)).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        let expected = hex::encode(Sha256::digest(&data));
        assert_eq!(content_hash(&path).unwrap(), expected);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = content_hash(Path::new("/nonexistent/file.jpg"));
        assert!(matches!(result, Err(FingerprintError::Io { .. })));
    }
}
