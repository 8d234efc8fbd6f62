//! Integration tests for incremental scanning against a real catalog.
//!
//! These tests verify end-to-end behavior including:
//! - First scan, unchanged rescan and deletion reconciliation
//! - Revival of a reappearing file under its old id
//! - The size+mtime staleness window

use image::{Rgb, RgbImage};
use media_catalog::core::catalog::{CatalogStore, MediaQuery};
use media_catalog::core::fingerprint::{FingerprintConfig, Fingerprinter, FrameExtractor, VideoInfo};
use media_catalog::core::media::MediaStatus;
use media_catalog::core::scanner::{IncrementalScanner, ScanConfig};
use media_catalog::error::FingerprintError;
use media_catalog::events::{CatalogEvent, Event, EventChannel};
use std::fs::{self, File};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// Stands in for ffmpeg: every video is a 640x360 blue frame
struct StubExtractor;

impl FrameExtractor for StubExtractor {
    fn probe(&self, _path: &Path) -> Result<VideoInfo, FingerprintError> {
        Ok(VideoInfo {
            width: Some(640),
            height: Some(360),
            frame_count: Some(240),
            frame_rate: Some(24.0),
        })
    }

    fn frame_at(&self, _path: &Path, _offset_secs: f64) -> Result<image::RgbImage, FingerprintError> {
        Ok(RgbImage::from_pixel(640, 360, Rgb([20, 40, 220])))
    }
}

fn scanner(store: Arc<CatalogStore>) -> IncrementalScanner {
    let fingerprinter =
        Fingerprinter::with_extractor(FingerprintConfig::default(), Arc::new(StubExtractor));
    IncrementalScanner::new(store, fingerprinter, ScanConfig::default())
}

fn write_photo(path: &Path) {
    RgbImage::from_fn(320, 240, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]))
        .save(path)
        .unwrap();
}

fn scan(scanner: &IncrementalScanner, root: &Path) -> media_catalog::events::ScanSummary {
    scanner.scan(root, &AtomicBool::new(false)).unwrap()
}

#[test]
fn photo_and_video_lifecycle() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write_photo(&root.join("a.jpg"));
    fs::write(root.join("b.mp4"), vec![7u8; 2048]).unwrap();
    let (sender, receiver) = EventChannel::new();
    let store = Arc::new(
        CatalogStore::open(&root.join("catalog.db"))
            .unwrap()
            .with_events(sender),
    );
    let scanner = scanner(store.clone());

    // First scan: both files fingerprinted
    let first = scan(&scanner, root);
    assert_eq!(first.added_or_updated, 2);
    assert_eq!(first.errors, 0);

    let a = store.get_by_path(&root.join("a.jpg")).unwrap().unwrap();
    let b = store.get_by_path(&root.join("b.mp4")).unwrap().unwrap();
    assert_eq!(a.perceptual_hash.len(), 16);
    assert!(b.perceptual_hash.is_empty());
    assert_eq!((b.width, b.height), (Some(640), Some(360)));
    assert!(a.thumbnail_path.as_ref().unwrap().exists());
    assert!(b.thumbnail_path.as_ref().unwrap().exists());

    // Unchanged rescan: nothing written
    receiver.try_iter().count();
    let second = scan(&scanner, root);
    assert_eq!(second.scanned, 2);
    assert_eq!(second.added_or_updated, 0);
    let writes = receiver
        .try_iter()
        .filter(|e| matches!(e, Event::Catalog(CatalogEvent::Changed)))
        .count();
    assert_eq!(writes, 0);

    // Delete the video
    fs::remove_file(root.join("b.mp4")).unwrap();
    let third = scan(&scanner, root);
    assert_eq!(third.marked_deleted, 1);

    let page = store.query(&MediaQuery::default()).unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(page.records[0].id, a.id);

    let gone = store.get_by_id(b.id).unwrap().unwrap();
    assert_eq!(gone.status, MediaStatus::Deleted);
    assert_eq!(gone.content_hash, b.content_hash);
}

#[test]
fn reappearing_file_keeps_id_and_tags() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let photo = root.join("a.jpg");
    write_photo(&photo);
    let store = Arc::new(CatalogStore::open_in_memory().unwrap());
    let scanner = scanner(store.clone());

    scan(&scanner, root);
    let id = store.get_by_path(&photo).unwrap().unwrap().id;
    store.add_tags(id, &["Beach", " sunset "]).unwrap();

    let saved = root.join("saved.bin");
    fs::rename(&photo, &saved).unwrap();
    scan(&scanner, root);
    assert!(!store.get_by_id(id).unwrap().unwrap().is_active());

    fs::rename(&saved, &photo).unwrap();
    scan(&scanner, root);

    let revived = store.get_by_path(&photo).unwrap().unwrap();
    assert_eq!(revived.id, id);
    assert!(revived.is_active());
    assert_eq!(store.tags_for(id).unwrap(), vec!["beach", "sunset"]);
}

#[test]
fn same_size_and_mtime_is_not_rehashed() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let song = root.join("song.mp3");
    fs::write(&song, b"AAAAAAAAAAAAAAAA").unwrap();
    let pinned = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    File::options()
        .write(true)
        .open(&song)
        .unwrap()
        .set_modified(pinned)
        .unwrap();

    let store = Arc::new(CatalogStore::open_in_memory().unwrap());
    let scanner = scanner(store.clone());
    scan(&scanner, root);
    let before = store.get_by_path(&song).unwrap().unwrap().content_hash;

    // Same length, different bytes, mtime restored
    fs::write(&song, b"BBBBBBBBBBBBBBBB").unwrap();
    File::options()
        .write(true)
        .open(&song)
        .unwrap()
        .set_modified(pinned)
        .unwrap();

    let summary = scan(&scanner, root);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.added_or_updated, 0);
    assert_eq!(store.get_by_path(&song).unwrap().unwrap().content_hash, before);
}

#[test]
fn unknown_extensions_are_never_cataloged() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("notes.txt"), b"hello").unwrap();
    fs::write(temp.path().join("archive.zip"), b"PK").unwrap();
    let store = Arc::new(CatalogStore::open_in_memory().unwrap());

    let summary = scan(&scanner(store.clone()), temp.path());

    assert_eq!(summary.scanned, 0);
    assert_eq!(store.active_count(None).unwrap(), 0);
}

#[test]
fn identical_content_shares_a_thumbnail() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write_photo(&root.join("a.jpg"));
    fs::copy(root.join("a.jpg"), root.join("copy.jpg")).unwrap();
    let store = Arc::new(CatalogStore::open_in_memory().unwrap());

    scan(&scanner(store.clone()), root);

    let a = store.get_by_path(&root.join("a.jpg")).unwrap().unwrap();
    let copy = store.get_by_path(&root.join("copy.jpg")).unwrap().unwrap();
    assert_eq!(a.content_hash, copy.content_hash);
    assert_eq!(a.thumbnail_path, copy.thumbnail_path);

    let groups = store.exact_duplicates(None).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].records.len(), 2);
}
