//! Incremental scan: reconcile one root with the catalog.

use super::{walk_media_files, MediaFile, ScanConfig};
use crate::core::catalog::{CatalogStore, SnapshotEntry};
use crate::core::fingerprint::{Fingerprint, Fingerprinter};
use crate::core::media::{normalize_path, MediaRecord, MediaType};
use crate::error::{FingerprintError, ScanError};
use crate::events::{null_sender, Event, EventSender, ScanEvent, ScanProgress, ScanSummary};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// What to do with one walked file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanAction {
    /// Unchanged and complete
    Skip,
    /// Unchanged, but the thumbnail is missing on disk
    RepairThumbnail { content_hash: String },
    /// New, changed, or previously failed
    FullProcess,
}

/// Decide how to handle `file` given what the catalog already knows.
///
/// A file counts as unchanged when size and mtime (whole seconds) both
/// match and a content hash was recorded. Audio never has a thumbnail, so
/// an unchanged audio file is always skipped.
pub fn decide(file: &MediaFile, previous: Option<&SnapshotEntry>) -> ScanAction {
    let Some(prev) = previous else {
        return ScanAction::FullProcess;
    };

    let unchanged = prev.size_bytes == Some(file.size)
        && prev.modified_time_utc == file.modified_time_utc
        && !prev.content_hash.is_empty();
    if !unchanged {
        return ScanAction::FullProcess;
    }

    let thumbnail_present = prev.thumbnail_path.as_deref().is_some_and(Path::exists);
    if thumbnail_present || file.media_type == MediaType::Audio {
        ScanAction::Skip
    } else {
        ScanAction::RepairThumbnail {
            content_hash: prev.content_hash.clone(),
        }
    }
}

/// Runs incremental scans against a shared catalog
pub struct IncrementalScanner {
    store: Arc<CatalogStore>,
    fingerprinter: Fingerprinter,
    config: ScanConfig,
    events: EventSender,
}

impl IncrementalScanner {
    pub fn new(store: Arc<CatalogStore>, fingerprinter: Fingerprinter, config: ScanConfig) -> Self {
        Self {
            store,
            fingerprinter,
            config,
            events: null_sender(),
        }
    }

    /// Report scan events to `sender`
    pub fn with_events(mut self, sender: EventSender) -> Self {
        self.events = sender;
        self
    }

    pub fn store(&self) -> &Arc<CatalogStore> {
        &self.store
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan `root`, stopping early once `cancel` is set.
    ///
    /// Per-file failures are counted and recorded on the catalog row; only
    /// a missing root or a failure to read or reconcile the catalog aborts.
    pub fn scan(&self, root: &Path, cancel: &AtomicBool) -> Result<ScanSummary, ScanError> {
        let started = Instant::now();
        let root = normalize_path(root);
        let thumbnails_dir = self.config.thumbnails_dir_for(&root);

        let files = walk_media_files(&root, &self.config, Some(&thumbnails_dir))?;
        let total = files.len();
        info!("Scanning {} ({} media files)", root.display(), total);

        let mut summary = ScanSummary::default();
        let present: Vec<PathBuf> = files.iter().map(|f| f.path.clone()).collect();
        summary.marked_deleted = self.store.mark_missing(&present, &root)?;
        let snapshot = self.store.snapshot_for_root(&root)?;

        self.events.send(Event::Scan(ScanEvent::Started {
            root: root.clone(),
            total_files: total,
        }));

        for (index, file) in files.iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                summary.cancelled = true;
                break;
            }

            let previous = snapshot.get(&file.path);
            match decide(file, previous) {
                ScanAction::Skip => summary.skipped += 1,
                ScanAction::RepairThumbnail { content_hash } => {
                    let stored = previous.and_then(|p| p.thumbnail_path.as_deref());
                    self.repair(file, &content_hash, stored, &thumbnails_dir);
                    summary.repaired += 1;
                }
                ScanAction::FullProcess => self.process(file, &root, &thumbnails_dir, &mut summary),
            }
            summary.scanned += 1;

            self.events.send(Event::Scan(ScanEvent::Progress(ScanProgress {
                current: index + 1,
                total,
                current_path: file.path.clone(),
            })));
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        if summary.cancelled {
            info!("Scan of {} cancelled after {} files", root.display(), summary.scanned);
            self.events.send(Event::Scan(ScanEvent::Cancelled(summary.clone())));
        } else {
            info!(
                "Scan of {} finished: {} scanned, {} added or updated, {} errors",
                root.display(),
                summary.scanned,
                summary.added_or_updated,
                summary.errors
            );
            self.events.send(Event::Scan(ScanEvent::Finished(summary.clone())));
        }

        Ok(summary)
    }

    /// Regenerate a missing thumbnail. The catalog is only written when the
    /// path differs from the stored one.
    fn repair(
        &self,
        file: &MediaFile,
        content_hash: &str,
        stored: Option<&Path>,
        thumbnails_dir: &Path,
    ) {
        debug!("Repairing thumbnail for {}", file.path.display());
        let thumbnail = self.fingerprinter.repair_thumbnail(
            &file.path,
            file.media_type,
            content_hash,
            thumbnails_dir,
        );

        if let Some(thumbnail) = thumbnail.filter(|t| Some(t.as_path()) != stored) {
            if let Err(e) = self.store.update_thumbnail_path(&file.path, Some(&thumbnail)) {
                warn!("Failed to record thumbnail for {}: {}", file.path.display(), e);
            }
        }
    }

    fn process(
        &self,
        file: &MediaFile,
        root: &Path,
        thumbnails_dir: &Path,
        summary: &mut ScanSummary,
    ) {
        let result = self
            .fingerprinter
            .fingerprint(&file.path, file.media_type, thumbnails_dir);

        match result {
            Ok(fingerprint) => {
                let record = fingerprinted_record(file, root, fingerprint);
                match self.store.upsert(&record) {
                    Ok(_) => summary.added_or_updated += 1,
                    Err(e) => {
                        warn!("Failed to store {}: {}", file.path.display(), e);
                        summary.errors += 1;
                    }
                }
            }
            Err(e) => {
                self.record_failure(file, root, &e);
                summary.errors += 1;
            }
        }
    }

    /// Store an identity-only record carrying the error. No size or mtime
    /// is kept, so the next scan retries the file.
    fn record_failure(&self, file: &MediaFile, root: &Path, error: &FingerprintError) {
        warn!("Failed to fingerprint {}: {}", file.path.display(), error);
        self.events.send(Event::Scan(ScanEvent::FileFailed {
            path: file.path.clone(),
            message: error.to_string(),
        }));

        let mut record = MediaRecord::new(&file.path, root);
        record.media_type = file.media_type;
        record.error = Some(error.to_string());
        if let Err(e) = self.store.upsert(&record) {
            warn!("Failed to record error for {}: {}", file.path.display(), e);
        }
    }
}

impl std::fmt::Debug for IncrementalScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncrementalScanner")
            .field("store", &self.store)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn fingerprinted_record(file: &MediaFile, root: &Path, fingerprint: Fingerprint) -> MediaRecord {
    let mut record = MediaRecord::new(&file.path, root);
    record.media_type = file.media_type;
    record.content_hash = fingerprint.content_hash;
    record.perceptual_hash = fingerprint.perceptual_hash;
    record.width = fingerprint.width;
    record.height = fingerprint.height;
    record.size_bytes = Some(file.size);
    record.captured_time_utc = fingerprint.captured_time_utc;
    record.modified_time_utc = file.modified_time_utc;
    record.thumbnail_path = fingerprint.thumbnail_path;
    record
}
