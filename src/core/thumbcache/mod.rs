//! # Thumbnail Cache Module
//!
//! Bounded in-memory LRU of grid-ready thumbnail pixels, filled by a pool
//! of decode workers.
//!
//! ## States per `(media id, size)`
//! - **absent** - nothing known; `get_sync` shows a placeholder
//! - **pending** - a decode job is queued or running
//! - **cached** - pixels are in the LRU
//! - **failed** - a `ThumbnailEvent::Failed` was sent; the next request retries
//!
//! ## Threading
//! All cache state sits behind one mutex. Workers only decode; their results
//! travel over a channel to a single completion thread, which is the only
//! place results are applied. A result whose request was cancelled (its id
//! no longer pending under the same ticket) is dropped without a notification.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//! let cache = ThumbnailCache::new(ThumbnailCacheConfig::default(), sender);
//! cache.request_async(record.id, record.thumbnail_path.as_deref(), 220);
//! // show cache.get_sync(...) until a ThumbnailEvent arrives on `receiver`
//! ```

mod render;

pub use render::{render_cell, render_placeholder, Placeholder, CANVAS_FILL};

use crate::core::media::MediaId;
use crate::error::ThumbnailError;
use crate::events::{Event, EventSender, ThumbnailEvent};
use crossbeam_channel::{unbounded, Receiver, Sender};
use image::RgbaImage;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Default number of cached thumbnails
pub const DEFAULT_CAPACITY: usize = 500;

type CacheKey = (MediaId, u32);

/// Settings for the thumbnail cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailCacheConfig {
    /// Maximum cached `(id, size)` entries
    pub capacity: usize,
    /// Decode worker threads
    pub workers: usize,
}

impl Default for ThumbnailCacheConfig {
    fn default() -> Self {
        let parallelism = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);
        Self {
            capacity: DEFAULT_CAPACITY,
            workers: (parallelism / 2).max(2),
        }
    }
}

/// Cache counters since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups answered from the LRU
    pub hits: u64,
    /// Lookups that found nothing cached
    pub misses: u64,
    /// Decode results applied to the cache
    pub jobs_run: u64,
    /// Entries pushed out by capacity
    pub evictions: u64,
}

struct Job {
    media_id: MediaId,
    size: u32,
    path: PathBuf,
    ticket: u64,
}

struct JobResult {
    job: Job,
    outcome: Result<RgbaImage, ThumbnailError>,
}

struct CacheState {
    entries: LruCache<CacheKey, Arc<RgbaImage>>,
    /// In-flight request per media id, tagged with its ticket
    pending: HashMap<MediaId, u64>,
    next_ticket: u64,
    stats: CacheStats,
    placeholders: HashMap<(Placeholder, u32), Arc<RgbaImage>>,
}

struct Shared {
    state: Mutex<CacheState>,
    events: EventSender,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The single entry point through which decode results reach the cache
    fn apply(&self, result: JobResult) {
        let JobResult { job, outcome } = result;
        let mut state = self.lock();

        if state.pending.get(&job.media_id) != Some(&job.ticket) {
            debug!("Discarding cancelled thumbnail for media {}", job.media_id);
            return;
        }
        state.pending.remove(&job.media_id);
        state.stats.jobs_run += 1;

        let event = match outcome {
            Ok(pixels) => {
                let key = (job.media_id, job.size);
                let pixels = Arc::new(pixels);
                if let Some((evicted, _)) = state.entries.push(key, Arc::clone(&pixels)) {
                    if evicted != key {
                        state.stats.evictions += 1;
                    }
                }
                ThumbnailEvent::Loaded {
                    media_id: job.media_id,
                    size: job.size,
                    pixels: Some(pixels),
                }
            }
            Err(e) => {
                warn!("Thumbnail load failed for media {}: {}", job.media_id, e);
                ThumbnailEvent::Failed {
                    media_id: job.media_id,
                    size: job.size,
                    reason: e.to_string(),
                }
            }
        };
        drop(state);

        self.events.send(Event::Thumbnail(event));
    }
}

/// Async LRU thumbnail cache
pub struct ThumbnailCache {
    shared: Arc<Shared>,
    jobs: Option<Sender<Job>>,
    /// Kept so `cancel_all` can drain jobs no worker has started
    queued: Receiver<Job>,
    workers: Vec<JoinHandle<()>>,
    completion: Option<JoinHandle<()>>,
}

impl ThumbnailCache {
    /// Create a cache and start its worker pool. Completions are reported
    /// on `events`.
    pub fn new(config: ThumbnailCacheConfig, events: EventSender) -> Self {
        Self::build(config.capacity, config.workers.max(1), events)
    }

    fn build(capacity: usize, worker_count: usize, events: EventSender) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        let shared = Arc::new(Shared {
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                pending: HashMap::new(),
                next_ticket: 0,
                stats: CacheStats::default(),
                placeholders: HashMap::new(),
            }),
            events,
        });

        let (job_tx, job_rx) = unbounded::<Job>();
        let (result_tx, result_rx) = unbounded::<JobResult>();

        let workers = (0..worker_count)
            .map(|_| {
                let jobs = job_rx.clone();
                let results = result_tx.clone();
                thread::spawn(move || {
                    for job in jobs.iter() {
                        let outcome = render_cell(&job.path, job.size);
                        if results.send(JobResult { job, outcome }).is_err() {
                            break;
                        }
                    }
                })
            })
            .collect();
        drop(result_tx);

        let completion_shared = Arc::clone(&shared);
        let completion = thread::spawn(move || {
            for result in result_rx.iter() {
                completion_shared.apply(result);
            }
        });

        debug!("Thumbnail cache started with {} workers", worker_count);
        Self {
            shared,
            jobs: Some(job_tx),
            queued: job_rx,
            workers,
            completion: Some(completion),
        }
    }

    /// Cached pixels for `(media_id, size)`, or a placeholder.
    ///
    /// Never touches disk and never starts a load. Items without a
    /// thumbnail path get the audio placeholder.
    pub fn get_sync(
        &self,
        media_id: MediaId,
        thumbnail_path: Option<&Path>,
        size: u32,
    ) -> Arc<RgbaImage> {
        let mut state = self.shared.lock();
        if let Some(pixels) = state.entries.get(&(media_id, size)).cloned() {
            state.stats.hits += 1;
            return pixels;
        }
        state.stats.misses += 1;

        let kind = match thumbnail_path {
            Some(p) if !p.as_os_str().is_empty() => Placeholder::Loading,
            _ => Placeholder::Audio,
        };
        placeholder_in(&mut state, kind, size)
    }

    /// Ask for `(media_id, size)` to be loaded.
    ///
    /// The outcome always arrives as a [`ThumbnailEvent`], even when the
    /// pixels are already cached. Requests for an id that is already
    /// pending are ignored.
    pub fn request_async(&self, media_id: MediaId, thumbnail_path: Option<&Path>, size: u32) {
        let mut state = self.shared.lock();

        if let Some(pixels) = state.entries.get(&(media_id, size)).cloned() {
            state.stats.hits += 1;
            drop(state);
            self.shared
                .events
                .send(Event::Thumbnail(ThumbnailEvent::Loaded {
                    media_id,
                    size,
                    pixels: Some(pixels),
                }));
            return;
        }

        if state.pending.contains_key(&media_id) {
            return;
        }

        let path = match thumbnail_path.filter(|p| p.is_file()) {
            Some(p) => p.to_path_buf(),
            None => {
                drop(state);
                let source = ThumbnailError::MissingSource {
                    path: thumbnail_path.map(Path::to_path_buf).unwrap_or_default(),
                };
                self.shared
                    .events
                    .send(Event::Thumbnail(ThumbnailEvent::Failed {
                        media_id,
                        size,
                        reason: source.to_string(),
                    }));
                return;
            }
        };

        state.stats.misses += 1;
        state.next_ticket += 1;
        let ticket = state.next_ticket;
        state.pending.insert(media_id, ticket);
        drop(state);

        if let Some(jobs) = &self.jobs {
            let _ = jobs.send(Job {
                media_id,
                size,
                path,
                ticket,
            });
        }
    }

    /// Forget every pending request and drop queued jobs. Jobs already
    /// decoding finish, but their results are discarded.
    pub fn cancel_all(&self) {
        self.shared.lock().pending.clear();
        let drained = self.queued.try_iter().count();
        if drained > 0 {
            debug!("Dropped {} queued thumbnail jobs", drained);
        }
    }

    /// Forget the pending request for one id
    pub fn cancel_one(&self, media_id: MediaId) {
        self.shared.lock().pending.remove(&media_id);
    }

    /// Drop all cached pixels
    pub fn clear(&self) {
        let mut state = self.shared.lock();
        state.entries.clear();
        state.placeholders.clear();
    }

    pub fn cached_count(&self) -> usize {
        self.shared.lock().entries.len()
    }

    pub fn pending_count(&self) -> usize {
        self.shared.lock().pending.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.shared.lock().stats
    }

    /// Placeholder pixels, rendered once per `(kind, size)`
    pub fn placeholder(&self, kind: Placeholder, size: u32) -> Arc<RgbaImage> {
        placeholder_in(&mut self.shared.lock(), kind, size)
    }
}

fn placeholder_in(state: &mut CacheState, kind: Placeholder, size: u32) -> Arc<RgbaImage> {
    Arc::clone(
        state
            .placeholders
            .entry((kind, size))
            .or_insert_with(|| Arc::new(render_placeholder(kind, size))),
    )
}

impl Drop for ThumbnailCache {
    fn drop(&mut self) {
        self.cancel_all();
        // Closing the job queue stops the workers, which closes the result
        // channel and stops the completion thread
        self.jobs.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        if let Some(completion) = self.completion.take() {
            let _ = completion.join();
        }
    }
}

impl std::fmt::Debug for ThumbnailCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailCache")
            .field("workers", &self.workers.len())
            .field("cached", &self.cached_count())
            .field("pending", &self.pending_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventChannel, EventReceiver};
    use image::{Rgb, RgbImage};
    use std::time::Duration;
    use tempfile::TempDir;

    const WAIT: Duration = Duration::from_secs(10);

    /// A cache whose jobs stay queued until a test applies them by hand
    fn manual_cache(capacity: usize) -> (ThumbnailCache, EventReceiver) {
        let (sender, receiver) = EventChannel::new();
        (ThumbnailCache::build(capacity, 0, sender), receiver)
    }

    fn write_thumb(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(40, 30, Rgb([200, 100, 50]))
            .save(&path)
            .unwrap();
        path
    }

    fn run_queued(cache: &ThumbnailCache) -> usize {
        let jobs: Vec<Job> = cache.queued.try_iter().collect();
        let count = jobs.len();
        for job in jobs {
            let outcome = render_cell(&job.path, job.size);
            cache.shared.apply(JobResult { job, outcome });
        }
        count
    }

    #[test]
    fn config_defaults() {
        let config = ThumbnailCacheConfig::default();
        assert_eq!(config.capacity, 500);
        assert!(config.workers >= 2);
    }

    #[test]
    fn get_sync_returns_placeholder_without_loading() {
        let temp = TempDir::new().unwrap();
        let path = write_thumb(temp.path(), "a.png");
        let (cache, _events) = manual_cache(10);

        let pixels = cache.get_sync(1, Some(&path), 64);

        assert_eq!(*pixels, *cache.placeholder(Placeholder::Loading, 64));
        assert_eq!(cache.pending_count(), 0);
        assert_eq!(cache.queued.len(), 0);

        let audio = cache.get_sync(2, None, 64);
        assert_eq!(*audio, *cache.placeholder(Placeholder::Audio, 64));
    }

    #[test]
    fn duplicate_requests_enqueue_one_job() {
        let temp = TempDir::new().unwrap();
        let path = write_thumb(temp.path(), "a.png");
        let (cache, _events) = manual_cache(10);

        cache.request_async(1, Some(&path), 64);
        cache.request_async(1, Some(&path), 64);

        assert_eq!(cache.queued.len(), 1);
        assert_eq!(cache.pending_count(), 1);
    }

    #[test]
    fn completed_job_populates_cache_and_notifies() {
        let temp = TempDir::new().unwrap();
        let path = write_thumb(temp.path(), "a.png");
        let (cache, events) = manual_cache(10);

        cache.request_async(7, Some(&path), 64);
        assert_eq!(run_queued(&cache), 1);

        match events.try_recv() {
            Some(Event::Thumbnail(ThumbnailEvent::Loaded {
                media_id, size, pixels,
            })) => {
                assert_eq!((media_id, size), (7, 64));
                assert_eq!(pixels.unwrap().dimensions(), (64, 64));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(cache.cached_count(), 1);
        assert_eq!(cache.pending_count(), 0);
        assert_eq!(cache.get_sync(7, Some(&path), 64).dimensions(), (64, 64));
    }

    #[test]
    fn cancel_all_discards_late_results() {
        let temp = TempDir::new().unwrap();
        let path = write_thumb(temp.path(), "a.png");
        let (cache, events) = manual_cache(10);

        cache.request_async(1, Some(&path), 64);
        let job = cache.queued.try_recv().unwrap();
        cache.cancel_all();

        let outcome = render_cell(&job.path, job.size);
        cache.shared.apply(JobResult { job, outcome });

        assert!(events.try_recv().is_none());
        assert_eq!(cache.cached_count(), 0);
        assert_eq!(cache.stats().jobs_run, 0);
    }

    #[test]
    fn cancel_all_drains_queued_jobs() {
        let temp = TempDir::new().unwrap();
        let a = write_thumb(temp.path(), "a.png");
        let b = write_thumb(temp.path(), "b.png");
        let (cache, _events) = manual_cache(10);

        cache.request_async(1, Some(&a), 64);
        cache.request_async(2, Some(&b), 64);
        cache.cancel_all();

        assert_eq!(cache.queued.len(), 0);
        assert_eq!(cache.pending_count(), 0);
    }

    #[test]
    fn stale_ticket_is_discarded_after_rerequest() {
        let temp = TempDir::new().unwrap();
        let path = write_thumb(temp.path(), "a.png");
        let (cache, events) = manual_cache(10);

        cache.request_async(1, Some(&path), 64);
        let stale = cache.queued.try_recv().unwrap();
        cache.cancel_one(1);
        cache.request_async(1, Some(&path), 64);

        let outcome = render_cell(&stale.path, stale.size);
        cache.shared.apply(JobResult { job: stale, outcome });
        assert!(events.try_recv().is_none());
        assert_eq!(cache.pending_count(), 1);

        assert_eq!(run_queued(&cache), 1);
        assert!(events.try_recv().is_some());
    }

    #[test]
    fn missing_file_fails_without_enqueuing() {
        let (cache, events) = manual_cache(10);

        cache.request_async(3, Some(Path::new("/nonexistent/thumb.jpg")), 64);
        cache.request_async(4, None, 64);

        assert_eq!(cache.queued.len(), 0);
        for expected in [3, 4] {
            match events.try_recv() {
                Some(Event::Thumbnail(ThumbnailEvent::Failed { media_id, .. })) => {
                    assert_eq!(media_id, expected)
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[test]
    fn cached_request_notifies_without_a_job() {
        let temp = TempDir::new().unwrap();
        let path = write_thumb(temp.path(), "a.png");
        let (cache, events) = manual_cache(10);
        cache.request_async(1, Some(&path), 64);
        run_queued(&cache);
        let _ = events.try_recv();

        cache.request_async(1, Some(&path), 64);

        assert_eq!(cache.queued.len(), 0);
        assert!(matches!(
            events.try_recv(),
            Some(Event::Thumbnail(ThumbnailEvent::Loaded { media_id: 1, .. }))
        ));
    }

    #[test]
    fn sizes_are_cached_independently() {
        let temp = TempDir::new().unwrap();
        let path = write_thumb(temp.path(), "a.png");
        let (cache, _events) = manual_cache(10);

        cache.request_async(1, Some(&path), 64);
        run_queued(&cache);
        cache.request_async(1, Some(&path), 128);
        run_queued(&cache);

        assert_eq!(cache.cached_count(), 2);
        assert_eq!(cache.get_sync(1, Some(&path), 128).dimensions(), (128, 128));

        cache.clear();
        assert_eq!(cache.cached_count(), 0);
    }

    #[test]
    fn lru_evicts_least_recently_used() {
        let temp = TempDir::new().unwrap();
        let path = write_thumb(temp.path(), "a.png");
        let (cache, _events) = manual_cache(2);

        for id in [1, 2] {
            cache.request_async(id, Some(&path), 32);
            run_queued(&cache);
        }
        // Touch 1 so 2 becomes the eviction candidate
        cache.get_sync(1, Some(&path), 32);
        cache.request_async(3, Some(&path), 32);
        run_queued(&cache);

        let loading = cache.placeholder(Placeholder::Loading, 32);
        assert_ne!(*cache.get_sync(1, Some(&path), 32), *loading);
        assert_eq!(*cache.get_sync(2, Some(&path), 32), *loading);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn worker_pool_loads_in_background() {
        let temp = TempDir::new().unwrap();
        let path = write_thumb(temp.path(), "a.png");
        let (sender, events) = EventChannel::new();
        let cache = ThumbnailCache::new(
            ThumbnailCacheConfig {
                capacity: 10,
                workers: 2,
            },
            sender,
        );

        cache.request_async(9, Some(&path), 48);

        match events.recv_timeout(WAIT) {
            Some(Event::Thumbnail(ThumbnailEvent::Loaded { media_id, .. })) => {
                assert_eq!(media_id, 9)
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(cache.cached_count(), 1);
    }

    #[test]
    fn corrupt_thumbnail_reports_failure() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.jpg");
        std::fs::write(&path, b"not a jpeg").unwrap();
        let (cache, events) = manual_cache(10);

        cache.request_async(5, Some(&path), 48);
        run_queued(&cache);

        assert!(matches!(
            events.try_recv(),
            Some(Event::Thumbnail(ThumbnailEvent::Failed { media_id: 5, .. }))
        ));
        assert_eq!(cache.pending_count(), 0);
    }
}
