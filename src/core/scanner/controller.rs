//! Background scan lifecycle: at most one scan runs per controller.

use super::IncrementalScanner;
use crate::error::ScanError;
use crate::events::ScanSummary;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// How long `start` waits for a previous scan to honor cancellation
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

type ScanOutcome = Result<ScanSummary, ScanError>;

struct ActiveScan {
    root: PathBuf,
    cancel: Arc<AtomicBool>,
    done: Receiver<ScanOutcome>,
    handle: JoinHandle<()>,
}

impl ActiveScan {
    /// Wait up to `timeout` for the worker to finish
    fn finish(self, timeout: Option<Duration>) -> Result<Option<ScanOutcome>, ActiveScan> {
        let outcome = match timeout {
            Some(timeout) => match self.done.recv_timeout(timeout) {
                Ok(outcome) => Some(outcome),
                Err(RecvTimeoutError::Timeout) => return Err(self),
                Err(RecvTimeoutError::Disconnected) => None,
            },
            None => self.done.recv().ok(),
        };

        if self.handle.join().is_err() {
            warn!("Scan thread for {} panicked", self.root.display());
        }
        Ok(outcome)
    }
}

/// Owns the background scan thread
pub struct ScanController {
    scanner: Arc<IncrementalScanner>,
    active: Mutex<Option<ActiveScan>>,
    stop_timeout: Duration,
}

impl ScanController {
    pub fn new(scanner: IncrementalScanner) -> Self {
        Self {
            scanner: Arc::new(scanner),
            active: Mutex::new(None),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    /// Override how long `start` waits for a previous scan to stop
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn scanner(&self) -> &IncrementalScanner {
        &self.scanner
    }

    /// Start scanning `root` in the background.
    ///
    /// A scan already in progress is cancelled first. If it does not stop
    /// within the stop timeout, the new scan is refused.
    pub fn start(&self, root: &Path) -> Result<(), ScanError> {
        let mut active = self.lock_active();

        if let Some(previous) = active.take() {
            previous.cancel.store(true, Ordering::Relaxed);
            debug!("Waiting for scan of {} to stop", previous.root.display());
            if let Err(still_running) = previous.finish(Some(self.stop_timeout)) {
                let path = still_running.root.clone();
                *active = Some(still_running);
                return Err(ScanError::AlreadyRunning { path });
            }
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = bounded(1);
        let scanner = Arc::clone(&self.scanner);
        let worker_cancel = Arc::clone(&cancel);
        let worker_root = root.to_path_buf();

        let handle = thread::spawn(move || {
            let outcome = scanner.scan(&worker_root, &worker_cancel);
            let _ = done_tx.send(outcome);
        });

        *active = Some(ActiveScan {
            root: root.to_path_buf(),
            cancel,
            done: done_rx,
            handle,
        });
        Ok(())
    }

    /// Request the running scan to stop between files. Does not block.
    pub fn cancel(&self) {
        if let Some(scan) = self.lock_active().as_ref() {
            scan.cancel.store(true, Ordering::Relaxed);
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_active()
            .as_ref()
            .is_some_and(|scan| !scan.handle.is_finished())
    }

    /// Block until the current scan ends and return its outcome.
    ///
    /// Returns `None` when no scan was started since the last wait.
    pub fn wait(&self) -> Option<ScanOutcome> {
        let scan = self.lock_active().take()?;
        match scan.finish(None) {
            Ok(outcome) => outcome,
            Err(_) => None,
        }
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<ActiveScan>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ScanController {
    fn drop(&mut self) {
        let scan = match self.active.get_mut() {
            Ok(active) => active.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(scan) = scan {
            scan.cancel.store(true, Ordering::Relaxed);
            let _ = scan.finish(Some(self.stop_timeout));
        }
    }
}

impl std::fmt::Debug for ScanController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanController")
            .field("scanner", &self.scanner)
            .field("running", &self.is_running())
            .finish()
    }
}
