//! Background jobs: directory scan and thumbnail loading
//!
//! Each job runs on its own named thread(s) and streams events back over a
//! bounded crossbeam channel. The controlling thread owns the receiver and is the
//! only one that turns results into presentation objects.
//!
//! - Cancellation is cooperative: a shared `CancelToken` is polled between files
//! - Every job ends with exactly one `Finished` event, also after errors or cancel
//! - Dropping the receiver (or the job) cancels the work

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use log::{debug, trace, warn};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::core::scanner::{ScanProgress, SequenceScanner};
use crate::core::thumb_cache::ThumbnailCache;
use crate::entities::{ImageSequence, Thumbnail};

/// Events buffered before a slow receiver blocks the worker
const EVENT_CAPACITY: usize = 256;

/// Shared stop flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Scan job output, in emission order
#[derive(Debug, Clone)]
pub enum ScanEvent {
    Progress(ScanProgress),
    Sequences(Vec<ImageSequence>),
    Error(String),
    Finished { cancelled: bool },
}

/// Receiver side of a scan, implemented by whatever presents results
pub trait ScanObserver {
    fn on_progress(&mut self, _progress: &ScanProgress) {}
    fn on_sequences(&mut self, sequences: Vec<ImageSequence>);
    fn on_error(&mut self, message: &str);
    fn on_finished(&mut self, _cancelled: bool) {}
}

/// Directory scan running on a dedicated thread
#[derive(Debug)]
pub struct ScanJob {
    events: Receiver<ScanEvent>,
    cancel: CancelToken,
    handle: Option<thread::JoinHandle<()>>,
}

impl ScanJob {
    /// Start scanning `directory` in the background
    pub fn spawn(scanner: SequenceScanner, directory: PathBuf) -> io::Result<Self> {
        let (tx, rx) = bounded(EVENT_CAPACITY);
        let cancel = scanner.cancel_token();

        let handle = thread::Builder::new()
            .name("seqbrowse-scan".into())
            .spawn(move || {
                debug!("Scan worker started: {}", directory.display());
                let token = scanner.cancel_token();
                let send = |event: ScanEvent| {
                    // Receiver gone: nobody wants the result any more
                    if tx.send(event).is_err() {
                        token.cancel();
                    }
                };

                let cancelled = match scanner.scan(&directory, |p| send(ScanEvent::Progress(p))) {
                    Ok(outcome) => {
                        send(ScanEvent::Sequences(outcome.sequences));
                        outcome.cancelled
                    }
                    Err(e) => {
                        warn!("Scan failed: {}", e);
                        send(ScanEvent::Error(e.to_string()));
                        scanner.is_cancelled()
                    }
                };
                send(ScanEvent::Finished { cancelled });
                debug!("Scan worker stopped (cancelled: {})", cancelled);
            })?;

        Ok(Self {
            events: rx,
            cancel,
            handle: Some(handle),
        })
    }

    pub fn events(&self) -> &Receiver<ScanEvent> {
        &self.events
    }

    /// Ask the worker to stop after the current file
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Deliver all events to `observer` on the calling thread, then join
    pub fn drain_into(mut self, observer: &mut impl ScanObserver) {
        for event in self.events.iter() {
            match event {
                ScanEvent::Progress(p) => observer.on_progress(&p),
                ScanEvent::Sequences(seqs) => observer.on_sequences(seqs),
                ScanEvent::Error(msg) => observer.on_error(&msg),
                ScanEvent::Finished { cancelled } => {
                    observer.on_finished(cancelled);
                    break;
                }
            }
        }
        self.join();
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Scan worker panicked");
            }
        }
    }
}

impl Drop for ScanJob {
    fn drop(&mut self) {
        // Worker exits at its next checkpoint; don't block the caller on it
        if self.handle.is_some() {
            self.cancel.cancel();
        }
    }
}

/// Thumbnail job output. With one thread, order follows the request list.
#[derive(Debug, Clone)]
pub enum ThumbnailEvent {
    Loaded { path: PathBuf, thumbnail: Thumbnail },
    Failed { path: PathBuf, message: String },
    Finished { cancelled: bool },
}

/// Thumbnail loading over a small thread pool sharing one cache
#[derive(Debug)]
pub struct ThumbnailJob {
    events: Receiver<ThumbnailEvent>,
    cancel: CancelToken,
    handle: Option<thread::JoinHandle<()>>,
}

impl ThumbnailJob {
    /// Load (or generate) `size` thumbnails for `paths` on `threads` workers
    pub fn spawn(
        cache: Arc<ThumbnailCache>,
        paths: Vec<PathBuf>,
        size: u32,
        threads: usize,
    ) -> io::Result<Self> {
        let (tx, rx) = bounded(EVENT_CAPACITY);
        let cancel = CancelToken::new();
        let threads = threads.clamp(1, paths.len().max(1));

        // Work queue is filled up front; workers exit when it runs dry
        let (job_tx, job_rx): (Sender<PathBuf>, Receiver<PathBuf>) = unbounded();
        let total = paths.len();
        for path in paths {
            let _ = job_tx.send(path);
        }
        drop(job_tx);

        let token = cancel.clone();
        let handle = thread::Builder::new()
            .name("seqbrowse-thumbs".into())
            .spawn(move || {
                debug!("Thumbnail job: {} files on {} threads", total, threads);
                thread::scope(|scope| {
                    for worker_id in 0..threads {
                        let job_rx = job_rx.clone();
                        let tx = tx.clone();
                        let cache = Arc::clone(&cache);
                        let token = token.clone();
                        let spawned = thread::Builder::new()
                            .name(format!("seqbrowse-thumb-{}", worker_id))
                            .spawn_scoped(scope, move || {
                                trace!("Thumbnail worker {} started", worker_id);
                                while let Ok(path) = job_rx.recv() {
                                    if token.is_cancelled() {
                                        break;
                                    }
                                    let event = match cache.get_or_create(&path, size) {
                                        Ok(thumbnail) => ThumbnailEvent::Loaded { path, thumbnail },
                                        Err(e) => {
                                            debug!("Thumbnail failed: {}", e);
                                            ThumbnailEvent::Failed { path, message: e.to_string() }
                                        }
                                    };
                                    if tx.send(event).is_err() {
                                        token.cancel();
                                        break;
                                    }
                                }
                                trace!("Thumbnail worker {} stopped", worker_id);
                            });
                        if let Err(e) = spawned {
                            warn!("Failed to spawn thumbnail worker {}: {}", worker_id, e);
                        }
                    }
                });

                let cancelled = token.is_cancelled();
                if !cancelled {
                    fail_unclaimed(&job_rx, &tx);
                }
                if let Err(e) = cache.flush() {
                    warn!("Thumbnail cache flush failed: {}", e);
                }
                let _ = tx.send(ThumbnailEvent::Finished { cancelled });
                debug!("Thumbnail job finished (cancelled: {})", cancelled);
            })?;

        Ok(Self {
            events: rx,
            cancel,
            handle: Some(handle),
        })
    }

    pub fn events(&self) -> &Receiver<ThumbnailEvent> {
        &self.events
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Pass every event to `f` until `Finished`, then join
    pub fn drain(mut self, mut f: impl FnMut(ThumbnailEvent)) {
        for event in self.events.iter() {
            let done = matches!(event, ThumbnailEvent::Finished { .. });
            f(event);
            if done {
                break;
            }
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Thumbnail job panicked");
            }
        }
    }

    /// Wait up to `timeout` for the next event
    pub fn next_event(&self, timeout: Duration) -> Option<ThumbnailEvent> {
        self.events.recv_timeout(timeout).ok()
    }
}

/// Report paths no worker picked up (every worker failed to start)
fn fail_unclaimed(job_rx: &Receiver<PathBuf>, tx: &Sender<ThumbnailEvent>) -> usize {
    let mut failed = 0;
    for path in job_rx.try_iter() {
        let event = ThumbnailEvent::Failed {
            path,
            message: "no thumbnail worker available".into(),
        };
        if tx.send(event).is_err() {
            break;
        }
        failed += 1;
    }
    if failed > 0 {
        warn!("{} thumbnails not loaded: no worker thread", failed);
    }
    failed
}

impl Drop for ThumbnailJob {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.cancel.cancel();
        }
    }
}
