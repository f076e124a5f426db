//! Sync engine: dispatcher, worker pool and run completion.
//!
//! The dispatcher seeds the pending queue with `/`, then pops paths and
//! hands each one to an idle worker. A worker waits on the parent gate,
//! synchronizes its path and, for a directory, pushes the discovered
//! children back on the queue. The run ends once the queue has stayed
//! empty for `quiescence_polls` consecutive polls.
//!
//! Completion is judged from queue emptiness only, not from worker
//! idleness: a path whose processing outlasts the quiescence window can
//! still be running when the dispatcher stops, and the children it
//! enqueues afterwards are not visited this run.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::config::{
    DEFAULT_GATE_INTERVAL_MS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_QUIESCENCE_POLLS,
    DEFAULT_WORKERS,
};
use crate::sync::content::{ContentOutcome, ContentSynchronizer};
use crate::sync::directory::DirectorySynchronizer;
use crate::sync::endpoint::Endpoint;
use crate::sync::inflight::InFlightRegistry;
use crate::sync::path::ResourcePath;
use crate::sync::queue::PendingQueue;

/// Engine tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Number of concurrent workers.
    pub workers: usize,
    /// Sleep between two polls of an empty queue.
    pub poll_interval: Duration,
    /// Consecutive empty polls after which the run is complete.
    pub quiescence_polls: u32,
    /// Sleep between two checks of the parent gate.
    pub gate_interval: Duration,
    /// Directory for staged downloads.
    pub staging_dir: Option<PathBuf>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            quiescence_polls: DEFAULT_QUIESCENCE_POLLS,
            gate_interval: Duration::from_millis(DEFAULT_GATE_INTERVAL_MS),
            staging_dir: None,
        }
    }
}

impl SyncOptions {
    /// Time the queue must stay empty before the run is complete.
    pub fn quiescence_window(&self) -> Duration {
        self.poll_interval
            .checked_mul(self.quiescence_polls)
            .unwrap_or(Duration::MAX)
    }
}

/// Counters updated by the workers.
#[derive(Debug, Default)]
struct SyncStats {
    dirs_synced: AtomicU64,
    dirs_created: AtomicU64,
    contents_transferred: AtomicU64,
    contents_in_sync: AtomicU64,
    bytes_transferred: AtomicU64,
}

/// Summary of a finished run.
///
/// Only successful steps are counted; failed paths show up in the logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Directories fully synchronized (exist at target, listed at source).
    pub dirs_synced: u64,
    /// Directories created at the target.
    pub dirs_created: u64,
    /// Contents uploaded to the target.
    pub contents_transferred: u64,
    /// Contents skipped by the checksum gate.
    pub contents_in_sync: u64,
    /// Bytes uploaded.
    pub bytes_transferred: u64,
    /// Paths discovered but never dispatched.
    pub paths_left: usize,
    pub duration: Duration,
}

impl SyncReport {
    pub fn summary(&self) -> String {
        format!(
            "{} dirs ({} created), {} contents uploaded ({}), {} already in sync, in {:.1}s",
            self.dirs_synced,
            self.dirs_created,
            self.contents_transferred,
            humansize::format_size(self.bytes_transferred, humansize::BINARY),
            self.contents_in_sync,
            self.duration.as_secs_f64()
        )
    }
}

/// State shared by the dispatcher and every worker.
struct Shared {
    queue: PendingQueue,
    in_flight: InFlightRegistry,
    dirs: DirectorySynchronizer,
    contents: ContentSynchronizer,
    stats: SyncStats,
    gate_interval: Duration,
}

impl Shared {
    /// Process one path handed over by the dispatcher.
    async fn process(&self, worker: usize, path: ResourcePath) {
        debug!("worker {} takes {}", worker, path);
        self.in_flight.mark(&path);
        self.in_flight.wait_for_parent(&path, self.gate_interval).await;

        let children = if path.is_dir() {
            self.sync_dir(&path).await
        } else {
            self.sync_content(&path).await;
            Vec::new()
        };

        self.in_flight.clear(&path);
        if !children.is_empty() {
            self.queue.push(children);
        }
    }

    async fn sync_dir(&self, dir: &ResourcePath) -> Vec<ResourcePath> {
        match self.dirs.synchronize(dir).await {
            Ok(outcome) => {
                self.stats.dirs_synced.fetch_add(1, Ordering::Relaxed);
                if outcome.created {
                    self.stats.dirs_created.fetch_add(1, Ordering::Relaxed);
                }
                outcome.children
            }
            Err(e) => {
                error!("sync dir {}: {} error: {}", dir, e.kind(), e);
                Vec::new()
            }
        }
    }

    async fn sync_content(&self, path: &ResourcePath) {
        match self.contents.synchronize(path).await {
            Ok(ContentOutcome::InSync) => {
                self.stats.contents_in_sync.fetch_add(1, Ordering::Relaxed);
            }
            Ok(ContentOutcome::Transferred { bytes }) => {
                self.stats.contents_transferred.fetch_add(1, Ordering::Relaxed);
                self.stats.bytes_transferred.fetch_add(bytes, Ordering::Relaxed);
            }
            Err(e) => {
                error!("sync content {}: {} error: {}", path, e.kind(), e);
            }
        }
    }
}

/// A worker announces it is idle by sending the slot it will read its
/// next path from.
type Slot = oneshot::Sender<ResourcePath>;

/// Mirrors the tree of a source endpoint onto a target endpoint.
pub struct SyncEngine {
    source: Arc<dyn Endpoint>,
    target: Arc<dyn Endpoint>,
    options: SyncOptions,
}

impl SyncEngine {
    pub fn new(source: Arc<dyn Endpoint>, target: Arc<dyn Endpoint>, options: SyncOptions) -> Self {
        Self {
            source,
            target,
            options,
        }
    }

    /// Run one synchronization, from `/` down to quiescence.
    ///
    /// Per-path failures are logged and never fail the run.
    pub async fn run(&self) -> SyncReport {
        let started = Instant::now();
        let workers = self.options.workers.max(1);
        info!(
            "sync {} -> {} with {} workers",
            self.source.describe(),
            self.target.describe(),
            workers
        );

        let shared = Arc::new(Shared {
            queue: PendingQueue::new(),
            in_flight: InFlightRegistry::new(),
            dirs: DirectorySynchronizer::new(Arc::clone(&self.source), Arc::clone(&self.target)),
            contents: ContentSynchronizer::new(Arc::clone(&self.source), Arc::clone(&self.target))
                .with_staging_dir(self.options.staging_dir.clone()),
            stats: SyncStats::default(),
            gate_interval: self.options.gate_interval,
        });

        let (ready_tx, mut ready_rx) = mpsc::channel::<Slot>(workers);
        let handles: Vec<_> = (0..workers)
            .map(|id| tokio::spawn(worker_loop(id, Arc::clone(&shared), ready_tx.clone())))
            .collect();
        drop(ready_tx);

        shared.queue.push([ResourcePath::root()]);
        self.dispatch(&shared, &mut ready_rx).await;

        // Idle workers see the closed channel and exit; busy ones finish
        // their current path first.
        drop(ready_rx);
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!("worker task failed: {}", e);
            }
        }

        let left = shared.queue.drain();
        if !left.is_empty() {
            warn!(
                "run ended with {} paths never dispatched (quiescence window {:?})",
                left.len(),
                self.options.quiescence_window()
            );
            for path in &left {
                debug!("not dispatched: {}", path);
            }
        }

        let stats = &shared.stats;
        let report = SyncReport {
            dirs_synced: stats.dirs_synced.load(Ordering::Relaxed),
            dirs_created: stats.dirs_created.load(Ordering::Relaxed),
            contents_transferred: stats.contents_transferred.load(Ordering::Relaxed),
            contents_in_sync: stats.contents_in_sync.load(Ordering::Relaxed),
            bytes_transferred: stats.bytes_transferred.load(Ordering::Relaxed),
            paths_left: left.len(),
            duration: started.elapsed(),
        };
        info!("sync complete: {}", report.summary());
        report
    }

    /// Dispatcher loop. Returns once the queue was still found empty after
    /// `quiescence_polls` consecutive poll intervals.
    async fn dispatch(&self, shared: &Shared, ready: &mut mpsc::Receiver<Slot>) {
        let mut empty_polls: u32 = 0;
        loop {
            let Some(path) = shared.queue.pop() else {
                if empty_polls >= self.options.quiescence_polls {
                    debug!("queue empty for {} polls, run complete", empty_polls);
                    return;
                }
                tokio::time::sleep(self.options.poll_interval).await;
                empty_polls += 1;
                continue;
            };
            empty_polls = 0;

            if !handoff(ready, path).await {
                error!("all workers are gone, stopping dispatch");
                return;
            }
        }
    }
}

/// Blocking handoff: wait until an idle worker accepts `path`.
async fn handoff(ready: &mut mpsc::Receiver<Slot>, mut path: ResourcePath) -> bool {
    while let Some(slot) = ready.recv().await {
        match slot.send(path) {
            Ok(()) => return true,
            Err(returned) => path = returned,
        }
    }
    false
}

async fn worker_loop(id: usize, shared: Arc<Shared>, ready: mpsc::Sender<Slot>) {
    loop {
        let (slot, next) = oneshot::channel();
        if ready.send(slot).await.is_err() {
            break;
        }
        let Ok(path) = next.await else {
            break;
        };
        shared.process(id, path).await;
    }
    debug!("worker {} exits", id);
}
