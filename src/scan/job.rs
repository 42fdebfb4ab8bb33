//! Concurrent scan engine
//!
//! A job owns a LIFO frontier of directories waiting to be listed. Workers pop
//! an entry, list it outside the lock, emit matches into the result channel and
//! push discovered subdirectories back. There is no coordinator:
//!
//! - `active` counts workers holding a popped entry, incremented on pop and
//!   decremented only after that entry's subdirectories are pushed back
//! - a worker that finds the frontier empty while `active > 0` waits on the
//!   condvar, because a running worker may still push work
//! - a worker that finds the frontier empty with `active == 0` completes the
//!   job; this is the only natural termination path
//!
//! Completion and forced cancellation both raise the `cancelled` flag, wake all
//! waiters and close the stop channel so a blocked consumer returns.

use crate::error::ScanError;
use crate::parallel::Executor;
use crate::pattern::{PatternSet, join_path};
use crate::scan::sink::ErrorSink;
use crate::tree::{TreeEntry, TreeProvider};
use crossbeam::channel::{Receiver, Sender, select, unbounded};
use std::any::Any;
use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// Decides whether a discovered directory is descended into
pub type DescentFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// A directory waiting to be listed, with the patterns that apply below it
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    pub dir: String,
    pub patterns: Arc<PatternSet>,
}

impl FrontierEntry {
    pub fn new(dir: impl Into<String>, patterns: Arc<PatternSet>) -> Self {
        Self {
            dir: dir.into(),
            patterns,
        }
    }
}

/// Immutable settings shared by every job started from one scanner
pub(crate) struct ScanSettings {
    pub tree: Arc<dyn TreeProvider>,
    pub executor: Arc<dyn Executor>,
    pub errors: Option<Arc<dyn ErrorSink>>,
    pub descend: DescentFilter,
    pub root_prefix: String,
    pub return_files: bool,
    pub return_directories: bool,
    pub max_workers: usize,
}

/// State guarded by the job mutex
#[derive(Debug)]
struct Frontier {
    pending: Vec<FrontierEntry>,
    /// Workers started or reserved and not yet exited
    workers: usize,
    /// Workers currently holding a popped entry
    active: usize,
}

pub(crate) struct ScanJob {
    id: u64,
    settings: Arc<ScanSettings>,
    frontier: Mutex<Frontier>,
    progress: Condvar,
    cancelled: AtomicBool,
    completed: AtomicBool,
    next_worker: AtomicUsize,
    results_tx: Sender<String>,
    results_rx: Receiver<String>,
    stop_tx: Mutex<Option<Sender<()>>>,
    stop_rx: Receiver<()>,
}

impl ScanJob {
    /// Create a job seeded with `seeds` and start `max(1, seeds.len())` workers
    pub fn launch(settings: Arc<ScanSettings>, seeds: &[FrontierEntry]) -> Arc<Self> {
        let (results_tx, results_rx) = unbounded();
        let (stop_tx, stop_rx) = unbounded();

        let job = Arc::new(Self {
            id: NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed),
            settings,
            frontier: Mutex::new(Frontier {
                pending: seeds.to_vec(),
                workers: 0,
                active: 0,
            }),
            progress: Condvar::new(),
            cancelled: AtomicBool::new(false),
            completed: AtomicBool::new(false),
            next_worker: AtomicUsize::new(0),
            results_tx,
            results_rx,
            stop_tx: Mutex::new(Some(stop_tx)),
            stop_rx,
        });

        let initial = seeds.len().max(1);
        tracing::debug!(job = job.id, seeds = seeds.len(), workers = initial, "starting scan job");
        job.lock_frontier().workers += initial;
        job.start_workers(initial);
        job
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// True once the job terminated because all work was done
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Workers started or reserved that have not exited yet
    pub fn live_workers(&self) -> usize {
        self.lock_frontier().workers
    }

    /// Stop the job. Idempotent; wakes waiting workers and a blocked consumer.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        if !self.is_completed() {
            tracing::debug!(job = self.id, "scan job cancelled");
        }

        drop(
            self.stop_tx
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );

        // notify under the lock so a worker between its flag check and its wait
        // cannot miss the wakeup
        let _frontier = self.lock_frontier();
        self.progress.notify_all();
    }

    /// Take the next result, blocking while the job is still running.
    ///
    /// Returns `None` only when the channel is drained and the job is over.
    pub fn next_result(&self) -> Option<String> {
        if let Ok(path) = self.results_rx.try_recv() {
            return Some(path);
        }
        if self.is_cancelled() {
            return self.results_rx.try_recv().ok();
        }

        select! {
            recv(self.results_rx) -> path => path.ok(),
            recv(self.stop_rx) -> _ => self.results_rx.try_recv().ok(),
        }
    }

    fn lock_frontier(&self) -> MutexGuard<'_, Frontier> {
        self.frontier.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Submit `count` workers whose slots are already reserved in `workers`
    fn start_workers(self: &Arc<Self>, count: usize) {
        let mut failed = 0;
        for _ in 0..count {
            let worker_id = self.next_worker.fetch_add(1, Ordering::Relaxed);
            let job = Arc::clone(self);
            if let Err(e) = self
                .settings
                .executor
                .submit(Box::new(move || job.run_worker(worker_id)))
            {
                failed += 1;
                self.report(e);
            }
        }

        if failed == 0 {
            return;
        }

        let stalled = {
            let mut frontier = self.lock_frontier();
            frontier.workers -= failed;
            frontier.workers == 0
        };
        if stalled {
            // nobody is left to drain the frontier
            tracing::warn!(job = self.id, "no scan worker could be started");
            self.cancel();
        }
    }

    fn run_worker(self: Arc<Self>, worker_id: usize) {
        let mut exit = WorkerExit {
            job: &self,
            worker_id,
            holding: false,
        };
        tracing::trace!(job = self.id, worker = worker_id, "scan worker started");

        while let Some(entry) = self.next_entry() {
            exit.holding = true;
            let discovered = self.expand(&entry);
            let extra = self.settle(discovered);
            exit.holding = false;
            self.grow(extra);
        }
    }

    /// Pop the next entry, waiting while other workers may still produce work
    fn next_entry(&self) -> Option<FrontierEntry> {
        let mut frontier = self.lock_frontier();
        loop {
            if self.is_cancelled() {
                return None;
            }
            if let Some(entry) = frontier.pending.pop() {
                frontier.active += 1;
                return Some(entry);
            }
            if frontier.active == 0 {
                drop(frontier);
                self.complete();
                return None;
            }
            frontier = self
                .progress
                .wait(frontier)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Release the held entry and push its subdirectories. Returns how many
    /// extra worker slots were reserved because the backlog outnumbers workers.
    fn settle(&self, discovered: Vec<FrontierEntry>) -> usize {
        let mut frontier = self.lock_frontier();
        frontier.active -= 1;
        if discovered.is_empty() {
            return 0;
        }

        frontier.pending.extend(discovered);
        self.progress.notify_all();

        let wanted = frontier.pending.len().min(self.settings.max_workers);
        let extra = wanted.saturating_sub(frontier.workers);
        frontier.workers += extra;
        extra
    }

    /// Start workers for slots reserved by `settle`
    fn grow(self: &Arc<Self>, extra: usize) {
        if extra == 0 {
            return;
        }
        if self.is_cancelled() {
            self.lock_frontier().workers -= extra;
            return;
        }
        tracing::trace!(job = self.id, extra, "spawning scan workers for backlog");
        self.start_workers(extra);
    }

    /// List one directory and evaluate its children
    fn expand(&self, entry: &FrontierEntry) -> Vec<FrontierEntry> {
        let children = match self.list(&entry.dir) {
            Ok(children) => children,
            Err(e) => {
                // errors racing a cancellation are not failures
                if !self.is_cancelled() {
                    self.report(e);
                }
                return Vec::new();
            }
        };

        let mut discovered = Vec::new();
        for child in children {
            if self.is_cancelled() {
                break;
            }

            let subpath = join_path(&entry.dir, &child.name);
            let wanted = if child.is_dir {
                if self.descends(&subpath) {
                    discovered.push(FrontierEntry::new(
                        subpath.clone(),
                        Arc::clone(&entry.patterns),
                    ));
                }
                self.settings.return_directories
            } else {
                self.settings.return_files
            };

            if wanted && entry.patterns.is_match(&subpath) && !self.emit(subpath) {
                break;
            }
        }
        discovered
    }

    fn list(&self, dir: &str) -> Result<Vec<TreeEntry>, ScanError> {
        match catch_unwind(AssertUnwindSafe(|| self.settings.tree.list(dir))) {
            Ok(Ok(children)) => Ok(children),
            Ok(Err(source)) => Err(listing_error(dir, source)),
            Err(payload) => Err(ScanError::ProviderPanicked {
                path: dir.to_string(),
                message: panic_message(payload.as_ref()),
            }),
        }
    }

    /// Run the descent filter. A panicking filter rejects the directory.
    fn descends(&self, subpath: &str) -> bool {
        match catch_unwind(AssertUnwindSafe(|| (self.settings.descend)(subpath))) {
            Ok(descend) => descend,
            Err(payload) => {
                if !self.is_cancelled() {
                    self.report(ScanError::FilterPanicked {
                        path: subpath.to_string(),
                        message: panic_message(payload.as_ref()),
                    });
                }
                false
            }
        }
    }

    fn emit(&self, subpath: String) -> bool {
        // a cancel landing between this check and the send can still deliver
        // one item; the consumer stops reading once it observes the cancel
        if self.is_cancelled() {
            return false;
        }
        let path = if self.settings.root_prefix.is_empty() {
            subpath
        } else {
            format!("{}{}", self.settings.root_prefix, subpath)
        };
        self.results_tx.send(path).is_ok()
    }

    fn complete(&self) {
        if self.is_cancelled() {
            return;
        }
        self.completed.store(true, Ordering::Release);
        tracing::debug!(job = self.id, "scan job finished");
        self.cancel();
    }

    fn report(&self, error: ScanError) {
        tracing::warn!(job = self.id, "{}", error);
        if let Some(sink) = &self.settings.errors {
            sink.record(error);
        }
    }
}

/// Releases a worker slot when the worker exits. On unwind it also releases
/// the entry the worker was holding, and cancels the job if no worker is left
/// to reach the termination condition.
struct WorkerExit<'a> {
    job: &'a ScanJob,
    worker_id: usize,
    holding: bool,
}

impl Drop for WorkerExit<'_> {
    fn drop(&mut self) {
        let stranded = {
            let mut frontier = self.job.lock_frontier();
            frontier.workers -= 1;
            if self.holding {
                frontier.active -= 1;
                self.job.progress.notify_all();
            }
            tracing::trace!(
                job = self.job.id,
                worker = self.worker_id,
                remaining = frontier.workers,
                "scan worker exited"
            );
            self.holding && frontier.workers == 0
        };

        if stranded {
            tracing::warn!(job = self.job.id, "last scan worker panicked");
            self.job.cancel();
        }
    }
}

fn listing_error(dir: &str, source: io::Error) -> ScanError {
    ScanError::Listing {
        path: dir.to_string(),
        source,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
