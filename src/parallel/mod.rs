//! Worker execution for scan jobs
//!
//! Scan jobs never create threads themselves. Each worker is a `Task` handed to
//! an `Executor`, so callers decide where scanning runs:
//!
//! ```text
//! ┌─────────────┐  submit(task)  ┌──────────────────┐
//! │  ScanJob    │───────────────▶│  Executor        │
//! │             │                │                  │
//! │ • frontier  │                │ • ThreadExecutor │  one OS thread per worker
//! │ • backlog   │                │ • RayonExecutor  │  global or custom pool
//! └─────────────┘                └──────────────────┘
//! ```
//!
//! How many workers may run at once is a resource decision made here from the
//! core count (`max_workers`); when to start them is the job's decision.

use crate::error::{Result, ScanError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Unit of work submitted to an executor
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Launches work concurrently with the caller.
pub trait Executor: Send + Sync {
    /// Start `task`. Returning `Ok` means the task will eventually run.
    fn submit(&self, task: Task) -> Result<()>;
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn submit(&self, task: Task) -> Result<()> {
        (**self).submit(task)
    }
}

/// Runs every task on its own named OS thread
#[derive(Debug)]
pub struct ThreadExecutor {
    name_prefix: String,
    spawned: AtomicUsize,
}

impl Default for ThreadExecutor {
    fn default() -> Self {
        Self::new("treescan-worker")
    }
}

impl ThreadExecutor {
    pub fn new(name_prefix: impl Into<String>) -> Self {
        Self {
            name_prefix: name_prefix.into(),
            spawned: AtomicUsize::new(0),
        }
    }

    /// Threads started so far
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::Relaxed)
    }
}

impl Executor for ThreadExecutor {
    fn submit(&self, task: Task) -> Result<()> {
        let n = self.spawned.fetch_add(1, Ordering::Relaxed);
        std::thread::Builder::new()
            .name(format!("{}-{}", self.name_prefix, n))
            .spawn(task)
            .map(|_| ())
            .map_err(ScanError::Spawn)
    }
}

/// Runs tasks on a rayon thread pool
#[derive(Debug, Clone, Default)]
pub struct RayonExecutor {
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl RayonExecutor {
    /// Use rayon's global pool
    pub fn global() -> Self {
        Self { pool: None }
    }

    /// Use a dedicated pool
    pub fn with_pool(pool: Arc<rayon::ThreadPool>) -> Self {
        Self { pool: Some(pool) }
    }

    /// Build a dedicated pool with `threads` threads
    pub fn with_threads(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|ix| format!("treescan-rayon-{ix}"))
            .build()
            .map_err(|e| ScanError::Spawn(std::io::Error::other(e)))?;
        Ok(Self::with_pool(Arc::new(pool)))
    }
}

impl Executor for RayonExecutor {
    fn submit(&self, task: Task) -> Result<()> {
        match &self.pool {
            Some(pool) => pool.spawn(task),
            None => rayon::spawn(task),
        }
        Ok(())
    }
}

/// Calculate the worker cap from the core count and user limits
///
/// `thread_percentage` is the share of cores to use (clamped to 1..=100) and
/// `max_threads` an absolute limit where 0 means no limit. Never below 1.
pub fn max_workers(max_threads: usize, thread_percentage: u8) -> usize {
    let cpu_cores = num_cpus::get();
    let percentage = thread_percentage.clamp(1, 100) as usize;

    let max_by_percentage = std::cmp::max(1, (cpu_cores * percentage) / 100);

    if max_threads > 0 {
        std::cmp::min(max_threads, max_by_percentage)
    } else {
        max_by_percentage
    }
}

/// Worker cap when nothing is configured: one worker per core
pub fn hardware_parallelism() -> usize {
    num_cpus::get().max(1)
}
