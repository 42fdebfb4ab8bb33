//! Pattern registration and scan configuration
//!
//! `FileScanner` collects patterns and settings; every call to `scan()` starts
//! an independent concurrent scan and returns its `ScanHandle`.
//!
//! # Example
//! ```rust
//! use treescan::{FileScanner, MemoryTree};
//!
//! let tree = MemoryTree::from_files(["a/x.txt", "a/b/y.txt", "c/z.txt"]);
//! let scanner = FileScanner::new(tree).add_glob("**/*.txt")?;
//!
//! let mut found: Vec<String> = scanner.scan().collect();
//! found.sort();
//! assert_eq!(found, vec!["a/b/y.txt", "a/x.txt", "c/z.txt"]);
//! # Ok::<(), treescan::ScanError>(())
//! ```

mod handle;
mod job;
pub mod sink;

pub use handle::{ScanControl, ScanHandle};
pub use job::{DescentFilter, FrontierEntry};
pub use sink::ErrorSink;

use crate::config::ScanConfig;
use crate::error::Result;
use crate::parallel::{self, Executor, ThreadExecutor};
use crate::pattern::{Pattern, PatternSet};
use crate::tree::TreeProvider;
use job::ScanSettings;
use std::fmt;
use std::sync::Arc;

/// Scans a tree for paths matching wildcard, glob and regex patterns
pub struct FileScanner {
    tree: Arc<dyn TreeProvider>,
    /// Pattern sets keyed by anchor, in first-registration order
    sets: Vec<PatternSet>,
    root_prefix: String,
    return_files: bool,
    return_directories: bool,
    executor: Arc<dyn Executor>,
    errors: Option<Arc<dyn ErrorSink>>,
    descend: DescentFilter,
    max_workers: usize,
}

impl FileScanner {
    /// Create a scanner over `tree` with default settings
    pub fn new(tree: impl TreeProvider + 'static) -> Self {
        Self::from_arc(Arc::new(tree))
    }

    /// Create a scanner over a shared tree
    pub fn from_arc(tree: Arc<dyn TreeProvider>) -> Self {
        Self {
            tree,
            sets: Vec::new(),
            root_prefix: String::new(),
            return_files: true,
            return_directories: false,
            executor: Arc::new(ThreadExecutor::default()),
            errors: None,
            descend: Arc::new(|_| true),
            max_workers: parallel::hardware_parallelism(),
        }
    }

    /// Create a scanner and apply loaded configuration
    pub fn from_config(tree: impl TreeProvider + 'static, config: &ScanConfig) -> Self {
        Self::new(tree)
            .with_root_prefix(config.root_prefix.clone())
            .with_files(config.return_files)
            .with_directories(config.return_directories)
            .with_max_workers(config.max_workers())
    }

    /// Add a wildcard pattern such as `"*.dll"` or `"folder/*.dll"`
    pub fn add_wildcard(self, pattern: &str) -> Result<Self> {
        Ok(self.add_pattern(Pattern::wildcard(pattern)?))
    }

    /// Add a glob pattern. `**` matches any number of segments, `*` and `?`
    /// stay inside one segment.
    pub fn add_glob(self, pattern: &str) -> Result<Self> {
        Ok(self.add_pattern(Pattern::glob(pattern)?))
    }

    /// Add a regular expression evaluated on paths below `anchor`
    pub fn add_regex(self, anchor: &str, regex: &str) -> Result<Self> {
        Ok(self.add_pattern(Pattern::regex(anchor, regex)?))
    }

    /// Add an already compiled pattern
    pub fn add_pattern(mut self, pattern: Pattern) -> Self {
        match self.sets.iter_mut().find(|set| set.anchor() == pattern.anchor()) {
            Some(set) => set.push(pattern),
            None => {
                let mut set = PatternSet::new(pattern.anchor());
                set.push(pattern);
                self.sets.push(set);
            }
        }
        self
    }

    /// String prepended to every emitted path
    pub fn with_root_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.root_prefix = prefix.into();
        self
    }

    /// Emit matching files (default `true`)
    pub fn with_files(mut self, enabled: bool) -> Self {
        self.return_files = enabled;
        self
    }

    /// Emit matching directories (default `false`)
    pub fn with_directories(mut self, enabled: bool) -> Self {
        self.return_directories = enabled;
        self
    }

    /// Executor that runs scan workers
    pub fn with_executor(mut self, executor: impl Executor + 'static) -> Self {
        self.executor = Arc::new(executor);
        self
    }

    /// Destination for per-directory failures
    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.errors = Some(sink);
        self
    }

    /// Predicate choosing which directories are descended into
    pub fn with_descent_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.descend = Arc::new(filter);
        self
    }

    /// Upper bound for concurrently running workers (at least 1)
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Registered pattern sets, in anchor registration order
    pub fn pattern_sets(&self) -> &[PatternSet] {
        &self.sets
    }

    pub fn root_prefix(&self) -> &str {
        &self.root_prefix
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Start a new scan
    pub fn scan(&self) -> ScanHandle {
        let seeds: Arc<[FrontierEntry]> = self
            .sets
            .iter()
            .map(|set| FrontierEntry::new(set.anchor(), Arc::new(set.clone())))
            .collect();

        ScanHandle::start(self.settings(), seeds)
    }

    /// Run a scan to completion and return its results sorted
    pub fn collect_sorted(&self) -> Vec<String> {
        let mut results: Vec<String> = self.scan().collect();
        results.sort();
        results
    }

    fn settings(&self) -> Arc<ScanSettings> {
        Arc::new(ScanSettings {
            tree: Arc::clone(&self.tree),
            executor: Arc::clone(&self.executor),
            errors: self.errors.clone(),
            descend: Arc::clone(&self.descend),
            root_prefix: self.root_prefix.clone(),
            return_files: self.return_files,
            return_directories: self.return_directories,
            max_workers: self.max_workers,
        })
    }
}

impl<'a> IntoIterator for &'a FileScanner {
    type Item = String;
    type IntoIter = ScanHandle;

    fn into_iter(self) -> ScanHandle {
        self.scan()
    }
}

impl fmt::Debug for FileScanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileScanner")
            .field("sets", &self.sets)
            .field("root_prefix", &self.root_prefix)
            .field("return_files", &self.return_files)
            .field("return_directories", &self.return_directories)
            .field("max_workers", &self.max_workers)
            .field("errors", &self.errors.as_ref().map(|_| "..."))
            .finish()
    }
}
