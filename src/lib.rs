//! # treescan - Concurrent pattern scanning over abstract file trees
//!
//! Finds paths in a rooted tree that match wildcard, glob or regular-expression
//! patterns, and streams them to the caller while directories are still being
//! listed on a pool of workers.
//!
//! ## Features
//!
//! - **Any tree**: scanning goes through the `TreeProvider` trait; `FsTree` and
//!   `MemoryTree` are included
//! - **Anchored patterns**: each pattern starts scanning at the directory before
//!   its first wildcard, so `assets/**/*.json` never lists anything outside `assets`
//! - **Elastic workers**: the pool grows with the directory backlog up to the
//!   core count and shrinks as the frontier drains
//! - **Streaming results**: `ScanHandle` is a blocking iterator that can be
//!   reset, cancelled from another thread, or dropped at any time
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use treescan::{FileScanner, FsTree};
//!
//! let scanner = FileScanner::new(FsTree::new("."))
//!     .add_glob("src/**/*.rs")?
//!     .with_root_prefix("./");
//!
//! for path in &scanner {
//!     println!("{path}");
//! }
//! # Ok::<(), treescan::ScanError>(())
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod parallel;
pub mod pattern;
pub mod scan;
pub mod tree;

pub use config::ScanConfig;
pub use error::{Result, ScanError};
pub use parallel::{Executor, RayonExecutor, ThreadExecutor};
pub use pattern::{Pattern, PatternKind, PatternSet};
pub use scan::{ErrorSink, FileScanner, ScanControl, ScanHandle};
pub use tree::{FsTree, MemoryTree, TreeEntry, TreeProvider};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
