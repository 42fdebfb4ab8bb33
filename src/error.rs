//! Error types for treescan
//!
//! Failures fall into three tiers:
//! - per-directory listing failures, recorded and skipped while the scan goes on
//! - cancellation races inside a worker, swallowed silently
//! - caller misuse (bad pattern, bad configuration), returned synchronously

use std::io;
use thiserror::Error;

/// Top-level error type for scanning
#[derive(Error, Debug)]
pub enum ScanError {
    /// Listing a directory through the tree provider failed
    #[error("Failed to list directory '{path}': {source}")]
    Listing {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The tree provider panicked while listing a directory
    #[error("Tree provider panicked while listing '{path}': {message}")]
    ProviderPanicked { path: String, message: String },

    /// The descent filter panicked on a discovered directory
    #[error("Descent filter panicked on '{path}': {message}")]
    FilterPanicked { path: String, message: String },

    /// Pattern could not be compiled
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Pattern names a directory but nothing to match inside it
    #[error("Pattern '{pattern}' has nothing to match after its last separator")]
    EmptyPattern { pattern: String },

    /// Executor could not start a worker
    #[error("Failed to start scan worker: {0}")]
    Spawn(#[source] io::Error),

    /// Operation on a scan handle that was already disposed
    #[error("Scan handle has been disposed")]
    Disposed,

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// I/O errors outside of directory listing
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ScanError {
    /// Directory the error was observed on, for per-directory failures
    pub fn path(&self) -> Option<&str> {
        match self {
            ScanError::Listing { path, .. }
            | ScanError::ProviderPanicked { path, .. }
            | ScanError::FilterPanicked { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Check if the scan keeps going after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ScanError::Listing { .. }
                | ScanError::ProviderPanicked { .. }
                | ScanError::FilterPanicked { .. }
                | ScanError::Spawn(_)
        )
    }
}

impl From<figment::Error> for ScanError {
    fn from(error: figment::Error) -> Self {
        ScanError::Config(Box::new(error))
    }
}

/// Result type alias for ScanError
pub type Result<T> = std::result::Result<T, ScanError>;
