//! Tree providers
//!
//! The scanner never touches a filesystem directly. It asks a `TreeProvider` for
//! the immediate children of a `/`-separated directory path, so the same engine
//! runs over physical directories, in-memory trees or any other virtual layout.

mod fs;
mod memory;

pub use fs::FsTree;
pub use memory::MemoryTree;

use std::io;

/// One child returned by `TreeProvider::list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Entry name, not the full path
    pub name: String,
    /// True if the entry can be listed in turn
    pub is_dir: bool,
}

impl TreeEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
        }
    }
}

/// Minimal read-only directory listing abstraction.
///
/// Implementations are shared by every scan worker, so they must be `Send + Sync`.
/// A failure is reported for the one directory and the scan moves on.
pub trait TreeProvider: Send + Sync {
    /// List the immediate children of `dir`.
    fn list(&self, dir: &str) -> io::Result<Vec<TreeEntry>>;
}

impl<T: TreeProvider + ?Sized> TreeProvider for std::sync::Arc<T> {
    fn list(&self, dir: &str) -> io::Result<Vec<TreeEntry>> {
        (**self).list(dir)
    }
}

impl<T: TreeProvider + ?Sized> TreeProvider for &T {
    fn list(&self, dir: &str) -> io::Result<Vec<TreeEntry>> {
        (**self).list(dir)
    }
}
